//! Stage outputs and the run report

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::PipelineStage;

/// Pipeline execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// Every selected stage succeeded or was skipped
    Completed,
    /// Finished under the continue policy with at least one failed stage
    CompletedWithErrors,
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::CompletedWithErrors => write!(f, "completed with errors"),
        }
    }
}

/// Output from a pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutput {
    /// Whether the stage was successful
    pub success: bool,
    /// Whether the stage was skipped
    pub skipped: bool,
    /// Reason for skipping (if applicable)
    pub skip_reason: Option<String>,
    /// Error chain of a failed stage
    pub error: Option<String>,
    /// Stage-specific metadata
    pub metadata: HashMap<String, serde_json::Value>,
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl StageOutput {
    fn base(success: bool) -> Self {
        Self {
            success,
            skipped: false,
            skip_reason: None,
            error: None,
            metadata: HashMap::new(),
            duration_ms: 0,
            timestamp: Utc::now(),
        }
    }

    /// Create a successful stage output
    pub fn success() -> Self {
        Self::base(true)
    }

    /// Create a skipped stage output
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            skipped: true,
            skip_reason: Some(reason.into()),
            ..Self::base(true)
        }
    }

    /// Create a failed stage output
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::base(false)
        }
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Set duration
    pub fn with_duration(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }

    /// Metadata value as an integer
    pub fn metadata_i64(&self, key: &str) -> Option<i64> {
        self.metadata.get(key).and_then(serde_json::Value::as_i64)
    }

    fn label(&self) -> &'static str {
        if self.skipped {
            "skipped"
        } else if self.success {
            "ok"
        } else {
            "failed"
        }
    }
}

/// Report from a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Run ID
    pub run_id: String,
    /// Final status
    pub status: PipelineStatus,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Stage outputs in execution order
    pub outputs: Vec<(PipelineStage, StageOutput)>,
    /// Rows rejected by the staging load
    pub rows_rejected: usize,
    /// Total duration in milliseconds
    pub duration_ms: u64,
}

impl PipelineReport {
    /// Check if pipeline was successful
    pub fn is_success(&self) -> bool {
        self.status == PipelineStatus::Completed
    }

    /// Output of a stage, if it ran or was skipped
    pub fn output(&self, stage: PipelineStage) -> Option<&StageOutput> {
        self.outputs
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, output)| output)
    }

    /// Stages that failed
    pub fn failed_stages(&self) -> Vec<PipelineStage> {
        self.outputs
            .iter()
            .filter(|(_, output)| !output.success)
            .map(|(stage, _)| *stage)
            .collect()
    }

    /// Get formatted duration
    pub fn duration_formatted(&self) -> String {
        let secs = self.duration_ms / 1000;
        let mins = secs / 60;
        let remaining_secs = secs % 60;

        if mins > 0 {
            format!("{}m {}s", mins, remaining_secs)
        } else {
            format!("{}s", secs)
        }
    }

    /// Print summary to stderr
    pub fn print_summary(&self) {
        eprintln!();
        eprintln!("Pipeline {} - {}", self.run_id, self.status);
        eprintln!("Duration: {}", self.duration_formatted());
        if self.rows_rejected > 0 {
            eprintln!("Rows rejected: {}", self.rows_rejected);
        }

        for (stage, output) in &self.outputs {
            match (&output.skip_reason, &output.error) {
                (Some(reason), _) => {
                    eprintln!("  - {}: {} ({})", stage, output.label(), reason)
                }
                (_, Some(error)) => eprintln!("  - {}: {} ({})", stage, output.label(), error),
                _ => eprintln!(
                    "  - {}: {} ({}ms)",
                    stage,
                    output.label(),
                    output.duration_ms
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outputs: Vec<(PipelineStage, StageOutput)>) -> PipelineReport {
        PipelineReport {
            run_id: "test-123".to_string(),
            status: PipelineStatus::Completed,
            started_at: Utc::now(),
            outputs,
            rows_rejected: 0,
            duration_ms: 65000,
        }
    }

    #[test]
    fn test_stage_output() {
        let output = StageOutput::success()
            .with_metadata("rows_loaded", serde_json::json!(10))
            .with_duration(1500);

        assert!(output.success);
        assert!(!output.skipped);
        assert_eq!(output.metadata_i64("rows_loaded"), Some(10));
        assert_eq!(output.duration_ms, 1500);
    }

    #[test]
    fn test_skipped_and_failed_outputs() {
        let skipped = StageOutput::skipped("No records extracted");
        assert!(skipped.success);
        assert_eq!(skipped.skip_reason.as_deref(), Some("No records extracted"));
        assert_eq!(skipped.label(), "skipped");

        let failed = StageOutput::failed("table missing");
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("table missing"));
        assert_eq!(failed.label(), "failed");
    }

    #[test]
    fn test_pipeline_report() {
        let report = report(vec![
            (PipelineStage::Extract, StageOutput::success()),
            (PipelineStage::Types, StageOutput::failed("boom")),
        ]);

        assert!(report.is_success());
        assert_eq!(report.duration_formatted(), "1m 5s");
        assert!(report.output(PipelineStage::Extract).is_some());
        assert!(report.output(PipelineStage::Repair).is_none());
        assert_eq!(report.failed_stages(), vec![PipelineStage::Types]);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(PipelineStatus::Completed.to_string(), "completed");
        assert_eq!(
            PipelineStatus::CompletedWithErrors.to_string(),
            "completed with errors"
        );
    }
}
