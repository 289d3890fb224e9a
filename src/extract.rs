//! Record extraction from delimited files

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::{debug, info};

use crate::error::{EtlError, EtlResult};

/// One data row, keyed by external column label
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// 1-based line number in the source file
    pub line: u64,
    /// External column label to raw value
    pub values: HashMap<String, String>,
}

impl RawRecord {
    /// Raw value for an external column label
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }
}

/// Header row plus data rows in file order
#[derive(Debug, Clone, Default)]
pub struct ExtractedTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRecord>,
}

impl ExtractedTable {
    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the file had no data rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read only the header row of a delimited file
pub fn read_headers(path: &Path, delimiter: u8) -> EtlResult<Vec<String>> {
    let mut reader = open_reader(path, delimiter)?;
    read_header_row(&mut reader, path)
}

/// Read a delimited file with a header row into memory
pub fn extract_records(path: &Path, delimiter: u8) -> EtlResult<ExtractedTable> {
    debug!(path = %path.display(), delimiter = %(delimiter as char), "Extracting records");

    let mut reader = open_reader(path, delimiter)?;
    let headers = read_header_row(&mut reader, path)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| EtlError::extraction(path, e.to_string()))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let values = headers
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();
        rows.push(RawRecord { line, values });
    }

    info!(
        path = %path.display(),
        columns = headers.len(),
        rows = rows.len(),
        "Extracted records"
    );

    Ok(ExtractedTable { headers, rows })
}

fn open_reader(path: &Path, delimiter: u8) -> EtlResult<csv::Reader<std::fs::File>> {
    if !path.is_file() {
        return Err(EtlError::extraction(path, "file not found"));
    }
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| EtlError::extraction(path, e.to_string()))
}

fn read_header_row(
    reader: &mut csv::Reader<std::fs::File>,
    path: &Path,
) -> EtlResult<Vec<String>> {
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| EtlError::extraction(path, e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.is_empty() {
        return Err(EtlError::extraction(path, "file has no header row"));
    }

    let mut seen = HashSet::new();
    for (i, header) in headers.iter().enumerate() {
        if header.is_empty() {
            return Err(EtlError::extraction(
                path,
                format!("header column {} is empty", i + 1),
            ));
        }
        if !seen.insert(header.as_str()) {
            return Err(EtlError::extraction(
                path,
                format!("duplicate header column {header:?}"),
            ));
        }
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_extract_records() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "shopping.csv",
            "Customer ID,Age,Review Rating\n1, 55 ,3.1\n2,19,\n",
        );

        let table = extract_records(&path, b',').unwrap();
        assert_eq!(table.headers, vec!["Customer ID", "Age", "Review Rating"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].get("Age"), Some("55"));
        assert_eq!(table.rows[0].line, 2);
        assert_eq!(table.rows[1].get("Review Rating"), Some(""));
    }

    #[test]
    fn test_extract_custom_delimiter() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "shopping.tsv", "Customer ID\tGender\n7\tFemale\n");

        let table = extract_records(&path, b'\t').unwrap();
        assert_eq!(table.rows[0].get("Gender"), Some("Female"));
    }

    #[test]
    fn test_extract_quoted_fields() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "shopping.csv",
            "Customer ID,Location\n3,\"Portland, Oregon\"\n",
        );

        let table = extract_records(&path, b',').unwrap();
        assert_eq!(table.rows[0].get("Location"), Some("Portland, Oregon"));
    }

    #[test]
    fn test_missing_file() {
        let err = extract_records(Path::new("/nonexistent/shopping.csv"), b',').unwrap_err();
        assert!(matches!(err, EtlError::Extraction { .. }));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_unequal_row_lengths() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "bad.csv", "Customer ID,Age\n1,20\n2\n");

        let err = extract_records(&path, b',').unwrap_err();
        assert!(matches!(err, EtlError::Extraction { .. }));
    }

    #[test]
    fn test_duplicate_and_empty_headers() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "dup.csv", "Age,Age\n1,2\n");
        let err = extract_records(&path, b',').unwrap_err();
        assert!(err.to_string().contains("duplicate"));

        let path = write_file(&dir, "blank.csv", "Age,,Gender\n1,2,Male\n");
        let err = read_headers(&path, b',').unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_header_only_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "empty.csv", "Customer ID,Age\n");

        let table = extract_records(&path, b',').unwrap();
        assert!(table.is_empty());
        assert_eq!(table.headers.len(), 2);
    }
}
