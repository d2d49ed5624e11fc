use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::corpus::csv::{is_expected_header, parse_record, split_rows, COLUMNS};
use crate::errors::StoreError;
use crate::models::cv::CvRecord;

/// Read side of the CV record store.
///
/// Ranking and the pipeline only ever list records; how they are kept is up
/// to the implementation.
pub trait RecordStore: Send + Sync {
    /// Every well-formed record, in store order.
    fn list_records(&self) -> Result<Vec<CvRecord>, StoreError>;

    /// Records for one job offer, in store order.
    fn records_for_job(&self, job_offer_id: i64) -> Result<Vec<CvRecord>, StoreError> {
        Ok(self
            .list_records()?
            .into_iter()
            .filter(|r| r.job_offer_id == job_offer_id)
            .collect())
    }
}

/// The CSV file written by the upstream extraction service.
///
/// The first row is always treated as the header. Malformed rows are skipped
/// and logged; they never abort a load.
#[derive(Debug, Clone)]
pub struct CsvRecordStore {
    path: PathBuf,
}

impl CsvRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

impl RecordStore for CsvRecordStore {
    fn list_records(&self) -> Result<Vec<CvRecord>, StoreError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        let records = parse_store(&content);
        info!(
            "Loaded {} CV records from {}",
            records.len(),
            self.path.display()
        );
        Ok(records)
    }
}

/// Parses a whole store file, skipping the header and every malformed row.
pub fn parse_store(content: &str) -> Vec<CvRecord> {
    let mut rows = split_rows(content).into_iter();

    match rows.next() {
        Some(header) if !is_expected_header(&header.fields) => warn!(
            "Record store header does not match the {}-column schema: {:?}",
            COLUMNS.len(),
            header.fields
        ),
        _ => {}
    }

    rows.filter_map(|row| match parse_record(&row.fields) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("Skipping malformed CV record at line {}: {e}", row.line);
            None
        }
    })
    .inspect(|r| debug!("Parsed CV record user={} job={}", r.user_id, r.job_offer_id))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::csv::{encode_record, header_line};
    use chrono::NaiveDate;
    use std::io::Write;

    fn record(user_id: i64, job_offer_id: i64, skills: &str) -> CvRecord {
        CvRecord {
            user_id,
            job_offer_id,
            cv_path: format!("uploads/{user_id}.pdf"),
            name: format!("Candidate {user_id}"),
            email: format!("c{user_id}@example.com"),
            phone: String::new(),
            description: "Software engineer".to_string(),
            skills: skills.to_string(),
            experience: "3 years".to_string(),
            education: "BSc".to_string(),
            extracted_at: NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
        }
    }

    fn store_text(records: &[CvRecord], extra_lines: &[&str]) -> String {
        let mut text = header_line();
        text.push('\n');
        for r in records {
            text.push_str(&encode_record(r));
            text.push('\n');
        }
        for line in extra_lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }

    #[test]
    fn test_malformed_rows_are_skipped_not_fatal() {
        let text = store_text(
            &[record(1, 10, "Rust")],
            &[
                "only,three,fields",
                "x,10,cv.pdf,n,e,p,d,s,x,e,2024-01-01T00:00:00",
                "2,10,cv.pdf,n,e,p,d,s,x,e,not-a-date",
            ],
        );
        let records = parse_store(&text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user_id, 1);
    }

    #[test]
    fn test_header_only_yields_nothing() {
        assert!(parse_store(&header_line()).is_empty());
        assert!(parse_store("").is_empty());
    }

    #[test]
    fn test_records_for_job_filters_and_keeps_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let text = store_text(
            &[
                record(3, 10, "Rust"),
                record(1, 20, "Go"),
                record(2, 10, "Java, \"Spring\""),
            ],
            &[],
        );
        file.write_all(text.as_bytes()).unwrap();

        let store = CsvRecordStore::new(file.path());
        let records = store.records_for_job(10).unwrap();
        assert_eq!(
            records.iter().map(|r| r.user_id).collect::<Vec<_>>(),
            vec![3, 2]
        );
        assert_eq!(records[1].skills, "Java, \"Spring\"");
    }

    #[test]
    fn test_missing_file_is_store_error() {
        let store = CsvRecordStore::new("/definitely/not/here.csv");
        assert!(!store.exists());
        assert!(matches!(store.list_records(), Err(StoreError::Io { .. })));
    }
}
