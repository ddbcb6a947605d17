//! Interaction sources
//!
//! Ingestion (deduplication, bot filtering, schema validation) is owned by
//! the upstream pipeline; this seam only hands its cleaned output to the
//! rebuild job. Retry and timeout policy for producing the export lives on
//! the ingestion side.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

use crate::error::{AppError, Result};
use crate::models::InteractionRecord;

#[async_trait]
pub trait InteractionSource: Send + Sync {
    /// Load the cleaned interaction batch for the next build.
    async fn load_interactions(&self) -> Result<Vec<InteractionRecord>>;
}

/// Reads the newline-delimited JSON export produced by the ingestion
/// pipeline.
pub struct JsonlInteractionSource {
    path: PathBuf,
}

impl JsonlInteractionSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl InteractionSource for JsonlInteractionSource {
    async fn load_interactions(&self) -> Result<Vec<InteractionRecord>> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            AppError::Persistence(format!(
                "failed to read interactions from {}: {e}",
                self.path.display()
            ))
        })?;

        let mut records = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: InteractionRecord = serde_json::from_str(line).map_err(|e| {
                AppError::Persistence(format!(
                    "malformed interaction record at {}:{}: {e}",
                    self.path.display(),
                    line_no + 1
                ))
            })?;
            records.push(record);
        }

        info!(
            path = %self.path.display(),
            record_count = records.len(),
            "Loaded interaction batch"
        );

        Ok(records)
    }
}

/// Fixed in-memory batch. Used by tests and by the admin rebuild path when
/// the caller supplies the records directly.
pub struct StaticInteractionSource {
    records: Vec<InteractionRecord>,
}

impl StaticInteractionSource {
    pub fn new(records: Vec<InteractionRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl InteractionSource for StaticInteractionSource {
    async fn load_interactions(&self) -> Result<Vec<InteractionRecord>> {
        Ok(self.records.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventType;
    use std::io::Write;

    #[tokio::test]
    async fn test_jsonl_source_loads_records() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"user_id":1,"product_id":100,"event_type":"purchased","timestamp":"2024-03-01T12:00:00Z"}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            r#"{{"user_id":2,"product_id":101,"event_type":"search_keyword","timestamp":"2024-03-02T08:30:00Z"}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let source = JsonlInteractionSource::new(file.path());
        let records = source.load_interactions().await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].user_id, 1);
        assert_eq!(records[0].event_type, EventType::Purchased);
        assert_eq!(records[1].product_id, 101);
    }

    #[tokio::test]
    async fn test_jsonl_source_reports_malformed_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();
        file.flush().unwrap();

        let source = JsonlInteractionSource::new(file.path());
        let result = source.load_interactions().await;
        assert!(matches!(result, Err(AppError::Persistence(_))));
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let source = JsonlInteractionSource::new("/nonexistent/interactions.jsonl");
        assert!(source.load_interactions().await.is_err());
    }
}
