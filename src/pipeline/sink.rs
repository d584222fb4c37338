//! Persistence boundary consumed by the orchestrator.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DocumentInput;
use crate::ingestion::{ErrorKind, ExtractionError, ExtractionResult, TriageResult};
use crate::storage::{compute_hash, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordStatus {
    Processed,
    Error,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Processed => "PROCESSED",
            RecordStatus::Error => "ERROR",
        }
    }
}

/// Final per-document record handed to persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingRecord {
    pub document_id: String,
    pub file_name: String,
    pub media_type: String,
    pub size: usize,
    pub content_hash: String,
    pub ingested_at: DateTime<Utc>,
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triage: Option<TriageResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction: Option<ExtractionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessingRecord {
    fn base(input: &DocumentInput, status: RecordStatus) -> Self {
        Self {
            document_id: input.document_id.clone(),
            file_name: input.file_name.clone(),
            media_type: input.image.media_type.clone(),
            size: input.image.len(),
            content_hash: compute_hash(&input.image.data),
            ingested_at: Utc::now(),
            status,
            triage: None,
            extraction: None,
            error_kind: None,
            error: None,
        }
    }

    pub fn processed(
        input: &DocumentInput,
        triage: &TriageResult,
        extraction: &ExtractionResult,
    ) -> Self {
        Self {
            triage: Some(triage.clone()),
            extraction: Some(extraction.clone()),
            ..Self::base(input, RecordStatus::Processed)
        }
    }

    pub fn failed(
        input: &DocumentInput,
        triage: Option<&TriageResult>,
        error: &ExtractionError,
    ) -> Self {
        Self {
            triage: triage.cloned(),
            error_kind: Some(error.kind()),
            error: Some(error.to_string()),
            ..Self::base(input, RecordStatus::Error)
        }
    }
}

/// Where raw bytes and final records go.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persist the submitted bytes, returning their storage location.
    async fn store_raw(&self, input: &DocumentInput) -> Result<String, StorageError>;

    async fn store_record(&self, record: &ProcessingRecord) -> Result<(), StorageError>;
}

/// In-memory sink for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    raw: Mutex<Vec<(String, usize)>>,
    records: Mutex<Vec<ProcessingRecord>>,
    reject_records: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose `store_record` always fails.
    pub fn rejecting() -> Self {
        Self {
            reject_records: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<ProcessingRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn raw_count(&self) -> usize {
        self.raw.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn store_raw(&self, input: &DocumentInput) -> Result<String, StorageError> {
        let location = format!("memory://{}", input.document_id);
        self.raw
            .lock()
            .map_err(|e| StorageError::Rejected(e.to_string()))?
            .push((location.clone(), input.image.len()));
        Ok(location)
    }

    async fn store_record(&self, record: &ProcessingRecord) -> Result<(), StorageError> {
        if self.reject_records {
            return Err(StorageError::Rejected(format!(
                "record store unavailable for {}",
                record.document_id
            )));
        }
        self.records
            .lock()
            .map_err(|e| StorageError::Rejected(e.to_string()))?
            .push(record.clone());
        Ok(())
    }
}
