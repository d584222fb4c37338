//! Per-document pipeline: Received -> Triaged -> Extracted -> Done, or Failed.
//!
//! Documents share nothing but the read-only taxonomy, so a batch is just many
//! independent runs (see [`BatchRunner`]).

mod orchestrator;
mod retry;
mod runner;
mod sink;

pub use orchestrator::Orchestrator;
pub use retry::RetryPolicy;
pub use runner::{BatchOutcome, BatchRunner, BatchSummary, PipelineEvent};
pub use sink::{MemorySink, ProcessingRecord, RecordSink, RecordStatus};

use serde::Serialize;

use crate::ingestion::{ErrorKind, ExtractionError, ExtractionResult, TriageResult};
use crate::model::DocumentImage;

/// A document submitted for processing.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub document_id: String,
    pub file_name: String,
    pub image: DocumentImage,
}

impl DocumentInput {
    /// New input with a random document id.
    pub fn new(file_name: impl Into<String>, image: DocumentImage) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), file_name, image)
    }

    pub fn with_id(
        document_id: impl Into<String>,
        file_name: impl Into<String>,
        image: DocumentImage,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            file_name: file_name.into(),
            image,
        }
    }
}

/// Successful outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedDocument {
    pub document_id: String,
    pub file_name: String,
    pub triage: TriageResult,
    pub extraction: ExtractionResult,
    pub raw_location: String,
}

#[derive(Debug, Clone)]
pub enum PipelineState {
    Received,
    Triaged(TriageResult),
    Extracted {
        triage: TriageResult,
        extraction: ExtractionResult,
    },
    Done(ProcessedDocument),
    Failed(ExtractionError),
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Received => "received",
            PipelineState::Triaged(_) => "triaged",
            PipelineState::Extracted { .. } => "extracted",
            PipelineState::Done(_) => "done",
            PipelineState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done(_) | PipelineState::Failed(_))
    }

    pub fn failure_kind(&self) -> Option<ErrorKind> {
        match self {
            PipelineState::Failed(e) => Some(e.kind()),
            _ => None,
        }
    }
}
