//! Typed per-document failures.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ModelError;

/// Coarse failure category, used for matching and batch reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    MalformedModelOutput,
    UnknownCategory,
    SchemaCoverageViolation,
    ServiceUnavailable,
    Persistence,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedModelOutput => "MalformedModelOutput",
            ErrorKind::UnknownCategory => "UnknownCategory",
            ErrorKind::SchemaCoverageViolation => "SchemaCoverageViolation",
            ErrorKind::ServiceUnavailable => "ServiceUnavailable",
            ErrorKind::Persistence => "Persistence",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of one document's pipeline run.
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    /// The model's response could not be decoded into the expected shape.
    #[error("Malformed model output: {reason} (response starts with {snippet:?})")]
    MalformedModelOutput { reason: String, snippet: String },

    /// Triage named a lane/path pair the taxonomy does not define.
    #[error("Unknown category: lane '{lane_id}' / path '{path_id}'")]
    UnknownCategory { lane_id: String, path_id: String },

    /// Extraction omitted declared schema fields entirely.
    #[error(
        "Schema coverage violation for {lane_id}/{path_id}: missing [{}], unexpected [{}]",
        .missing.join(", "),
        .unexpected.join(", ")
    )]
    SchemaCoverageViolation {
        lane_id: String,
        path_id: String,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("Document model unavailable: {0}")]
    ServiceUnavailable(#[from] ModelError),

    #[error("Persistence failed: {0}")]
    Persistence(String),
}

/// Longest prefix of a bad response kept for diagnostics.
const SNIPPET_CHARS: usize = 120;

impl ExtractionError {
    pub fn malformed(reason: impl Into<String>, response: &str) -> Self {
        ExtractionError::MalformedModelOutput {
            reason: reason.into(),
            snippet: response.trim().chars().take(SNIPPET_CHARS).collect(),
        }
    }

    pub fn unknown_category(lane_id: impl Into<String>, path_id: impl Into<String>) -> Self {
        ExtractionError::UnknownCategory {
            lane_id: lane_id.into(),
            path_id: path_id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractionError::MalformedModelOutput { .. } => ErrorKind::MalformedModelOutput,
            ExtractionError::UnknownCategory { .. } => ErrorKind::UnknownCategory,
            ExtractionError::SchemaCoverageViolation { .. } => ErrorKind::SchemaCoverageViolation,
            ExtractionError::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            ExtractionError::Persistence(_) => ErrorKind::Persistence,
        }
    }

    /// Only service failures are worth another attempt; everything else is
    /// deterministic for a given response.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExtractionError::ServiceUnavailable(_))
    }
}
