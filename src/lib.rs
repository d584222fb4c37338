//! dlproc - forensic document processing.
//!
//! Each document is classified into a `(lane, path)` category by a fast
//! triage model, then transcribed by an analyst model against that path's
//! extraction schema. The [`pipeline::Orchestrator`] sequences both stages
//! and hands results to a [`pipeline::RecordSink`].

pub mod config;
pub mod ingestion;
pub mod model;
pub mod pipeline;
pub mod storage;
pub mod taxonomy;
pub mod utils;

pub use config::Config;
pub use ingestion::{ErrorKind, ExtractionError, ExtractionResult, TriageResult};
pub use pipeline::{DocumentInput, Orchestrator, PipelineState, ProcessedDocument};
pub use taxonomy::{Lane, LanePath, Taxonomy};
