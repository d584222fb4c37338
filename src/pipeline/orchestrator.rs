//! Sequencing of triage, transcription and persistence for one document.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::{
    DocumentInput, PipelineState, ProcessedDocument, ProcessingRecord, RecordSink, RetryPolicy,
};
use crate::config::Config;
use crate::ingestion::{
    ExtractionError, ExtractionResult, Transcriber, TriageClassifier, TriageResult,
};
use crate::model::{build_model, DocumentModel, ModelRole};
use crate::taxonomy::Taxonomy;

/// Drives one document through the pipeline states.
///
/// This is the only place that decides about retries. Nothing is written to
/// the sink before `Extracted -> Done`, except an error record once a run has
/// failed.
pub struct Orchestrator {
    taxonomy: Arc<Taxonomy>,
    classifier: TriageClassifier,
    transcriber: Transcriber,
    sink: Arc<dyn RecordSink>,
    retry: RetryPolicy,
    prune_extra_fields: bool,
}

impl Orchestrator {
    pub fn new(
        taxonomy: Arc<Taxonomy>,
        triage_model: Arc<dyn DocumentModel>,
        analyst_model: Arc<dyn DocumentModel>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            classifier: TriageClassifier::new(taxonomy.clone(), triage_model),
            transcriber: Transcriber::new(taxonomy.clone(), analyst_model),
            taxonomy,
            sink,
            retry: RetryPolicy::default(),
            prune_extra_fields: true,
        }
    }

    /// Build with the configured providers and pipeline settings.
    pub fn from_config(taxonomy: Arc<Taxonomy>, config: &Config, sink: Arc<dyn RecordSink>) -> Self {
        Self::new(
            taxonomy,
            build_model(&config.model, ModelRole::Triage),
            build_model(&config.model, ModelRole::Analyst),
            sink,
        )
        .with_retry_policy(RetryPolicy::new(
            config.pipeline.max_attempts,
            config.pipeline.retry_backoff_ms,
        ))
        .with_prune_extra_fields(config.pipeline.prune_extra_fields)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// When false, response keys outside the schema fail the document
    /// instead of being dropped.
    pub fn with_prune_extra_fields(mut self, prune: bool) -> Self {
        self.prune_extra_fields = prune;
        self
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn classifier(&self) -> &TriageClassifier {
        &self.classifier
    }

    /// Perform one state transition. Terminal states are returned unchanged.
    pub async fn advance(&self, input: &DocumentInput, state: PipelineState) -> PipelineState {
        match state {
            PipelineState::Received => match self.triage(input).await {
                Ok(triage) => PipelineState::Triaged(triage),
                Err(e) => PipelineState::Failed(e),
            },
            PipelineState::Triaged(triage) => match self.extract(input, &triage).await {
                Ok(extraction) => PipelineState::Extracted { triage, extraction },
                Err(e) => PipelineState::Failed(e),
            },
            PipelineState::Extracted { triage, extraction } => {
                match self.persist(input, triage, extraction).await {
                    Ok(done) => PipelineState::Done(done),
                    Err(e) => PipelineState::Failed(e),
                }
            }
            terminal => terminal,
        }
    }

    /// Run a document to completion, recording an error record on failure.
    pub async fn process(
        &self,
        input: &DocumentInput,
    ) -> Result<ProcessedDocument, ExtractionError> {
        debug!("Pipeline: received {} ({})", input.file_name, input.document_id);
        let mut state = PipelineState::Received;
        let mut triage: Option<TriageResult> = None;
        loop {
            state = match self.advance(input, state).await {
                PipelineState::Done(done) => {
                    info!("Pipeline: {} done", input.file_name);
                    return Ok(done);
                }
                PipelineState::Failed(e) => {
                    warn!("Pipeline: {} failed ({}): {}", input.file_name, e.kind(), e);
                    self.record_failure(input, triage.as_ref(), &e).await;
                    return Err(e);
                }
                next => {
                    if let PipelineState::Triaged(ref t) = next {
                        triage = Some(t.clone());
                    }
                    debug!("Pipeline: {} -> {}", input.document_id, next.name());
                    next
                }
            };
        }
    }

    /// Like [`process`](Self::process) but reports the terminal state.
    pub async fn run(&self, input: &DocumentInput) -> PipelineState {
        match self.process(input).await {
            Ok(done) => PipelineState::Done(done),
            Err(e) => PipelineState::Failed(e),
        }
    }

    async fn triage(&self, input: &DocumentInput) -> Result<TriageResult, ExtractionError> {
        let triage = self
            .retry
            .run("triage", || self.classifier.classify(&input.image))
            .await?;

        if self.taxonomy.find_path(&triage.lane_id, &triage.path_id).is_none() {
            warn!(
                "Triage named unknown category {}/{} for {}",
                triage.lane_id, triage.path_id, input.file_name
            );
            return Err(ExtractionError::unknown_category(
                triage.lane_id,
                triage.path_id,
            ));
        }
        Ok(triage)
    }

    async fn extract(
        &self,
        input: &DocumentInput,
        triage: &TriageResult,
    ) -> Result<ExtractionResult, ExtractionError> {
        let path = self
            .taxonomy
            .find_path(&triage.lane_id, &triage.path_id)
            .ok_or_else(|| ExtractionError::unknown_category(&triage.lane_id, &triage.path_id))?;

        let mut extraction = self
            .retry
            .run("transcribe", || self.transcriber.transcribe(&input.image, triage))
            .await?;

        let schema = &path.extraction_schema;
        let missing = extraction.missing_fields(schema);
        let mut unexpected = extraction.extra_fields(schema);

        if !unexpected.is_empty() && self.prune_extra_fields {
            warn!(
                "Dropping fields outside the '{}' schema: {}",
                path.name,
                unexpected.join(", ")
            );
            extraction.prune_to(schema);
            unexpected.clear();
        }

        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(ExtractionError::SchemaCoverageViolation {
                lane_id: triage.lane_id.clone(),
                path_id: triage.path_id.clone(),
                missing,
                unexpected,
            });
        }

        extraction.order_by_schema(schema);

        let mismatched = extraction.type_mismatches(schema);
        if !mismatched.is_empty() {
            warn!(
                "Values with unexpected types for '{}': {}",
                path.name,
                mismatched.join(", ")
            );
        }
        Ok(extraction)
    }

    async fn persist(
        &self,
        input: &DocumentInput,
        triage: TriageResult,
        extraction: ExtractionResult,
    ) -> Result<ProcessedDocument, ExtractionError> {
        let raw_location = self
            .sink
            .store_raw(input)
            .await
            .map_err(|e| ExtractionError::Persistence(e.to_string()))?;

        let record = ProcessingRecord::processed(input, &triage, &extraction);
        self.sink
            .store_record(&record)
            .await
            .map_err(|e| ExtractionError::Persistence(e.to_string()))?;

        Ok(ProcessedDocument {
            document_id: input.document_id.clone(),
            file_name: input.file_name.clone(),
            triage,
            extraction,
            raw_location,
        })
    }

    async fn record_failure(
        &self,
        input: &DocumentInput,
        triage: Option<&TriageResult>,
        failure: &ExtractionError,
    ) {
        let record = ProcessingRecord::failed(input, triage, failure);
        if let Err(e) = self.sink.store_record(&record).await {
            error!(
                "Failed to write error record for {}: {}",
                input.document_id, e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::ErrorKind;
    use crate::model::testing::ScriptedModel;
    use crate::model::{DocumentImage, ModelError};
    use crate::pipeline::{MemorySink, RecordStatus};

    const GIFT_TRIAGE: &str = r#"{"lane_id": "13", "path_id": "gifts", "confidence": 0.88, "handwriting_density": "HIGH"}"#;

    fn input() -> DocumentInput {
        DocumentInput::with_id("gift-1", "card.png", DocumentImage::new(vec![9; 16], "image/png"))
    }

    fn scripted(responses: Vec<Result<String, ModelError>>) -> Arc<ScriptedModel> {
        Arc::new(ScriptedModel::new(responses))
    }

    fn orchestrator(
        triage: Arc<ScriptedModel>,
        analyst: Arc<ScriptedModel>,
        sink: Arc<MemorySink>,
    ) -> Orchestrator {
        Orchestrator::new(Arc::new(Taxonomy::builtin()), triage, analyst, sink)
    }

    #[tokio::test]
    async fn happy_path_steps_through_states() {
        let triage = scripted(vec![Ok(GIFT_TRIAGE.to_string())]);
        let analyst = scripted(vec![Ok(r#"{"extracted_data": {"recipient": "Niece", "date": null, "value": {"value": "$500", "bounding_box": [1, 2, 3, 4]}}}"#.to_string())]);
        let sink = Arc::new(MemorySink::new());
        let orch = orchestrator(triage, analyst, sink.clone());
        let input = input();

        let state = orch.advance(&input, PipelineState::Received).await;
        assert_eq!(state.name(), "triaged");
        let state = orch.advance(&input, state).await;
        assert_eq!(state.name(), "extracted");
        assert!(sink.records().is_empty(), "nothing persisted before Done");
        let state = orch.advance(&input, state).await;
        assert_eq!(state.name(), "done");
        assert!(state.is_terminal());

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, RecordStatus::Processed);
        assert_eq!(sink.raw_count(), 1);

        let again = orch.advance(&input, state).await;
        assert_eq!(again.name(), "done");
    }

    #[tokio::test]
    async fn empty_category_ids_are_unknown_category() {
        let triage = scripted(vec![Ok(
            r#"{"lane_id": "", "path_id": "", "confidence": 0.4, "handwriting_density": "NONE"}"#
                .to_string(),
        )]);
        let analyst = scripted(vec![]);
        let orch = orchestrator(triage, analyst.clone(), Arc::new(MemorySink::new()));

        let state = orch.run(&input()).await;
        assert_eq!(state.failure_kind(), Some(ErrorKind::UnknownCategory));
        assert_eq!(analyst.calls(), 0);
    }

    #[tokio::test]
    async fn extra_fields_pruned_by_default() {
        let triage = scripted(vec![Ok(GIFT_TRIAGE.to_string())]);
        let analyst = scripted(vec![Ok(r#"{"extracted_data": {"recipient": null, "date": null, "value": null, "mood": "festive"}}"#.to_string())]);
        let orch = orchestrator(triage, analyst, Arc::new(MemorySink::new()));

        let done = orch.process(&input()).await.unwrap();
        assert_eq!(done.extraction.extracted_data.len(), 3);
        assert!(done.extraction.field("mood").is_none());
    }

    #[tokio::test]
    async fn extra_fields_fail_when_pruning_disabled() {
        let triage = scripted(vec![Ok(GIFT_TRIAGE.to_string())]);
        let analyst = scripted(vec![Ok(r#"{"extracted_data": {"recipient": null, "date": null, "value": null, "mood": "festive"}}"#.to_string())]);
        let orch = orchestrator(triage, analyst, Arc::new(MemorySink::new()))
            .with_prune_extra_fields(false);

        let err = orch.process(&input()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaCoverageViolation);
    }

    #[tokio::test]
    async fn failure_writes_error_record_with_triage() {
        let triage = scripted(vec![Ok(GIFT_TRIAGE.to_string())]);
        let analyst = scripted(vec![Ok("no idea".to_string())]);
        let sink = Arc::new(MemorySink::new());
        let orch = orchestrator(triage, analyst, sink.clone());

        let state = orch.run(&input()).await;
        assert_eq!(state.failure_kind(), Some(ErrorKind::MalformedModelOutput));

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, RecordStatus::Error);
        assert_eq!(records[0].triage.as_ref().map(|t| t.path_id.as_str()), Some("gifts"));
        assert_eq!(sink.raw_count(), 0);
    }

    #[tokio::test]
    async fn persistence_failure_is_typed() {
        let triage = scripted(vec![Ok(GIFT_TRIAGE.to_string())]);
        let analyst = scripted(vec![Ok(r#"{"extracted_data": {"recipient": null, "date": null, "value": null}}"#.to_string())]);
        let orch = orchestrator(triage, analyst, Arc::new(MemorySink::rejecting()));

        let err = orch.process(&input()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
    }

    #[tokio::test]
    async fn service_errors_retried_under_policy() {
        let triage = scripted(vec![
            Err(ModelError::Connection("reset".into())),
            Ok(GIFT_TRIAGE.to_string()),
        ]);
        let analyst = scripted(vec![Ok(r#"{"extracted_data": {"recipient": null, "date": null, "value": null}}"#.to_string())]);
        let orch = orchestrator(triage.clone(), analyst, Arc::new(MemorySink::new()))
            .with_retry_policy(RetryPolicy::new(2, 0));

        orch.process(&input()).await.unwrap();
        assert_eq!(triage.calls(), 2);
    }

    #[tokio::test]
    async fn service_errors_single_shot_by_default() {
        let triage = scripted(vec![
            Err(ModelError::Connection("reset".into())),
            Ok(GIFT_TRIAGE.to_string()),
        ]);
        let analyst = scripted(vec![]);
        let orch = orchestrator(triage.clone(), analyst.clone(), Arc::new(MemorySink::new()));

        let err = orch.process(&input()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
        assert_eq!(triage.calls(), 1);
        assert_eq!(analyst.calls(), 0);
    }
}
