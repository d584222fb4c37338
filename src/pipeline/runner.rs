//! Concurrent batch processing with progress events.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};

use super::{DocumentInput, Orchestrator, ProcessedDocument};
use crate::ingestion::{ErrorKind, ExtractionError};

/// Progress events emitted while a batch runs.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    BatchStarted {
        total: usize,
    },
    DocumentStarted {
        document_id: String,
        file_name: String,
    },
    DocumentCompleted {
        document_id: String,
        file_name: String,
        lane_id: String,
        path_id: String,
        fields_found: usize,
        fragments: usize,
    },
    DocumentFailed {
        document_id: String,
        file_name: String,
        kind: ErrorKind,
        error: String,
    },
    BatchCompleted {
        succeeded: usize,
        failed: usize,
    },
}

/// Result for one document of a batch.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub document_id: String,
    pub file_name: String,
    pub result: Result<ProcessedDocument, ExtractionError>,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub failures_by_kind: BTreeMap<ErrorKind, usize>,
    /// Grouped by worker, not in submission order.
    pub outcomes: Vec<BatchOutcome>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    fn push(&mut self, outcome: BatchOutcome) {
        match &outcome.result {
            Ok(_) => self.succeeded += 1,
            Err(e) => {
                self.failed += 1;
                *self.failures_by_kind.entry(e.kind()).or_default() += 1;
            }
        }
        self.outcomes.push(outcome);
    }
}

/// Runs independent pipelines for many documents, at most `workers` at once.
pub struct BatchRunner {
    orchestrator: Arc<Orchestrator>,
    workers: usize,
}

impl BatchRunner {
    pub fn new(orchestrator: Arc<Orchestrator>, workers: usize) -> Self {
        Self {
            orchestrator,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Process every input. Per-document failures never abort the batch.
    pub async fn run(
        &self,
        inputs: Vec<DocumentInput>,
        event_tx: mpsc::Sender<PipelineEvent>,
    ) -> BatchSummary {
        let total = inputs.len();
        info!("Processing {} documents with {} workers", total, self.workers);
        let _ = event_tx.send(PipelineEvent::BatchStarted { total }).await;

        // Workers pull from the front so a single worker keeps submission order.
        let work_queue: Arc<Mutex<VecDeque<DocumentInput>>> =
            Arc::new(Mutex::new(inputs.into_iter().collect()));

        let mut handles = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers.min(total.max(1)) {
            let work_queue = work_queue.clone();
            let orchestrator = self.orchestrator.clone();
            let event_tx = event_tx.clone();

            handles.push(tokio::spawn(async move {
                let mut outcomes = Vec::new();
                loop {
                    let input = {
                        let mut queue = work_queue.lock().await;
                        queue.pop_front()
                    };
                    let Some(input) = input else {
                        break;
                    };
                    debug!("Worker {} picked up {}", worker_id, input.document_id);
                    outcomes.push(process_one(&orchestrator, input, &event_tx).await);
                }
                outcomes
            }));
        }

        let mut summary = BatchSummary::default();
        for handle in handles {
            match handle.await {
                Ok(outcomes) => outcomes.into_iter().for_each(|o| summary.push(o)),
                Err(e) => error!("Batch worker task failed: {}", e),
            }
        }

        info!(
            "Batch complete: {} succeeded, {} failed",
            summary.succeeded, summary.failed
        );
        let _ = event_tx
            .send(PipelineEvent::BatchCompleted {
                succeeded: summary.succeeded,
                failed: summary.failed,
            })
            .await;
        summary
    }
}

async fn process_one(
    orchestrator: &Orchestrator,
    input: DocumentInput,
    event_tx: &mpsc::Sender<PipelineEvent>,
) -> BatchOutcome {
    let _ = event_tx
        .send(PipelineEvent::DocumentStarted {
            document_id: input.document_id.clone(),
            file_name: input.file_name.clone(),
        })
        .await;

    let result = orchestrator.process(&input).await;

    let event = match &result {
        Ok(done) => PipelineEvent::DocumentCompleted {
            document_id: done.document_id.clone(),
            file_name: done.file_name.clone(),
            lane_id: done.triage.lane_id.clone(),
            path_id: done.triage.path_id.clone(),
            fields_found: done.extraction.found_count(),
            fragments: done.extraction.fragments.len(),
        },
        Err(e) => PipelineEvent::DocumentFailed {
            document_id: input.document_id.clone(),
            file_name: input.file_name.clone(),
            kind: e.kind(),
            error: e.to_string(),
        },
    };
    let _ = event_tx.send(event).await;

    BatchOutcome {
        document_id: input.document_id,
        file_name: input.file_name,
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::testing::ScriptedModel;
    use crate::model::{DocumentImage, DocumentModel, ModelError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use crate::pipeline::MemorySink;
    use crate::taxonomy::Taxonomy;

    #[tokio::test]
    async fn batch_counts_failures_by_kind() {
        // Triage answers are consumed in whatever order workers start; with
        // one worker the order is deterministic.
        let triage = Arc::new(ScriptedModel::new([
            Ok(r#"{"lane_id": "17", "path_id": "ammo", "confidence": 0.9, "handwriting_density": "NONE"}"#.to_string()),
            Ok(r#"{"lane_id": "99", "path_id": "ghost", "confidence": 0.2, "handwriting_density": "NONE"}"#.to_string()),
            Ok("not json".to_string()),
        ]));
        let analyst = Arc::new(ScriptedModel::new([Ok(
            r#"{"extracted_data": {"retailer": "Gander", "caliber": ".308", "price": 42.5}}"#.to_string(),
        )]));
        let sink = Arc::new(MemorySink::new());
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(Taxonomy::builtin()),
            triage,
            analyst.clone(),
            sink.clone(),
        ));
        let runner = BatchRunner::new(orchestrator, 1);

        let inputs = (0..3)
            .map(|i| {
                DocumentInput::with_id(
                    format!("doc-{i}"),
                    format!("scan-{i}.jpg"),
                    DocumentImage::new(vec![i as u8; 4], "image/jpeg"),
                )
            })
            .collect();

        let (tx, mut rx) = mpsc::channel(64);
        let summary = runner.run(inputs, tx).await;

        assert_eq!(summary.total(), 3);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.failures_by_kind.get(&ErrorKind::UnknownCategory), Some(&1));
        assert_eq!(
            summary.failures_by_kind.get(&ErrorKind::MalformedModelOutput),
            Some(&1)
        );
        assert_eq!(analyst.calls(), 1);
        assert_eq!(sink.records().len(), 3);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(PipelineEvent::BatchStarted { total: 3 })));
        assert!(matches!(
            events.last(),
            Some(PipelineEvent::BatchCompleted { succeeded: 1, failed: 2 })
        ));
        assert_eq!(events.len(), 8);
    }

    /// Fixed response after a short delay, tracking peak concurrent calls.
    struct InFlightModel {
        response: String,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl InFlightModel {
        fn new(response: &str) -> Arc<Self> {
            Arc::new(Self {
                response: response.to_string(),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }

        fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DocumentModel for InFlightModel {
        fn name(&self) -> String {
            "in-flight".to_string()
        }

        fn is_available(&self) -> bool {
            true
        }

        fn availability_hint(&self) -> String {
            String::new()
        }

        async fn infer(&self, _prompt: &str, _image: &DocumentImage) -> Result<String, ModelError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(25)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    #[tokio::test]
    async fn workers_run_concurrently_within_bound() {
        let triage = InFlightModel::new(
            r#"{"lane_id": "17", "path_id": "ammo", "confidence": 0.9, "handwriting_density": "NONE"}"#,
        );
        let analyst = InFlightModel::new(
            r#"{"extracted_data": {"retailer": "Gander", "caliber": ".308", "price": 42.5}}"#,
        );
        let sink = Arc::new(MemorySink::new());
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(Taxonomy::builtin()),
            triage.clone(),
            analyst.clone(),
            sink.clone(),
        ));
        let runner = BatchRunner::new(orchestrator, 3);

        let inputs: Vec<DocumentInput> = (0..9)
            .map(|i| {
                DocumentInput::with_id(
                    format!("doc-{i}"),
                    format!("receipt-{i}.png"),
                    DocumentImage::new(vec![i as u8; 4], "image/png"),
                )
            })
            .collect();

        let (tx, _rx) = mpsc::channel(64);
        let summary = runner.run(inputs, tx).await;

        assert_eq!(summary.succeeded, 9);
        let mut ids: Vec<&str> = summary
            .outcomes
            .iter()
            .map(|o| o.document_id.as_str())
            .collect();
        ids.sort_unstable();
        let mut expected: Vec<String> = (0..9).map(|i| format!("doc-{i}")).collect();
        expected.sort_unstable();
        assert_eq!(ids, expected);

        assert!(triage.peak() > 1, "triage peak {}", triage.peak());
        assert!(triage.peak() <= 3, "triage peak {}", triage.peak());
        assert!(analyst.peak() <= 3, "analyst peak {}", analyst.peak());
        assert_eq!(sink.records().len(), 9);
    }

    #[test]
    fn zero_workers_clamped() {
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(Taxonomy::builtin()),
            Arc::new(ScriptedModel::new([])),
            Arc::new(ScriptedModel::new([])),
            Arc::new(MemorySink::new()),
        ));
        assert_eq!(BatchRunner::new(orchestrator, 0).workers(), 1);
    }
}
