//! Triage: pick one lane/path for a document and rate its handwriting.

use std::sync::Arc;

use tracing::{debug, info};

use super::parse::decode_json;
use super::prompts::triage_prompt;
use super::{ExtractionError, TriageResult};
use crate::model::{DocumentImage, DocumentModel};
use crate::taxonomy::Taxonomy;

/// Classifies documents against the full path menu.
///
/// The returned ids are not checked against the taxonomy here; that is the
/// orchestrator's call.
pub struct TriageClassifier {
    taxonomy: Arc<Taxonomy>,
    model: Arc<dyn DocumentModel>,
    prompt: String,
}

impl TriageClassifier {
    pub fn new(taxonomy: Arc<Taxonomy>, model: Arc<dyn DocumentModel>) -> Self {
        // The menu depends only on the taxonomy, which never changes after load.
        let prompt = triage_prompt(&taxonomy);
        Self {
            taxonomy,
            model,
            prompt,
        }
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn model_name(&self) -> String {
        self.model.name()
    }

    pub async fn classify(&self, image: &DocumentImage) -> Result<TriageResult, ExtractionError> {
        debug!(
            "Triage: classifying {} ({} bytes) against {} paths with {}",
            image.media_type,
            image.len(),
            self.taxonomy.path_count(),
            self.model.name()
        );

        let response = self.model.infer(&self.prompt, image).await?;
        let triage: TriageResult = decode_json(&response)?;
        triage
            .check()
            .map_err(|reason| ExtractionError::malformed(reason, &response))?;

        info!(
            "Triage: lane {} / path '{}' (confidence {:.2}, handwriting {})",
            triage.lane_id,
            triage.path_id,
            triage.confidence,
            triage.handwriting_density.as_str()
        );
        Ok(triage)
    }
}
