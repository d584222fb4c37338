//! Schema-driven transcription of a triaged document.

use std::sync::Arc;

use tracing::{debug, info};

use super::parse::decode_json;
use super::prompts::transcribe_prompt;
use super::{ExtractionError, ExtractionResult, TriageResult};
use crate::model::{DocumentImage, DocumentModel};
use crate::taxonomy::Taxonomy;

/// Extracts the fields declared by the triaged path's schema.
///
/// Never falls back to another schema: an unresolvable path is an error.
/// Coverage of the response is checked by the orchestrator.
pub struct Transcriber {
    taxonomy: Arc<Taxonomy>,
    model: Arc<dyn DocumentModel>,
}

impl Transcriber {
    pub fn new(taxonomy: Arc<Taxonomy>, model: Arc<dyn DocumentModel>) -> Self {
        Self { taxonomy, model }
    }

    pub fn model_name(&self) -> String {
        self.model.name()
    }

    pub async fn transcribe(
        &self,
        image: &DocumentImage,
        triage: &TriageResult,
    ) -> Result<ExtractionResult, ExtractionError> {
        let path = self
            .taxonomy
            .find_path(&triage.lane_id, &triage.path_id)
            .ok_or_else(|| ExtractionError::unknown_category(&triage.lane_id, &triage.path_id))?;

        info!("Transcribe: extracting with schema '{}'", path.name);
        debug!(
            "Transcribe: {} declared fields, model {}",
            path.extraction_schema.len(),
            self.model.name()
        );

        let prompt = transcribe_prompt(path);
        let response = self.model.infer(&prompt, image).await?;
        let result: ExtractionResult = decode_json(&response)?;

        debug!(
            "Transcribe: {} fields returned ({} found), {} fragments",
            result.extracted_data.len(),
            result.found_count(),
            result.fragments.len()
        );
        Ok(result)
    }
}
