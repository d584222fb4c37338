//! Classification and extraction against the lane taxonomy.
//!
//! Two model calls per document: triage picks a `(lane, path)` pair, then the
//! transcriber extracts that path's schema fields plus free-form fragments.

mod error;
mod parse;
mod prompts;
mod transcriber;
mod triage;
mod types;

pub use error::{ErrorKind, ExtractionError};
pub use parse::{decode_json, strip_code_fences};
pub use prompts::{transcribe_prompt, triage_menu, triage_prompt, TRANSCRIBE_PROMPT, TRIAGE_PROMPT};
pub use transcriber::Transcriber;
pub use triage::TriageClassifier;
pub use types::{
    BoundingBox, ExtractedField, ExtractionResult, Fragment, HandwritingDensity, TriageResult,
};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::testing::ScriptedModel;
    use crate::model::{DocumentImage, ModelError};
    use crate::taxonomy::Taxonomy;

    fn image() -> DocumentImage {
        DocumentImage::new(vec![0xFF, 0xD8, 0xFF], "image/jpeg")
    }

    #[tokio::test]
    async fn classify_parses_fenced_response() {
        let model = Arc::new(ScriptedModel::new([Ok(
            "```json\n{\"lane_id\": \"09\", \"path_id\": \"timber_contracts\", \"confidence\": 0.95, \"handwriting_density\": \"LOW\"}\n```".to_string(),
        )]));
        let classifier = TriageClassifier::new(Arc::new(Taxonomy::builtin()), model.clone());

        let triage = classifier.classify(&image()).await.unwrap();
        assert_eq!(triage.lane_id, "09");
        assert_eq!(triage.path_id, "timber_contracts");
        assert_eq!(triage.confidence, 0.95);
        assert_eq!(triage.handwriting_density, HandwritingDensity::Low);

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("PATH 'timber_contracts'"));
    }

    #[tokio::test]
    async fn classify_passes_unknown_ids_through() {
        let model = Arc::new(ScriptedModel::new([Ok(
            r#"{"lane_id": "99", "path_id": "ghost", "confidence": 0.4, "handwriting_density": "NONE"}"#
                .to_string(),
        )]));
        let classifier = TriageClassifier::new(Arc::new(Taxonomy::builtin()), model);
        let triage = classifier.classify(&image()).await.unwrap();
        assert_eq!(triage.lane_id, "99");
    }

    #[tokio::test]
    async fn classify_rejects_prose() {
        let model = Arc::new(ScriptedModel::new([Ok("This looks like a deed.".to_string())]));
        let classifier = TriageClassifier::new(Arc::new(Taxonomy::builtin()), model);
        let err = classifier.classify(&image()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedModelOutput);
    }

    #[tokio::test]
    async fn classify_rejects_out_of_range_confidence() {
        let model = Arc::new(ScriptedModel::new([Ok(
            r#"{"lane_id": "09", "path_id": "timber_contracts", "confidence": 95, "handwriting_density": "LOW"}"#
                .to_string(),
        )]));
        let classifier = TriageClassifier::new(Arc::new(Taxonomy::builtin()), model);
        let err = classifier.classify(&image()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedModelOutput);
    }

    #[tokio::test]
    async fn classify_surfaces_service_errors() {
        let model = Arc::new(ScriptedModel::new([Err(ModelError::Connection(
            "refused".to_string(),
        ))]));
        let classifier = TriageClassifier::new(Arc::new(Taxonomy::builtin()), model);
        let err = classifier.classify(&image()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
    }

    #[tokio::test]
    async fn transcribe_uses_resolved_schema() {
        let model = Arc::new(ScriptedModel::new([Ok(r#"{
            "extracted_data": {
                "recipient": {"value": "Nephew", "bounding_box": [100, 50, 120, 300]},
                "date": {"value": "2019-12-24", "bounding_box": [130, 50, 150, 200]},
                "value": null
            },
            "fragments": [{"text": "for college", "bbox": [400, 10, 420, 90]}]
        }"#
        .to_string())]));
        let transcriber = Transcriber::new(Arc::new(Taxonomy::builtin()), model.clone());
        let triage = TriageResult {
            lane_id: "13".into(),
            path_id: "gifts".into(),
            confidence: 0.8,
            handwriting_density: HandwritingDensity::High,
        };

        let result = transcriber.transcribe(&image(), &triage).await.unwrap();
        assert_eq!(result.extracted_data.len(), 3);
        assert_eq!(result.found_count(), 2);
        assert_eq!(result.fragments[0].text, "for college");
        assert!(model.prompts()[0].contains("Document Type: Non-Obligatory Gifts"));
    }

    #[tokio::test]
    async fn transcribe_unknown_path_never_calls_model() {
        let model = Arc::new(ScriptedModel::new([]));
        let transcriber = Transcriber::new(Arc::new(Taxonomy::builtin()), model.clone());
        let triage = TriageResult {
            lane_id: "09".into(),
            path_id: "gifts".into(),
            confidence: 0.8,
            handwriting_density: HandwritingDensity::None,
        };

        let err = transcriber.transcribe(&image(), &triage).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownCategory);
        assert_eq!(model.calls(), 0);
    }
}
