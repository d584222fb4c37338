//! Prompt templates for triage and transcription.

use crate::taxonomy::{LanePath, Taxonomy};

/// Classification prompt. `{menu}` is replaced with one line per path.
pub const TRIAGE_PROMPT: &str = r#"You are a Forensic Document Classifier.
Classify this document into EXACTLY one of the following Granular Paths:

{menu}
Rate Handwriting Density (HIGH/LOW/NONE).

Return ONLY JSON in this shape:
{
  "lane_id": "09",
  "path_id": "timber_contracts",
  "confidence": 0.95,
  "handwriting_density": "LOW"
}"#;

/// Extraction prompt. `{path_name}` and `{schema}` are substituted per path.
pub const TRANSCRIBE_PROMPT: &str = r#"You are a Forensic Analyst.
Document Type: {path_name}

STRICT REQUIREMENT: Extract data EXACTLY according to this Schema:
{schema}

- Return an entry in "extracted_data" for EVERY field in the schema.
- For every field found, return the value AND the bounding_box [ymin, xmin, ymax, xmax].
- If a field is missing, set it to null.
- Capture ANY other 'marginalia' or handwritten notes in a separate 'fragments' array.

Output ONLY JSON:
{
  "extracted_data": { "<field>": { "value": ..., "bounding_box": [ymin, xmin, ymax, xmax] } },
  "fragments": [ { "text": "...", "bbox": [ymin, xmin, ymax, xmax] } ]
}"#;

/// One menu line per `(lane, path)` pair, in taxonomy order.
pub fn triage_menu(taxonomy: &Taxonomy) -> String {
    taxonomy
        .all_paths()
        .map(|(lane, path)| {
            format!(
                "- LANE {} / PATH '{}': {} ({})\n",
                lane.id, path.id, path.name, path.description
            )
        })
        .collect()
}

pub fn triage_prompt(taxonomy: &Taxonomy) -> String {
    TRIAGE_PROMPT.replace("{menu}", &triage_menu(taxonomy))
}

pub fn transcribe_prompt(path: &LanePath) -> String {
    TRANSCRIBE_PROMPT
        .replace("{path_name}", &path.name)
        .replace("{schema}", &path.extraction_schema.to_prompt_json())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_lists_every_path() {
        let taxonomy = Taxonomy::builtin();
        let menu = triage_menu(&taxonomy);
        assert_eq!(menu.lines().count(), taxonomy.path_count());
        assert!(menu.contains(
            "- LANE 09 / PATH 'timber_contracts': Timber Harvesting Contracts (Stumpage, thinning, and logging agreements)"
        ));
    }

    #[test]
    fn triage_prompt_embeds_menu() {
        let prompt = triage_prompt(&Taxonomy::builtin());
        assert!(!prompt.contains("{menu}"));
        assert!(prompt.contains("PATH 'ammo'"));
        assert!(prompt.contains("HIGH/LOW/NONE"));
    }

    #[test]
    fn transcribe_prompt_embeds_schema_verbatim() {
        let taxonomy = Taxonomy::builtin();
        let path = taxonomy.find_path("09", "timber_contracts").unwrap();
        let prompt = transcribe_prompt(path);
        assert!(prompt.contains("Document Type: Timber Harvesting Contracts"));
        assert!(prompt.contains(&path.extraction_schema.to_prompt_json()));
        assert!(prompt.contains("Did this go to Joint or Separate?"));
        assert!(!prompt.contains("{schema}"));
    }
}
