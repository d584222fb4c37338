//! Strict decoding of model responses.
//!
//! Fence stripping is a pure string transform kept apart from JSON decoding so
//! each can be tested on its own.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use super::ExtractionError;

/// Opening fence at the very start of the response, with an optional
/// language tag.
static LEADING_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^```[A-Za-z0-9_-]*[ \t]*\r?\n?").expect("leading fence pattern should compile")
});

/// Opening fence on a line of its own, after some prose.
static LINE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*```[A-Za-z0-9_-]*[ \t]*\r?\n")
        .expect("line fence pattern should compile")
});

/// Closing fence on a line of its own.
static CLOSING_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*```[ \t]*\r?$").expect("closing fence pattern should compile")
});

/// Remove markdown code-fence wrapping, returning the trimmed body.
///
/// Fences only count at the start of the response or on a line of their own.
/// A JSON line never starts with backticks, so backticks inside string values
/// are left alone. Text without fences is returned trimmed, so applying this
/// twice gives the same result as applying it once.
pub fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let opening = LEADING_FENCE
        .find(trimmed)
        .or_else(|| LINE_FENCE.find(trimmed));
    let Some(opening) = opening else {
        return trimmed;
    };

    let body = &trimmed[opening.end()..];
    if let Some(closing) = CLOSING_FENCE.find(body) {
        return body[..closing.start()].trim();
    }
    // Single-line block, or a closing fence the model cut off.
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Strip fences and decode into `T`, mapping any failure to
/// `MalformedModelOutput`.
pub fn decode_json<T: DeserializeOwned>(response: &str) -> Result<T, ExtractionError> {
    let body = strip_code_fences(response);
    if body.is_empty() {
        return Err(ExtractionError::malformed("empty response body", response));
    }
    serde_json::from_str(body).map_err(|e| ExtractionError::malformed(e.to_string(), response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::ErrorKind;
    use serde_json::{json, Value};

    #[test]
    fn plain_json_is_trimmed() {
        assert_eq!(strip_code_fences("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn json_fence_is_removed() {
        let wrapped = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(wrapped), "{\"a\": 1}");
    }

    #[test]
    fn bare_fence_and_surrounding_prose() {
        let wrapped = "Here you go:\n```\n{\"a\": 1}\n```\nLet me know if you need more.";
        assert_eq!(strip_code_fences(wrapped), "{\"a\": 1}");
    }

    #[test]
    fn single_line_fence() {
        assert_eq!(strip_code_fences("```{\"a\": 1}```"), "{\"a\": 1}");
    }

    #[test]
    fn unterminated_fence() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn stripping_is_idempotent() {
        let inputs = [
            "```json\n{\"a\": 1}\n```",
            "{\"a\": 1}",
            "  ```JSON\r\n[1, 2]\r\n```  ",
            "```json\n{\"a\": 1}",
            "{\"t\": \"a ```b``` c\"}",
            "",
        ];
        for input in inputs {
            let once = strip_code_fences(input);
            assert_eq!(strip_code_fences(once), once, "input: {input:?}");
        }
    }

    #[test]
    fn fenced_and_unfenced_decode_identically() {
        let body = r#"{"lane_id": "09", "nested": {"x": [1, 2]}}"#;
        let fenced = format!("```json\n{}\n```", body);
        let a: Value = decode_json(body).unwrap();
        let b: Value = decode_json(&fenced).unwrap();
        assert_eq!(a, b);
        assert_eq!(a["nested"], json!({"x": [1, 2]}));
    }

    #[test]
    fn backticks_inside_strings_are_kept() {
        let body = r#"{"extracted_data":{"x":null},"fragments":[{"text":"note says ```void``` in margin"}]}"#;
        assert_eq!(strip_code_fences(body), body);

        let fenced = format!("```json\n{}\n```", body);
        assert_eq!(strip_code_fences(&fenced), body);

        let pretty = "{\n  \"text\": \"```\"\n}";
        assert_eq!(strip_code_fences(pretty), pretty);

        let a: Value = decode_json(body).unwrap();
        let b: Value = decode_json(&fenced).unwrap();
        assert_eq!(a, b);
        assert_eq!(a["fragments"][0]["text"], "note says ```void``` in margin");
    }

    #[test]
    fn non_json_is_malformed() {
        let err = decode_json::<Value>("I could not read this document.").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedModelOutput);
    }

    #[test]
    fn empty_is_malformed() {
        let err = decode_json::<Value>("```json\n```").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedModelOutput);
    }
}
