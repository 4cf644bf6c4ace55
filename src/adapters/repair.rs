//! Recovering prediction JSON from free-form model output.
//!
//! Text-generation models are asked for pure JSON but routinely wrap it in
//! Markdown fences, prepend prose, or use single quotes. Recovery steps:
//!
//! 1. Strip Markdown code fences
//! 2. Extract the first balanced `{...}` block by bracket scanning, skipping
//!    braces inside `"` or `'` quoted strings
//! 3. Parse; on failure, substitute every `'` with `"` once and parse again
//!
//! Step 3 is lossy: an apostrophe inside an evidence phrase becomes a quote
//! and breaks (or silently alters) the JSON.

use tracing::{debug, warn};

use super::error::MalformedOutput;
use crate::domain::PredictionResult;

/// Remove Markdown code fence markers
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Find the first balanced `{...}` block
///
/// Braces inside quoted strings are ignored. Both `"` and `'` open a string,
/// since the quote repair below only runs on the extracted block. A string is
/// closed only by the quote that opened it. Returns `None` when the text has
/// no `{` or the first block never closes.
pub fn extract_json_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if let Some(open) = quote {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                c if c == open => quote = None,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' | '\'' => quote = Some(ch),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse model output into a prediction result
pub fn parse_prediction(text: &str) -> Result<PredictionResult, MalformedOutput> {
    let cleaned = strip_code_fences(text);
    let block = extract_json_block(&cleaned).ok_or(MalformedOutput::NoJsonBlock)?;
    debug!(block_len = block.len(), "Extracted JSON block from model output");

    match serde_json::from_str::<PredictionResult>(block) {
        Ok(result) => Ok(result),
        Err(first_error) => {
            warn!(
                error = %first_error,
                "Model JSON did not parse, retrying with lossy quote repair"
            );
            let repaired = block.replace('\'', "\"");
            serde_json::from_str(&repaired)
                .map_err(|e| MalformedOutput::Unparseable(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        let text = "```json\n{\"cids\": []}\n```";
        assert_eq!(strip_code_fences(text), "{\"cids\": []}");
    }

    #[test]
    fn test_extract_first_balanced_block() {
        let text = r#"Resposta: {"a": {"b": 1}} e depois {"c": 2}"#;
        assert_eq!(extract_json_block(text), Some(r#"{"a": {"b": 1}}"#));
    }

    #[test]
    fn test_extract_ignores_braces_in_strings() {
        let text = r#"{"evidencia": ["valor } estranho {"]} fim"#;
        assert_eq!(
            extract_json_block(text),
            Some(r#"{"evidencia": ["valor } estranho {"]}"#)
        );
    }

    #[test]
    fn test_extract_handles_escaped_quotes() {
        let text = r#"{"a": "aspas \" e } chave"}"#;
        assert_eq!(extract_json_block(text), Some(text));
    }

    #[test]
    fn test_extract_ignores_braces_in_single_quoted_strings() {
        let text = "{'evidencia': ['chave } solta', \"d'água {\"]} fim";
        assert_eq!(
            extract_json_block(text),
            Some("{'evidencia': ['chave } solta', \"d'água {\"]}")
        );
    }

    #[test]
    fn test_extract_unbalanced() {
        assert_eq!(extract_json_block(r#"{"cids": [ "#), None);
        assert_eq!(extract_json_block("sem json aqui"), None);
    }

    #[test]
    fn test_parse_prediction_plain() {
        let result = parse_prediction(
            r#"{"cids": [{"cid": "I10", "tipo": "principal", "evidencia": ["HAS"]}]}"#,
        )
        .unwrap();
        assert_eq!(result.cids.len(), 1);
        assert_eq!(result.cids[0].code, "I10");
    }

    #[test]
    fn test_parse_prediction_single_quotes() {
        let result = parse_prediction(
            "{'cids': [{'cid': 'E11.9', 'tipo': 'secundário', 'evidencia': ['DM2']}]}",
        )
        .unwrap();
        assert_eq!(result.cids[0].code, "E11.9");
        assert_eq!(result.cids[0].evidence, vec!["DM2"]);
    }

    #[test]
    fn test_parse_prediction_missing_cids_key() {
        let result = parse_prediction(r#"{"codes": []}"#);
        assert!(matches!(result, Err(MalformedOutput::Unparseable(_))));
    }
}
