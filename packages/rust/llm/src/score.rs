//! Parsing of relevance judgments out of raw model output.
//!
//! Models wrap the requested JSON in prose, code fences, or trailing
//! commentary. The first balanced `{...}` object is parsed as JSON; if that
//! fails, line regexes pick out the `reliable` and `reason` fields.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use sourcescout_shared::{Result, SourceScoutError, Verdict};

/// Rationale used when the model gives a verdict without one.
pub const NO_RATIONALE: &str = "no rationale given";

/// A parsed keep/discard decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Judgment {
    pub verdict: Verdict,
    pub rationale: String,
}

/// Parse a model response into a [`Judgment`].
pub fn parse_judgment(raw: &str) -> Result<Judgment> {
    if let Some(judgment) = first_json_object(raw)
        .and_then(|obj| serde_json::from_str::<Value>(obj).ok())
        .and_then(|value| match value {
            Value::Object(map) => from_object(&map),
            _ => None,
        })
    {
        return Ok(judgment);
    }

    from_lines(raw).ok_or_else(|| {
        let preview: String = raw.chars().take(120).collect();
        SourceScoutError::parse(format!("no verdict in model response: {preview:?}"))
    })
}

fn from_object(map: &Map<String, Value>) -> Option<Judgment> {
    let verdict = field(map, "reliable")
        .and_then(verdict_from_value)
        .or_else(|| field(map, "relevant").and_then(verdict_from_value))
        .or_else(|| field(map, "verdict").and_then(verdict_from_value))?;

    let rationale = field(map, "reason")
        .or_else(|| field(map, "rationale"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    Some(Judgment {
        verdict,
        rationale: rationale_or_default(rationale),
    })
}

/// Case-insensitive key lookup.
fn field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn verdict_from_value(value: &Value) -> Option<Verdict> {
    match value {
        Value::Bool(true) => Some(Verdict::Kept),
        Value::Bool(false) => Some(Verdict::Discarded),
        Value::String(s) => verdict_from_word(s),
        _ => None,
    }
}

fn verdict_from_word(word: &str) -> Option<Verdict> {
    match word.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "kept" | "keep" | "approved" | "approve" | "relevant" => {
            Some(Verdict::Kept)
        }
        "no" | "false" | "discarded" | "discard" | "rejected" | "reject" | "irrelevant" => {
            Some(Verdict::Discarded)
        }
        _ => None,
    }
}

fn from_lines(raw: &str) -> Option<Judgment> {
    static RELIABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?i)"?reliable"?\s*:\s*"?(yes|no)\b"#).expect("valid regex")
    });
    static REASON_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?i)"?reason"?\s*:\s*"([^"]+)""#).expect("valid regex")
    });

    let verdict = RELIABLE_RE
        .captures(raw)
        .and_then(|c| verdict_from_word(&c[1]))?;
    let rationale = REASON_RE
        .captures(raw)
        .map(|c| c[1].to_string())
        .unwrap_or_default();

    Some(Judgment {
        verdict,
        rationale: rationale_or_default(&rationale),
    })
}

fn rationale_or_default(rationale: &str) -> String {
    let trimmed = rationale.trim();
    if trimmed.is_empty() {
        NO_RATIONALE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Slice of the first balanced `{...}` in `raw`, ignoring braces in strings.
fn first_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let j = parse_judgment(
            r#"{"url": "https://a.example", "reliable": "Yes", "reason": "Peer-reviewed case studies."}"#,
        )
        .unwrap();
        assert_eq!(j.verdict, Verdict::Kept);
        assert_eq!(j.rationale, "Peer-reviewed case studies.");
    }

    #[test]
    fn parses_json_wrapped_in_prose_and_fences() {
        let raw = "Here is my assessment:\n```json\n{\"reliable\": \"No\", \"reason\": \"Vendor brochure {not} research.\"}\n```\nLet me know!";
        let j = parse_judgment(raw).unwrap();
        assert_eq!(j.verdict, Verdict::Discarded);
        assert_eq!(j.rationale, "Vendor brochure {not} research.");
    }

    #[test]
    fn accepts_alternate_fields() {
        let j = parse_judgment(r#"{"relevant": true, "rationale": "On topic."}"#).unwrap();
        assert_eq!(j.verdict, Verdict::Kept);
        assert_eq!(j.rationale, "On topic.");

        let j = parse_judgment(r#"{"Verdict": "discarded"}"#).unwrap();
        assert_eq!(j.verdict, Verdict::Discarded);
        assert_eq!(j.rationale, NO_RATIONALE);
    }

    #[test]
    fn falls_back_to_line_regex() {
        // Unquoted keys and a trailing comma: not valid JSON.
        let raw = "{\n  url: \"https://a.example\",\n  \"reliable\": \"Yes\",\n  \"reason\": \"Covers MES rollouts\",\n}";
        let j = parse_judgment(raw).unwrap();
        assert_eq!(j.verdict, Verdict::Kept);
        assert_eq!(j.rationale, "Covers MES rollouts");
    }

    #[test]
    fn malformed_output_is_parse_error() {
        for raw in ["", "I cannot evaluate this.", "{\"reliable\": \"maybe\"}", "{unclosed"] {
            let err = parse_judgment(raw).unwrap_err();
            assert!(matches!(err, SourceScoutError::Parse { .. }), "{raw:?}");
        }
    }

    #[test]
    fn finds_first_balanced_object() {
        assert_eq!(first_json_object("x {\"a\": {\"b\": 1}} {\"c\": 2}"), Some("{\"a\": {\"b\": 1}}"));
        assert_eq!(first_json_object("{\"s\": \"}\"}"), Some("{\"s\": \"}\"}"));
        assert_eq!(first_json_object("no braces"), None);
    }
}
