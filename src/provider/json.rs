//! Extraction of structured JSON from model CLI output, which may wrap the
//! payload in a result envelope, markdown fences or surrounding prose.

use serde::Deserialize;

/// The model CLI's `--output-format json` envelope.
#[derive(Deserialize)]
struct ModelEnvelope {
    result: String,

    #[serde(default)]
    total_cost_usd: Option<f64>,
}

/// Unwrap the CLI envelope if present, returning the inner content and the
/// reported cost. Raw output passes through with no cost attached.
pub fn unwrap_envelope(raw: &str) -> (String, Option<f64>) {
    match serde_json::from_str::<ModelEnvelope>(raw) {
        Ok(envelope) => (envelope.result, envelope.total_cost_usd),
        Err(_) => (raw.to_string(), None),
    }
}

/// Pull the first valid JSON object out of model output.
pub fn extract_json(s: &str) -> Option<String> {
    let trimmed = s.trim();

    // First try: the whole string is valid JSON
    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
    {
        return Some(trimmed.to_string());
    }

    // Second try: extract from markdown code block
    let re = regex::Regex::new(r"```(?:json)?\s*\n?([\s\S]*?)\n?```").ok()?;
    for cap in re.captures_iter(s) {
        let potential_json = cap.get(1)?.as_str().trim();
        if serde_json::from_str::<serde_json::Value>(potential_json).is_ok() {
            return Some(potential_json.to_string());
        }
    }

    // Third try: find JSON object pattern
    let brace_start = s.find('{')?;
    let mut depth = 0;
    let mut end = brace_start;

    for (i, c) in s[brace_start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    end = brace_start + i + 1;
                    break;
                }
            }
            _ => {}
        }
    }

    if depth == 0 && end > brace_start {
        let potential_json = &s[brace_start..end];
        if serde_json::from_str::<serde_json::Value>(potential_json).is_ok() {
            return Some(potential_json.to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_unwrapped_with_cost() {
        let raw = r#"{"result": "{\"icp\": \"ops leads\"}", "total_cost_usd": 0.12}"#;
        let (content, cost) = unwrap_envelope(raw);
        assert_eq!(content, r#"{"icp": "ops leads"}"#);
        assert_eq!(cost, Some(0.12));
    }

    #[test]
    fn test_raw_output_passes_through() {
        let (content, cost) = unwrap_envelope("plain text");
        assert_eq!(content, "plain text");
        assert!(cost.is_none());
    }

    #[test]
    fn test_extract_whole_string() {
        let json = extract_json(r#"  {"a": 1}  "#).unwrap();
        assert_eq!(json, r#"{"a": 1}"#);
    }

    #[test]
    fn test_extract_from_fenced_block() {
        let s = "Here is the analysis:\n```json\n{\"a\": 1}\n```\nDone.";
        assert_eq!(extract_json(s).unwrap(), r#"{"a": 1}"#);
    }

    #[test]
    fn test_extract_from_surrounding_prose() {
        let s = "The result is {\"a\": {\"b\": 2}} as requested.";
        assert_eq!(extract_json(s).unwrap(), r#"{"a": {"b": 2}}"#);
    }

    #[test]
    fn test_no_json_found() {
        assert!(extract_json("nothing structured here").is_none());
        assert!(extract_json("{broken").is_none());
    }
}
