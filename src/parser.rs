//! Decoding of free-form model replies into an [`Enrichment`].
//!
//! Models are asked for JSON but routinely wrap it in chatter, drop fields,
//! or cut off mid-object. The parser tries, in order:
//!
//! 1. **Embedded object**: the span from the first `{` to the last `}`,
//!    accepted only if it parses and has `summary`, `topic`, `sentiment`
//!    and `key_entities` keys.
//! 2. **Whole text**: the entire reply parsed as a JSON object.
//! 3. **Field recovery**: `"field": "value"` patterns matched one by one,
//!    with defaults for whatever is missing. Never fails.

use crate::models::Enrichment;
use crate::utils::{looks_truncated, truncate_chars, truncate_for_log};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Keys an embedded object must carry to be accepted.
const REQUIRED_KEYS: [&str; 4] = ["summary", "topic", "sentiment", "key_entities"];

/// Characters of raw reply used as the summary when none can be recovered.
pub const RAW_SUMMARY_CHARS: usize = 500;

/// Which strategy produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    EmbeddedObject,
    WholeText,
    FieldRecovery,
}

fn field_pattern(key: &str) -> Regex {
    Regex::new(&format!(r#"(?s)"{}":\s*"([^"]*)""#, key)).expect("static field pattern")
}

static SUMMARY_FIELD: Lazy<Regex> = Lazy::new(|| field_pattern("summary"));
static TOPIC_FIELD: Lazy<Regex> = Lazy::new(|| field_pattern("topic"));
static SENTIMENT_FIELD: Lazy<Regex> = Lazy::new(|| field_pattern("sentiment"));
static FUNNY_FIELD: Lazy<Regex> = Lazy::new(|| field_pattern("funny_translation"));

/// Parse a model reply. Total: always returns a result.
pub fn parse_response(raw: &str) -> Enrichment {
    let (enrichment, strategy) = parse_with_strategy(raw);
    debug!(?strategy, "Parsed model reply");
    enrichment
}

/// Parse a model reply and report which strategy succeeded.
pub fn parse_with_strategy(raw: &str) -> (Enrichment, Strategy) {
    if let Some(enrichment) = embedded_object(raw) {
        return (enrichment, Strategy::EmbeddedObject);
    }
    if let Some(enrichment) = whole_text(raw) {
        return (enrichment, Strategy::WholeText);
    }
    warn!(
        response_preview = %truncate_for_log(raw, 300),
        "Model reply is not usable JSON; recovering fields individually"
    );
    (recover_fields(raw), Strategy::FieldRecovery)
}

fn embedded_object(raw: &str) -> Option<Enrichment> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    let map = match serde_json::from_str::<Value>(&raw[start..=end]) {
        Ok(Value::Object(map)) => map,
        _ => return None,
    };
    if !REQUIRED_KEYS.iter().all(|k| map.contains_key(*k)) {
        debug!("Embedded object lacks required keys");
        return None;
    }
    Some(from_object(&map))
}

fn whole_text(raw: &str) -> Option<Enrichment> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Some(from_object(&map)),
        Ok(_) => None,
        Err(e) => {
            if looks_truncated(&e) {
                warn!(error = %e, "Model reply looks truncated");
            }
            None
        }
    }
}

fn capture(re: &Regex, raw: &str) -> Option<String> {
    re.captures(raw).map(|c| c[1].to_string())
}

fn recover_fields(raw: &str) -> Enrichment {
    Enrichment {
        summary: Some(
            capture(&SUMMARY_FIELD, raw).unwrap_or_else(|| truncate_chars(raw, RAW_SUMMARY_CHARS)),
        ),
        topic: Some(capture(&TOPIC_FIELD, raw).unwrap_or_else(|| "Unknown".to_string())),
        sentiment: Some(capture(&SENTIMENT_FIELD, raw).unwrap_or_else(|| "Unknown".to_string())),
        funny_translation: Some(capture(&FUNNY_FIELD, raw).unwrap_or_default()),
        key_entities: Some(Vec::new()),
        core_points_markdown: Some(String::new()),
    }
}

/// Build an enrichment from a JSON object, tolerating odd value types.
fn from_object(map: &Map<String, Value>) -> Enrichment {
    Enrichment {
        funny_translation: text_field(map, "funny_translation"),
        summary: text_field(map, "summary"),
        topic: text_field(map, "topic"),
        sentiment: text_field(map, "sentiment"),
        key_entities: map.get("key_entities").and_then(entity_list),
        core_points_markdown: text_field(map, "core_points_markdown"),
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        // bullet lists sometimes come back as arrays
        Value::Array(items) => Some(items.iter().filter_map(as_text).collect::<Vec<_>>().join("\n")),
        other => Some(other.to_string()),
    }
}

fn text_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(as_text)
}

fn entity_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::Object(obj) => obj.get("name").and_then(as_text),
                    other => as_text(other),
                })
                .collect(),
        ),
        Value::String(s) => Some(
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_embedded_object_in_chatter() {
        let raw = r#"Sure! Here is the result: {"summary": "A storm hit the coast.", "topic": "weather", "sentiment": "neutral", "key_entities": ["NOAA"], "funny_translation": "Big wet sky tantrum!", "core_points_markdown": "- storm\n- coast"} Hope this helps!"#;
        let (enrichment, strategy) = parse_with_strategy(raw);
        assert_eq!(strategy, Strategy::EmbeddedObject);
        assert_eq!(
            enrichment,
            Enrichment {
                funny_translation: Some("Big wet sky tantrum!".to_string()),
                summary: Some("A storm hit the coast.".to_string()),
                topic: Some("weather".to_string()),
                sentiment: Some("neutral".to_string()),
                key_entities: Some(strings(&["NOAA"])),
                core_points_markdown: Some("- storm\n- coast".to_string()),
            }
        );
    }

    #[test]
    fn test_embedded_object_across_lines_in_code_fence() {
        let raw = "```json\n{\n  \"summary\": \"S\",\n  \"topic\": \"tech\",\n  \"sentiment\": \"positive\",\n  \"key_entities\": []\n}\n```";
        let (enrichment, strategy) = parse_with_strategy(raw);
        assert_eq!(strategy, Strategy::EmbeddedObject);
        assert_eq!(enrichment.topic.as_deref(), Some("tech"));
        assert_eq!(enrichment.funny_translation, None);
    }

    #[test]
    fn test_unquoted_keys_fall_through_to_field_recovery() {
        let raw = r#"summary: "Heavy rainfall expected." topic: "weather""#;
        let (enrichment, strategy) = parse_with_strategy(raw);
        assert_eq!(strategy, Strategy::FieldRecovery);
        assert_eq!(enrichment.summary.as_deref(), Some(raw));
        assert_eq!(enrichment.topic.as_deref(), Some("Unknown"));
        assert_eq!(enrichment.sentiment.as_deref(), Some("Unknown"));
        assert_eq!(enrichment.key_entities, Some(Vec::new()));
        assert_eq!(enrichment.funny_translation.as_deref(), Some(""));
        assert_eq!(enrichment.core_points_markdown.as_deref(), Some(""));
    }

    #[test]
    fn test_object_missing_required_keys_uses_whole_text() {
        let raw = r#"{"summary": "Only a summary", "topic": "politics"}"#;
        let (enrichment, strategy) = parse_with_strategy(raw);
        assert_eq!(strategy, Strategy::WholeText);
        assert_eq!(enrichment.summary.as_deref(), Some("Only a summary"));
        assert_eq!(enrichment.sentiment, None);
        assert_eq!(enrichment.key_entities, None);
    }

    #[test]
    fn test_truncated_object_recovers_fields() {
        let raw = r#"{"funny_translation": "Chaos!", "summary": "Markets fell sharply.", "topic": "finance", "sentiment": "negative", "key_entities": ["Dow", "#;
        let (enrichment, strategy) = parse_with_strategy(raw);
        assert_eq!(strategy, Strategy::FieldRecovery);
        assert_eq!(enrichment.summary.as_deref(), Some("Markets fell sharply."));
        assert_eq!(enrichment.topic.as_deref(), Some("finance"));
        assert_eq!(enrichment.sentiment.as_deref(), Some("negative"));
        assert_eq!(enrichment.funny_translation.as_deref(), Some("Chaos!"));
        assert_eq!(enrichment.key_entities, Some(Vec::new()));
    }

    #[test]
    fn test_plain_prose_summary_is_bounded() {
        let raw = "word ".repeat(300);
        let (enrichment, strategy) = parse_with_strategy(&raw);
        assert_eq!(strategy, Strategy::FieldRecovery);
        assert_eq!(enrichment.summary.unwrap().chars().count(), RAW_SUMMARY_CHARS);
    }

    #[test]
    fn test_non_object_json_is_not_accepted() {
        let (enrichment, strategy) = parse_with_strategy("42");
        assert_eq!(strategy, Strategy::FieldRecovery);
        assert_eq!(enrichment.summary.as_deref(), Some("42"));
    }

    #[test]
    fn test_empty_reply() {
        let enrichment = parse_response("");
        assert_eq!(enrichment.summary.as_deref(), Some(""));
        assert_eq!(enrichment.topic.as_deref(), Some("Unknown"));
    }

    #[test]
    fn test_reversed_braces() {
        let (_, strategy) = parse_with_strategy("} oops {");
        assert_eq!(strategy, Strategy::FieldRecovery);
    }

    #[test]
    fn test_lenient_value_types() {
        let raw = r#"{"summary": "S", "topic": 7, "sentiment": null, "key_entities": [{"name": "NASA"}, "ESA", 3], "core_points_markdown": ["- a", "- b"]}"#;
        let enrichment = parse_response(raw);
        assert_eq!(enrichment.topic.as_deref(), Some("7"));
        assert_eq!(enrichment.sentiment, None);
        assert_eq!(enrichment.key_entities, Some(strings(&["NASA", "ESA", "3"])));
        assert_eq!(enrichment.core_points_markdown.as_deref(), Some("- a\n- b"));
    }

    #[test]
    fn test_entities_as_comma_string() {
        let raw = r#"{"summary": "S", "topic": "t", "sentiment": "s", "key_entities": "NATO, Kyiv ,"}"#;
        let enrichment = parse_response(raw);
        assert_eq!(enrichment.key_entities, Some(strings(&["NATO", "Kyiv"])));
    }
}
