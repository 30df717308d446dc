//! Splits the agent's final text into publishable content and metadata.
//!
//! The model may append a JSON block (fenced or bare) with the validation
//! results. Extraction never fails: anything unparseable falls back to the
//! raw text with neutral metadata.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::validation::{Issue, normalize_issues};

pub const PREVIEW_CHARS: usize = 140;

const CONTENT_KEYS: &[&str] = &["final_content", "content", "post", "script"];
const META_KEYS: &[&str] = &[
    "final_content",
    "content",
    "post",
    "script",
    "original_score",
    "score",
    "issues",
    "ai_percentage",
    "flagged_passages",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedContent {
    pub content: String,
    pub preview: String,
    /// `None` when the model reported no score.
    pub score: Option<u32>,
    pub issues: Vec<Issue>,
    pub detector_percentage: Option<f64>,
    pub flagged_passages: Vec<String>,
    pub metadata_found: bool,
}

/// Extract content and metadata from raw model output.
pub fn extract(raw: &str) -> ExtractedContent {
    let trimmed = raw.trim();

    let Some((object, span)) = find_metadata(trimmed) else {
        return plain(raw);
    };

    let content = CONTENT_KEYS
        .iter()
        .find_map(|k| object.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            let outside = format!("{}{}", &trimmed[..span.0], &trimmed[span.1..]);
            let outside = outside.trim();
            if outside.is_empty() {
                trimmed.to_string()
            } else {
                outside.to_string()
            }
        });

    let score = ["original_score", "score"]
        .iter()
        .find_map(|k| object.get(*k).and_then(as_score));
    let issues = object.get("issues").map(normalize_issues).unwrap_or_default();
    let detector_percentage = object.get("ai_percentage").and_then(Value::as_f64);
    let flagged_passages = object
        .get("flagged_passages")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    ExtractedContent {
        preview: preview(&content),
        content,
        score,
        issues,
        detector_percentage,
        flagged_passages,
        metadata_found: true,
    }
}

/// First [`PREVIEW_CHARS`] characters, with an ellipsis when cut.
pub fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}…", head.trim_end())
    } else {
        head
    }
}

fn plain(text: &str) -> ExtractedContent {
    ExtractedContent {
        content: text.to_string(),
        preview: preview(text),
        score: None,
        issues: Vec::new(),
        detector_percentage: None,
        flagged_passages: Vec::new(),
        metadata_found: false,
    }
}

// Returns the parsed object and the byte span of the block that held it.
fn find_metadata(text: &str) -> Option<(Map<String, Value>, (usize, usize))> {
    fenced_block(text)
        .and_then(|(body, span)| parse_object(body).map(|o| (o, span)))
        .or_else(|| {
            let start = text.find('{')?;
            let end = text.rfind('}')?;
            if end <= start {
                return None;
            }
            parse_object(&text[start..=end]).map(|o| (o, (start, end + 1)))
        })
}

fn fenced_block(text: &str) -> Option<(&str, (usize, usize))> {
    let open = text.find("```json")?;
    let body_start = open + "```json".len();
    let close = text[body_start..].find("```")? + body_start;
    Some((&text[body_start..close], (open, close + 3)))
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(Value::Object(map)) if META_KEYS.iter().any(|k| map.contains_key(*k)) => Some(map),
        _ => None,
    }
}

fn as_score(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(|v| v.min(u32::MAX as u64) as u32)
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u32)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
