//! Recovery of a semantic tree from raw model output.
//!
//! Models wrap JSON in code fences, prepend prose, or return a one-element
//! array. Strategies are tried in order and the first that yields a JSON
//! object wins:
//!
//! 1. the (fence-stripped) text parsed directly
//! 2. the first complete JSON value embedded in the text that is an
//!    object, or an array holding exactly one object
//!
//! The root is then normalised: missing `id`, `label` and `children` get
//! `"root"`, the paper title and `[]`, and a root `position` is cleared.

use crate::error::{PaperIndexError, Result};
use crate::tree::{ROOT_ID, TreeNode};
use serde_json::{Map, Value};
use tracing::debug;

/// Turns model output into a root [`TreeNode`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse `raw` into a tree rooted at a normalised root node.
    pub fn parse(&self, raw: &str, title: &str) -> Result<TreeNode> {
        let object = Self::extract_object(raw).ok_or_else(|| {
            PaperIndexError::Parse(format!(
                "no interpretable tree in model response: {}",
                preview(raw)
            ))
        })?;

        let normalized = Self::normalize_root(object, title);
        serde_json::from_value(Value::Object(normalized))
            .map_err(|e| PaperIndexError::Parse(format!("tree does not match node schema: {}", e)))
    }

    /// Find the first JSON object the response can be read as.
    fn extract_object(raw: &str) -> Option<Map<String, Value>> {
        let candidate = strip_code_fence(raw.trim());

        if let Some(obj) = parse_as_object(candidate) {
            debug!("model response parsed directly");
            return Some(obj);
        }

        if let Some(obj) = first_embedded_object(candidate) {
            debug!("model response parsed from embedded value");
            return Some(obj);
        }

        // The fenced block may be prose while the JSON sits outside it.
        let raw = raw.trim();
        if candidate.len() != raw.len() {
            return first_embedded_object(raw);
        }

        None
    }

    /// Fill the root defaults. Idempotent.
    fn normalize_root(mut node: Map<String, Value>, title: &str) -> Map<String, Value> {
        if !node.contains_key("id") {
            node.insert("id".to_string(), Value::String(ROOT_ID.to_string()));
        }
        if !node.contains_key("label") {
            node.insert("label".to_string(), Value::String(title.to_string()));
        }
        if !node.contains_key("children") {
            node.insert("children".to_string(), Value::Array(Vec::new()));
        }
        if let Some(position) = node.get_mut("position") {
            *position = Value::Null;
        }
        node
    }
}

/// Return the inside of the first fenced code block, or `text` unchanged.
fn strip_code_fence(text: &str) -> &str {
    let Some(open) = text.find("```") else {
        return text;
    };
    let after_ticks = &text[open + 3..];
    // Skip an info string such as `json` up to the end of the line.
    let body_start = after_ticks
        .find('\n')
        .filter(|&nl| {
            after_ticks[..nl]
                .trim()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        })
        .map(|nl| nl + 1)
        .unwrap_or_else(|| {
            let info_len = after_ticks
                .find(|c: char| !c.is_ascii_alphabetic())
                .unwrap_or(after_ticks.len());
            if after_ticks[..info_len].eq_ignore_ascii_case("json") {
                info_len
            } else {
                0
            }
        });
    let body = &after_ticks[body_start..];
    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => text,
    }
}

/// Accept a JSON object, or an array holding exactly one object.
fn parse_as_object(text: &str) -> Option<Map<String, Value>> {
    into_object(serde_json::from_str::<Value>(text).ok()?)
}

fn into_object(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(obj) => Some(obj),
        Value::Array(mut items) if items.len() == 1 => match items.pop() {
            Some(Value::Object(obj)) => Some(obj),
            _ => None,
        },
        _ => None,
    }
}

/// Scan `text` for the first top-level JSON value usable as a tree.
///
/// Every `{` or `[` is tried as the start of a value. A value that parses
/// but is not usable (e.g. a two-element array) is skipped whole, so its
/// inner objects are never picked up on their own.
fn first_embedded_object(text: &str) -> Option<Map<String, Value>> {
    let mut pos = 0;
    while let Some(offset) = text[pos..].find(['{', '[']) {
        let start = pos + offset;
        let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match values.next() {
            Some(Ok(value)) => {
                if let Some(obj) = into_object(value) {
                    return Some(obj);
                }
                pos = start + values.byte_offset();
            }
            _ => pos = start + 1,
        }
    }
    None
}

fn preview(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.char_indices().nth(200) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
