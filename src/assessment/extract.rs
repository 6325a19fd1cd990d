//! Pull a JSON object out of free-form generator text.

use serde_json::Value;
use thiserror::Error;

use crate::error::ErrorKind;

/// Prefixes that mark an upstream failure encoded as ordinary text.
pub const FAILURE_SENTINELS: [&str; 2] = ["エラー", "APIからの有効な応答がありませんでした。"];

pub fn is_failure_sentinel(text: &str) -> bool {
    let text = text.trim_start();
    FAILURE_SENTINELS.iter().any(|s| text.starts_with(s))
}

/// Required top-level layout of the extracted object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `items` is an object of grade keys.
    Evaluation,
    /// `items` is an array of improvement entries.
    Improvements,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("モデル応答が空です")]
    EmptyResponse,

    #[error("モデル応答がエラーです: {0}")]
    UpstreamError(String),

    #[error("JSON形式が不正です: {0}")]
    MalformedShape(String),
}

impl ExtractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractError::UpstreamError(_) => ErrorKind::UpstreamPermanent,
            ExtractError::EmptyResponse | ExtractError::MalformedShape(_) => {
                ErrorKind::MalformedUpstreamPayload
            }
        }
    }
}

/// Extract the structured object expected for `shape` from `text`.
///
/// Balanced `{...}` spans are tried left to right and the first one that
/// parses as a JSON object is used, so leading prose and trailing commentary
/// are ignored. With no balanced span the trimmed text is parsed as-is.
pub fn extract(text: &str, shape: Shape) -> Result<Value, ExtractError> {
    if text.trim().is_empty() {
        return Err(ExtractError::EmptyResponse);
    }
    if is_failure_sentinel(text) {
        return Err(ExtractError::UpstreamError(text.trim().to_string()));
    }

    let object = balanced_spans(text)
        .into_iter()
        .find_map(|span| serde_json::from_str::<Value>(span).ok().filter(Value::is_object))
        .map(Ok)
        .unwrap_or_else(|| {
            serde_json::from_str::<Value>(text.trim())
                .map_err(|e| {
                    ExtractError::MalformedShape(format!(
                        "JSONオブジェクトが見つかりません（{}行{}列）",
                        e.line(),
                        e.column()
                    ))
                })
        })?;

    let items_ok = match (shape, object.get("items")) {
        (Shape::Evaluation, Some(items)) => items.is_object(),
        (Shape::Improvements, Some(items)) => items.is_array(),
        (_, None) => false,
    };
    if !items_ok {
        let reason = match shape {
            Shape::Evaluation => "items がオブジェクトではありません",
            Shape::Improvements => "items が配列ではありません",
        };
        return Err(ExtractError::MalformedShape(reason.to_string()));
    }

    Ok(object)
}

/// Every top-level balanced `{...}` span, in order. Braces inside JSON
/// strings are ignored. An unterminated span ends the scan.
fn balanced_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        spans.push(&text[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }
    spans
}
