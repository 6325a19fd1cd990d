//! Wire types for the `generateContent` endpoint and the decode step that
//! maps its reply shapes onto one canonical [`DecodedReply`].

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Request ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<RequestContent>,
    pub generation_config: GenerationConfig,
    pub safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestContent {
    pub parts: Vec<RequestPart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestPart {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub candidate_count: u32,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SafetySetting {
    pub category: &'static str,
    pub threshold: &'static str,
}

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

impl GenerateContentRequest {
    /// Single-prompt request with low temperature and high-only safety blocking.
    pub fn new(prompt: &str, max_output_tokens: u32) -> Self {
        Self {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                candidate_count: 1,
                temperature: 0.2,
                top_k: 40,
                top_p: 0.95,
                max_output_tokens,
            },
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|&category| SafetySetting {
                    category,
                    threshold: "BLOCK_ONLY_HIGH",
                })
                .collect(),
        }
    }
}

// ── Response ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    safety_ratings: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Where the reply text was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyShape {
    Parts,
    DirectText,
    FencedBlock,
}

/// Canonical form of a 200 response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedReply {
    Text { shape: ReplyShape, text: String },
    /// No usable text: safety block, no candidates, or an unrecognized shape.
    Empty { block_reason: String, safety: String },
}

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("valid fenced-block regex"));

/// Decode a `generateContent` body.
///
/// Shapes are tried in order: joined content parts, a direct `text` field on
/// the first candidate, then the first fenced code block found in any string
/// of the payload.
pub fn decode_reply(body: &Value) -> DecodedReply {
    let parsed = serde_json::from_value::<GenerateContentResponse>(body.clone()).ok();

    let Some(response) = parsed else {
        // Non-conforming payload: only the fenced-block shape can apply.
        return match find_fenced_block(body) {
            Some(text) => DecodedReply::Text {
                shape: ReplyShape::FencedBlock,
                text,
            },
            None => DecodedReply::Empty {
                block_reason: "unrecognized_shape".to_string(),
                safety: "[]".to_string(),
            },
        };
    };

    let block_reason = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.clone());

    let Some(candidate) = response.candidates.first() else {
        return DecodedReply::Empty {
            block_reason: block_reason.unwrap_or_else(|| "no_candidates".to_string()),
            safety: "[]".to_string(),
        };
    };

    let parts_text: String = candidate
        .content
        .as_ref()
        .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect())
        .unwrap_or_default();
    if !parts_text.is_empty() {
        return DecodedReply::Text {
            shape: ReplyShape::Parts,
            text: parts_text,
        };
    }

    if let Some(text) = candidate.text.as_deref().filter(|t| !t.is_empty()) {
        return DecodedReply::Text {
            shape: ReplyShape::DirectText,
            text: text.to_string(),
        };
    }

    if let Some(text) = find_fenced_block(body) {
        return DecodedReply::Text {
            shape: ReplyShape::FencedBlock,
            text,
        };
    }

    DecodedReply::Empty {
        block_reason: block_reason
            .or_else(|| candidate.finish_reason.clone())
            .unwrap_or_else(|| "empty_text".to_string()),
        safety: serde_json::to_string(&candidate.safety_ratings).unwrap_or_else(|_| "[]".to_string()),
    }
}

fn find_fenced_block(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => FENCED_BLOCK
            .captures(s)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|t| !t.is_empty()),
        Value::Array(items) => items.iter().find_map(find_fenced_block),
        Value::Object(map) => map.values().find_map(find_fenced_block),
        _ => None,
    }
}
