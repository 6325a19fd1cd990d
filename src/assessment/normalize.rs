//! Rationale repair and well-formedness checks for improvement items.

use thiserror::Error;

use super::{EvaluationResult, ImprovementItem};
use crate::error::ErrorKind;
use crate::prompts::clip;

/// Upper bound on a rendered rationale, in characters.
pub const RATIONALE_MAX_CHARS: usize = 50;
/// Shortest rationale accepted as well-formed, in characters.
pub const RATIONALE_MIN_CHARS: usize = 8;
/// Most improvement items kept per axis.
pub const MAX_IMPROVEMENT_ITEMS: usize = 6;

const GRAMMAR_DEFAULT: &str = "文法規則に合わせて誤用を正し、読み手の誤解を防ぐため。";
const VOCABULARY_DEFAULT: &str = "表現をB1相当へ整え、意味の明確さと読みやすさを高めるため。";
const COHERENCE_DEFAULT: &str = "主題から逸れないよう内容を焦点化し、一貫性を保つため。";
const FLOW_DEFAULT: &str = "論理のつながりを明示し、主張を理解しやすくするため。";

/// Default rationale for an item whose generated one is blank.
pub fn default_rationale(category: &str) -> &'static str {
    if category.contains("文法") {
        GRAMMAR_DEFAULT
    } else if category.contains("語彙") {
        VOCABULARY_DEFAULT
    } else if category.contains("主題") {
        COHERENCE_DEFAULT
    } else {
        FLOW_DEFAULT
    }
}

/// Fill blank rationales from the category and clip every rationale.
pub fn normalize_item(mut item: ImprovementItem) -> ImprovementItem {
    let rationale = item.rationale.trim();
    let rationale = if rationale.is_empty() {
        default_rationale(&item.category)
    } else {
        rationale
    };
    item.rationale = clip(rationale, RATIONALE_MAX_CHARS);
    item
}

/// Normalize each item, keeping at most [`MAX_IMPROVEMENT_ITEMS`].
pub fn normalize_items(items: Vec<ImprovementItem>) -> Vec<ImprovementItem> {
    items
        .into_iter()
        .take(MAX_IMPROVEMENT_ITEMS)
        .map(normalize_item)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("改善点が空です")]
    Empty,

    #[error("改善点{index}の{field}が空です")]
    MissingField { index: usize, field: &'static str },

    #[error("改善点{index}の修正理由が短すぎます（{len}字）")]
    RationaleTooShort { index: usize, len: usize },
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ValidationFailed
    }
}

/// Check a normalized item list.
///
/// The list must be non-empty and every item needs a location, an error
/// description, a fix and a rationale of at least
/// [`RATIONALE_MIN_CHARS`]. An empty list is accepted when `evaluation`
/// reports nothing to improve.
pub fn validate_items(
    items: &[ImprovementItem],
    evaluation: &EvaluationResult,
) -> Result<(), ValidationError> {
    if items.is_empty() {
        return if evaluation.is_clean() {
            Ok(())
        } else {
            Err(ValidationError::Empty)
        };
    }

    for (i, item) in items.iter().enumerate() {
        let index = i + 1;
        let required = [
            ("箇所", &item.location_ref),
            ("問題点", &item.error_description),
            ("修正例", &item.suggested_fix),
        ];
        if let Some(&(field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(ValidationError::MissingField { index, field });
        }
        let len = item.rationale.trim().chars().count();
        if len < RATIONALE_MIN_CHARS {
            return Err(ValidationError::RationaleTooShort { index, len });
        }
    }
    Ok(())
}
