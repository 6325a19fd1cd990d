//! Prompt construction. Every builder is pure and clips its inputs.

pub mod rubrics;

use crate::assessment::{Axis, EvaluationResult};

// ── Limits ──────────────────────────────────────────────────────────────

pub const QUESTION_LIMIT: usize = 2000;
pub const NUMBERED_TEXT_LIMIT: usize = 6000;
pub const EVALUATION_JSON_LIMIT: usize = 2500;

pub const FOLLOW_UP_QUESTION_LIMIT: usize = 4000;
pub const FOLLOW_UP_ORIGINAL_QUESTION_LIMIT: usize = 4000;
pub const FOLLOW_UP_ORIGINAL_TEXT_LIMIT: usize = 12000;
pub const FOLLOW_UP_FEEDBACK_LIMIT: usize = 12000;

/// Output token budgets per prompt kind.
pub const EVALUATION_TOKENS: u32 = 600;
pub const IMPROVEMENT_TOKENS: u32 = 700;
pub const REQUIREMENT_TOKENS: u32 = 80;
pub const FOLLOW_UP_TOKENS: u32 = 700;

const NO_QUESTION: &str = "（問題文なし）";

/// First `max` characters of `text`.
pub fn clip(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn question_or_placeholder(question: &str) -> String {
    let clipped = clip(question, QUESTION_LIMIT);
    if clipped.trim().is_empty() {
        NO_QUESTION.to_string()
    } else {
        clipped
    }
}

// ── Builders ────────────────────────────────────────────────────────────

/// Evaluation prompt: grades and counters only, never a score.
pub fn evaluation_prompt(axis: Axis, question: &str, numbered_text: &str) -> String {
    [
        rubrics::evaluation_policy(axis).to_string(),
        String::new(),
        "【問題文】".to_string(),
        question_or_placeholder(question),
        String::new(),
        "【あなたの答案（文番号付き）】".to_string(),
        clip(numbered_text, NUMBERED_TEXT_LIMIT),
        String::new(),
        "点数は出力せず、下記のJSONスキーマに厳密に従い、JSONのみを出力：".to_string(),
        rubrics::evaluation_schema(axis).to_string(),
    ]
    .join("\n")
}

/// Improvement prompt carrying the fixed evaluation as read-only context.
pub fn improvement_prompt(
    question: &str,
    numbered_text: &str,
    evaluation: &EvaluationResult,
) -> String {
    let axis = evaluation.axis;
    [
        rubrics::improvement_persona(axis).to_string(),
        String::new(),
        "【問題文】".to_string(),
        question_or_placeholder(question),
        String::new(),
        "【あなたの答案（文番号付き）】".to_string(),
        clip(numbered_text, NUMBERED_TEXT_LIMIT),
        String::new(),
        "【評価結果（固定）】".to_string(),
        clip(&evaluation.to_json().to_string(), EVALUATION_JSON_LIMIT),
        String::new(),
        "出力は JSON のみ。次のスキーマに厳密に従ってください：".to_string(),
        rubrics::improvement_schema(axis).to_string(),
    ]
    .join("\n")
}

/// One-line requirement judgement given the question and word count.
pub fn requirement_prompt(question: &str, word_count: usize) -> String {
    [
        rubrics::REQUIREMENT_PERSONA.to_string(),
        format!("・問題文：{}", question_or_placeholder(question)),
        format!("・語数：{}語", word_count),
        rubrics::REQUIREMENT_TASK.to_string(),
    ]
    .join("\n")
}

/// Optional context for a follow-up question. Blank fields are left out.
#[derive(Debug, Clone, Default)]
pub struct FollowUpContext<'a> {
    pub original_question: &'a str,
    pub original_text: &'a str,
    pub feedback: &'a str,
}

/// Free-form tutoring prompt for a follow-up question.
pub fn follow_up_prompt(question: &str, context: &FollowUpContext<'_>) -> String {
    let blocks = [
        ("【元の問題文】", context.original_question, FOLLOW_UP_ORIGINAL_QUESTION_LIMIT),
        ("【受験生の解答】", context.original_text, FOLLOW_UP_ORIGINAL_TEXT_LIMIT),
        ("【フィードバック】", context.feedback, FOLLOW_UP_FEEDBACK_LIMIT),
    ];

    let mut lines = vec![
        rubrics::TUTOR_PERSONA.to_string(),
        String::new(),
        "―― 文脈ここから ――".to_string(),
    ];
    for (title, body, limit) in blocks {
        if !body.trim().is_empty() {
            lines.push(format!("{}\n{}\n", title, clip(body, limit)));
        }
    }
    lines.push("―― 文脈ここまで ――".to_string());
    lines.push(String::new());
    lines.push("【質問】".to_string());
    lines.push(clip(question, FOLLOW_UP_QUESTION_LIMIT));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::{Grade, FLOW_KEY};

    #[test]
    fn clip_counts_characters_not_bytes() {
        assert_eq!(clip("あいうえお", 3), "あいう");
        assert_eq!(clip("ab", 10), "ab");
    }

    #[test]
    fn evaluation_prompt_carries_schema_and_text() {
        let prompt = evaluation_prompt(Axis::Expression, "Do you agree?", "¶1 [S1] I agree.");
        assert!(prompt.contains("Do you agree?"));
        assert!(prompt.contains("[S1] I agree."));
        assert!(prompt.contains(r#""C-1": "o|d|x""#));
        assert!(prompt.contains("点数は出力せず"));
    }

    #[test]
    fn missing_question_uses_placeholder() {
        let prompt = evaluation_prompt(Axis::Content, "  ", "¶1 [S1] Hi.");
        assert!(prompt.contains("（問題文なし）"));
    }

    #[test]
    fn numbered_text_is_clipped() {
        let long = "a".repeat(NUMBERED_TEXT_LIMIT + 500);
        let prompt = evaluation_prompt(Axis::Expression, "q", &long);
        assert!(!prompt.contains(&"a".repeat(NUMBERED_TEXT_LIMIT + 1)));
        assert!(prompt.contains(&"a".repeat(NUMBERED_TEXT_LIMIT)));
    }

    #[test]
    fn improvement_prompt_embeds_fixed_evaluation() {
        let eval = EvaluationResult::new(Axis::Content)
            .with_grade(FLOW_KEY, Grade::Caution)
            .with_counter("D-2_leaps", 2.0);
        let prompt = improvement_prompt("q", "¶1 [S1] Hi.", &eval);
        assert!(prompt.contains("【評価結果（固定）】"));
        assert!(prompt.contains(r#""D-2":"d""#));
        assert!(prompt.contains("content_improvements"));
    }

    #[test]
    fn requirement_prompt_states_word_count() {
        let prompt = requirement_prompt("Write 80 words.", 58);
        assert!(prompt.contains("・語数：58語"));
        assert!(prompt.contains("採点要件："));
    }

    #[test]
    fn follow_up_omits_blank_context() {
        let context = FollowUpContext {
            original_question: "",
            original_text: "I like dogs.",
            feedback: " ",
        };
        let prompt = follow_up_prompt("Why is S1 wrong?", &context);
        assert!(prompt.contains("【受験生の解答】\nI like dogs."));
        assert!(!prompt.contains("【元の問題文】"));
        assert!(!prompt.contains("【フィードバック】"));
        assert!(prompt.ends_with("【質問】\nWhy is S1 wrong?"));
    }
}
