use super::{EvaluationResult, Grade, COHERENCE_KEY, FLOW_KEY, GRAMMAR_KEY, VOCABULARY_KEY};

/// Rubric score derived from the two evaluations. Never generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RubricScore {
    /// 2..=10
    pub expression: u8,
    /// 0..=10
    pub content: u8,
    /// 2..=20
    pub total: u8,
}

/// Expression sub-score.
///
/// Each grammar error costs a point (at most 8). A caution grammar grade
/// with a zero error count still costs 2. Vocabulary costs 2 on caution and
/// 4 on fail.
pub fn expression_score(eval: &EvaluationResult) -> u8 {
    let errors = eval.grammar_error_count();
    let mut score = 10.0 - errors.clamp(0.0, 8.0);

    if eval.grade(GRAMMAR_KEY) == Grade::Caution && errors == 0.0 {
        score -= 2.0;
    }
    score -= match eval.grade(VOCABULARY_KEY) {
        Grade::Pass => 0.0,
        Grade::Caution => 2.0,
        Grade::Fail => 4.0,
    };

    score.clamp(2.0, 10.0).round() as u8
}

/// Content sub-score.
///
/// Coherence costs 4 on caution and 20 on fail. Each leap costs 2 (at most
/// 20). A caution flow grade with no counted leaps still costs 2.
pub fn content_score(eval: &EvaluationResult) -> u8 {
    let leaps = eval.leap_count();
    let mut score = 10.0;

    score -= match eval.grade(COHERENCE_KEY) {
        Grade::Pass => 0.0,
        Grade::Caution => 4.0,
        Grade::Fail => 20.0,
    };
    score -= (leaps * 2.0).min(20.0);
    if eval.grade(FLOW_KEY) == Grade::Caution && leaps == 0.0 {
        score -= 2.0;
    }

    score.clamp(0.0, 10.0).round() as u8
}

pub fn score(expression: &EvaluationResult, content: &EvaluationResult) -> RubricScore {
    let expression = expression_score(expression);
    let content = content_score(content);
    let total = (expression + content).clamp(2, 20);
    RubricScore {
        expression,
        content,
        total,
    }
}
