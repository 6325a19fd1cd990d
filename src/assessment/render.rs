//! Report rendering and the consistency pass that keeps generated text in
//! line with the fixed grades.

use std::sync::LazyLock;

use regex::Regex;

use super::normalize::normalize_items;
use super::scoring::RubricScore;
use super::{Axis, EvaluationResult, Grade, ImprovementItem, FLOW_KEY};

pub const IMPROVEMENT_MARKER: &str = "《改善ポイント》";
const GRADE_MARKER: &str = "《項目ごとのフィードバック》";
const NOTHING_TO_IMPROVE: &str = "（特になし）";
const DEGRADED_PLACEHOLDER: &str = "（改善点を生成できませんでした。時間を置いて再実行してください。）";
const EMPTY_SECTION: &str = "（生成に失敗しました）";
const WORD_COUNT_DISCLAIMER: &str = "　　※自動の語数カウントは、正確でない場合があります。";
const REQUIREMENT_FALLBACK: &str = "採点要件：判定できませんでした。";

static CROSS_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"S\d+\s*(?:→|->)\s*S\d+").expect("valid cross-reference regex"));
static CONTENT_TERMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"主題|論旨|論理|飛躍|矛盾|段落|構成|結論").expect("valid content-terms regex")
});
static FLOW_TERMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"論理|飛躍|矛盾").expect("valid flow-terms regex"));
static EXPRESSION_TERMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"文法|語法|語彙|文構造|接続詞|単語|句動詞").expect("valid expression-terms regex")
});
static ITEM_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t\u{3000}]*S\d+").expect("valid item-header regex"));
static FLOW_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^②.*本文が論理的に展開されている\s*→").expect("valid flow-line regex"));
static TRAILING_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+\n").expect("valid trailing-space regex"));
static GAP_BEFORE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n{3,}([ \t\u{3000}]*S\d+)").expect("valid reference-gap regex")
});
static GAP_AFTER_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"《改善ポイント》\n{2,}").expect("valid marker-gap regex"));
static LEADING_INDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t\u{3000}]+").expect("valid indent regex"));

/// Improvement list for one axis, or the marker that it could not be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImprovementSection {
    Items(Vec<ImprovementItem>),
    Degraded,
}

/// Rendered report. Sections are fixed once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub summary: String,
    pub submission: String,
    pub expression: String,
    pub content: String,
}

impl Report {
    pub fn build(
        score: RubricScore,
        requirement_reply: &str,
        numbered_text: &str,
        expression: (&EvaluationResult, &ImprovementSection),
        content: (&EvaluationResult, &ImprovementSection),
    ) -> Self {
        Self {
            summary: render_summary(score, requirement_reply),
            submission: format!("B. あなたの答案\n{}", numbered_text),
            expression: render_axis(expression.0, expression.1),
            content: render_axis(content.0, content.1),
        }
    }

    pub fn to_text(&self) -> String {
        [
            self.summary.as_str(),
            "",
            self.submission.as_str(),
            "",
            self.expression.as_str(),
            "",
            self.content.as_str(),
        ]
        .join("\n")
    }
}

/// First line of the requirement reply, or a fixed fallback when blank.
pub fn requirement_line(reply: &str) -> String {
    reply
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or(REQUIREMENT_FALLBACK)
        .to_string()
}

pub fn render_summary(score: RubricScore, requirement_reply: &str) -> String {
    [
        "A. 配点サマリー".to_string(),
        format!("総合得点（{}／20点）", score.total),
        format!(
            "C. 表現（{}／10点）　D. 内容（{}／10点）",
            score.expression, score.content
        ),
        requirement_line(requirement_reply),
        WORD_COUNT_DISCLAIMER.to_string(),
    ]
    .join("\n")
}

/// Grade line for the logical-flow item, derived only from the evaluation.
pub fn flow_line(eval: &EvaluationResult) -> String {
    let grade = eval.grade(FLOW_KEY);
    let leaps = eval.leap_count();
    let tail = if grade != Grade::Pass && leaps > 0.0 {
        format!("（飛躍{}件）", leaps)
    } else {
        String::new()
    };
    format!("{} → {}{}", Axis::Content.grade_labels()[1], grade.mark(), tail)
}

fn grade_lines(eval: &EvaluationResult) -> Vec<String> {
    let keys = eval.axis.grade_keys();
    let labels = eval.axis.grade_labels();
    let mut lines = vec![format!("{} → {}", labels[0], eval.grade(keys[0]).mark())];
    lines.push(match eval.axis {
        Axis::Content => flow_line(eval),
        Axis::Expression => format!("{} → {}", labels[1], eval.grade(keys[1]).mark()),
    });
    lines
}

fn item_lines(item: &ImprovementItem) -> Vec<String> {
    let mut lines = Vec::new();
    if item.error_description.is_empty() {
        lines.push(format!("{}　{}", item.location_ref, item.category));
    } else {
        lines.push(format!(
            "{}　{}：{}",
            item.location_ref, item.category, item.error_description
        ));
    }
    if let Some(excerpt) = &item.original_excerpt {
        lines.push(excerpt.clone());
    }
    if !item.suggested_fix.is_empty() {
        lines.push(format!("→ {}", item.suggested_fix));
    }
    lines.push(format!("修正理由：{}", item.rationale));
    lines
}

/// Whether every rendered line of `item` stays within `eval`'s axis.
fn item_in_scope(eval: &EvaluationResult, item: &ImprovementItem) -> bool {
    !item_lines(item).iter().any(|line| out_of_scope(eval, line))
}

/// Section text with out-of-scope items already removed, before the
/// text-level consistency pass.
fn render_axis_raw(eval: &EvaluationResult, section: &ImprovementSection) -> String {
    let mut lines = vec![eval.axis.heading().to_string(), GRADE_MARKER.to_string()];
    lines.extend(grade_lines(eval));
    lines.push(IMPROVEMENT_MARKER.to_string());

    match section {
        ImprovementSection::Degraded => lines.push(DEGRADED_PLACEHOLDER.to_string()),
        ImprovementSection::Items(items) if items.is_empty() => {
            lines.push(NOTHING_TO_IMPROVE.to_string())
        }
        ImprovementSection::Items(items) => {
            let kept: Vec<ImprovementItem> = normalize_items(items.clone())
                .into_iter()
                .filter(|item| item_in_scope(eval, item))
                .collect();
            if kept.is_empty() {
                lines.push(NOTHING_TO_IMPROVE.to_string());
            }
            for item in &kept {
                lines.extend(item_lines(item));
            }
        }
    }
    lines.join("\n")
}

/// Full per-axis section: render, enforce scope, tidy blank lines.
pub fn render_axis(eval: &EvaluationResult, section: &ImprovementSection) -> String {
    let raw = render_axis_raw(eval, section);
    let scoped = enforce_scope(eval, &raw);
    sanitize_section(&normalize_blank_lines(&scoped), eval.axis.heading())
}

/// Whether an improvement line falls outside what `eval`'s axis may say.
fn out_of_scope(eval: &EvaluationResult, line: &str) -> bool {
    match eval.axis {
        Axis::Expression => CONTENT_TERMS.is_match(line) || CROSS_REFERENCE.is_match(line),
        Axis::Content => {
            let no_flow_issue = eval.grade(FLOW_KEY) == Grade::Pass || eval.leap_count() == 0.0;
            EXPRESSION_TERMS.is_match(line)
                || (no_flow_issue && (CROSS_REFERENCE.is_match(line) || FLOW_TERMS.is_match(line)))
        }
    }
}

/// Bring a section's text in line with the fixed evaluation.
///
/// For the content axis the logical-flow grade line is replaced with the one
/// derived from the evaluation. Below the improvement marker, each item
/// (a line starting with a sentence id plus the lines that follow it) is
/// dropped as a whole if any of its lines is out of scope for the axis.
/// Loose lines before the first item are checked one by one.
pub fn enforce_scope(eval: &EvaluationResult, text: &str) -> String {
    let mut head: Vec<String> = Vec::new();
    let mut loose: Vec<&str> = Vec::new();
    let mut blocks: Vec<Vec<&str>> = Vec::new();
    let mut in_improvements = false;

    for line in text.lines() {
        if !in_improvements {
            if eval.axis == Axis::Content && FLOW_LINE.is_match(line) {
                head.push(flow_line(eval));
            } else {
                head.push(line.to_string());
            }
            if line.starts_with(IMPROVEMENT_MARKER) {
                in_improvements = true;
            }
            continue;
        }
        if ITEM_HEADER.is_match(line) {
            blocks.push(vec![line]);
        } else if let Some(block) = blocks.last_mut() {
            block.push(line);
        } else {
            loose.push(line);
        }
    }

    let had_blocks = !blocks.is_empty();
    let mut body: Vec<&str> = loose
        .into_iter()
        .filter(|l| !out_of_scope(eval, l))
        .collect();
    for block in blocks {
        if !block.iter().any(|l| out_of_scope(eval, l)) {
            body.extend(block);
        }
    }
    if had_blocks && body.iter().all(|l| l.trim().is_empty()) {
        body = vec![NOTHING_TO_IMPROVE];
    }

    head.extend(body.into_iter().map(str::to_string));
    head.join("\n")
}

/// Collapse runs of blank lines before a sentence reference to a single
/// blank line and drop blank lines right after the improvement marker.
pub fn normalize_blank_lines(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = TRAILING_SPACE.replace_all(&text, "\n");
    let text = GAP_BEFORE_REFERENCE.replace_all(&text, "\n\n$1");
    GAP_AFTER_MARKER
        .replace_all(&text, format!("{}\n", IMPROVEMENT_MARKER))
        .into_owned()
}

/// Strip indentation, start the section at `heading`, and never return an
/// empty section.
pub fn sanitize_section(text: &str, heading: &str) -> String {
    let stripped = LEADING_INDENT.replace_all(text, "");
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        return format!("{}\n{}", heading, EMPTY_SECTION);
    }
    match trimmed.find(heading) {
        Some(idx) => trimmed[idx..].to_string(),
        None => trimmed.to_string(),
    }
}
