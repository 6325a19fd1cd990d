//! Deterministic side of the pipeline: segmentation, extraction, scoring,
//! normalization and rendering. Nothing in here talks to the network.

pub mod extract;
pub mod normalize;
pub mod render;
pub mod scoring;
pub mod segment;

use std::collections::BTreeMap;

use serde_json::Value;

// ── Axis ────────────────────────────────────────────────────────────────

/// One of the two independent rubric dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Grammar and vocabulary (`C-1`, `C-2`).
    Expression,
    /// Coherence and logical flow (`D-1`, `D-2`).
    Content,
}

impl Axis {
    pub const ALL: [Axis; 2] = [Axis::Expression, Axis::Content];

    /// The two fixed grade keys, primary item first.
    pub fn grade_keys(self) -> [&'static str; 2] {
        match self {
            Axis::Expression => [GRAMMAR_KEY, VOCABULARY_KEY],
            Axis::Content => [COHERENCE_KEY, FLOW_KEY],
        }
    }

    /// Human-readable label of each grade key, in `grade_keys` order.
    pub fn grade_labels(self) -> [&'static str; 2] {
        match self {
            Axis::Expression => ["①文法・語法", "②語彙・文構造"],
            Axis::Content => ["①主題が一貫している", "②本文が論理的に展開されている"],
        }
    }

    pub fn heading(self) -> &'static str {
        match self {
            Axis::Expression => "C. 表現",
            Axis::Content => "D. 内容",
        }
    }

    /// Value of the `type` field in the evaluation JSON.
    pub fn type_tag(self) -> &'static str {
        match self {
            Axis::Expression => "expression",
            Axis::Content => "contents",
        }
    }

    /// Label used in error messages for the evaluation stage.
    pub fn evaluation_label(self) -> &'static str {
        match self {
            Axis::Expression => "表現JSON",
            Axis::Content => "内容JSON",
        }
    }

    /// Label used in error messages for the improvement stage.
    pub fn improvement_label(self) -> &'static str {
        match self {
            Axis::Expression => "表現改善JSON",
            Axis::Content => "内容改善JSON",
        }
    }
}

pub const GRAMMAR_KEY: &str = "C-1";
pub const VOCABULARY_KEY: &str = "C-2";
pub const COHERENCE_KEY: &str = "D-1";
pub const FLOW_KEY: &str = "D-2";

pub const GRAMMAR_ERROR_COUNTER: &str = "C-1_incorrect";
/// Accepted spellings of the leap counter, in lookup order.
pub const LEAP_COUNTERS: [&str; 3] = ["D-2_leaps", "D2_leaps", "leaps"];

// ── Grade ───────────────────────────────────────────────────────────────

/// Ordinal grade for one rubric sub-item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Grade {
    #[default]
    Pass,
    Caution,
    Fail,
}

impl Grade {
    /// Lenient parse: `o/d/x` or the marks `〇/△/×`. Anything else is a pass.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "d" | "△" => Grade::Caution,
            "x" | "×" => Grade::Fail,
            _ => Grade::Pass,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Grade::Pass => "o",
            Grade::Caution => "d",
            Grade::Fail => "x",
        }
    }

    pub fn mark(self) -> &'static str {
        match self {
            Grade::Pass => "〇",
            Grade::Caution => "△",
            Grade::Fail => "×",
        }
    }
}

// ── Evaluation result ───────────────────────────────────────────────────

/// Structured grades for one axis, as returned by the generator.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub axis: Axis,
    /// Always holds both of the axis's grade keys.
    pub grades: BTreeMap<String, Grade>,
    /// Named counters. Unparseable values are stored as NaN.
    pub counters: BTreeMap<String, f64>,
    pub notes: Vec<String>,
}

impl EvaluationResult {
    /// All-pass result with no counters.
    pub fn new(axis: Axis) -> Self {
        let grades = axis
            .grade_keys()
            .iter()
            .map(|k| (k.to_string(), Grade::Pass))
            .collect();
        Self {
            axis,
            grades,
            counters: BTreeMap::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_grade(mut self, key: &str, grade: Grade) -> Self {
        self.grades.insert(key.to_string(), grade);
        self
    }

    pub fn with_counter(mut self, key: &str, value: f64) -> Self {
        self.counters.insert(key.to_string(), value);
        self
    }

    /// Build from an extracted JSON object (`items`, `details`, `notes`).
    ///
    /// The axis's grade keys are always present afterwards; missing or
    /// unrecognized grades become a pass. Grades under other keys are kept.
    pub fn from_value(axis: Axis, value: &Value) -> Self {
        let mut result = Self::new(axis);

        if let Some(items) = value.get("items").and_then(Value::as_object) {
            for (key, raw) in items {
                let grade = raw.as_str().map(Grade::parse).unwrap_or_default();
                result.grades.insert(key.clone(), grade);
            }
        }

        if let Some(details) = value.get("details").and_then(Value::as_object) {
            for (key, raw) in details {
                result.counters.insert(key.clone(), counter_value(raw));
            }
        }

        result.notes = match value.get("notes") {
            Some(Value::Array(notes)) => notes
                .iter()
                .filter_map(|n| match n {
                    Value::String(s) => Some(s.clone()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect(),
            Some(Value::String(note)) => vec![note.clone()],
            _ => Vec::new(),
        };

        result
    }

    pub fn grade(&self, key: &str) -> Grade {
        self.grades.get(key).copied().unwrap_or_default()
    }

    pub fn counter(&self, key: &str) -> Option<f64> {
        self.counters.get(key).copied()
    }

    /// Leap count from the first present counter spelling. Absent, negative
    /// or non-finite values count as zero.
    pub fn leap_count(&self) -> f64 {
        let raw = LEAP_COUNTERS
            .iter()
            .find_map(|key| self.counter(key))
            .unwrap_or(0.0);
        if raw.is_finite() && raw >= 0.0 {
            raw
        } else {
            0.0
        }
    }

    /// Grammar error count; non-finite values count as zero. Sign is kept.
    pub fn grammar_error_count(&self) -> f64 {
        self.counter(GRAMMAR_ERROR_COUNTER)
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }

    /// True when both grades pass and the axis counter is zero.
    pub fn is_clean(&self) -> bool {
        let [first, second] = self.axis.grade_keys();
        let counter_clear = match self.axis {
            Axis::Expression => self.grammar_error_count() <= 0.0,
            Axis::Content => self.leap_count() == 0.0,
        };
        self.grade(first) == Grade::Pass && self.grade(second) == Grade::Pass && counter_clear
    }

    /// Compact JSON used as fixed context in improvement prompts.
    pub fn to_json(&self) -> Value {
        let items: serde_json::Map<String, Value> = self
            .grades
            .iter()
            .map(|(k, g)| (k.clone(), Value::String(g.code().to_string())))
            .collect();
        let details: serde_json::Map<String, Value> = self
            .counters
            .iter()
            .map(|(k, v)| {
                let value = serde_json::Number::from_f64(*v)
                    .map(Value::Number)
                    .unwrap_or(Value::Null);
                (k.clone(), value)
            })
            .collect();
        serde_json::json!({
            "type": self.axis.type_tag(),
            "items": items,
            "details": details,
            "notes": self.notes,
        })
    }
}

/// Numeric reading of a counter value: numbers as-is, numeric strings
/// parsed, `null` and empty strings as 0, booleans as 0/1, anything else NaN.
fn counter_value(raw: &Value) -> f64 {
    match raw {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => f64::NAN,
    }
}

// ── Improvement item ────────────────────────────────────────────────────

/// One suggested fix, tied to one or two sentence ids.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImprovementItem {
    /// `S3` or `S3→S4`.
    pub location_ref: String,
    pub category: String,
    pub error_description: String,
    /// Excerpt of the original text, when the generator supplied one.
    pub original_excerpt: Option<String>,
    pub suggested_fix: String,
    pub rationale: String,
}

impl ImprovementItem {
    /// Lenient decode of one generated item. Accepts the short keys the
    /// prompt asks for and the long field names; non-string scalars are
    /// stringified.
    pub fn from_value(value: &Value) -> Self {
        let field = |keys: &[&str]| -> String {
            keys.iter()
                .find_map(|k| value.get(*k))
                .map(|v| match v {
                    Value::String(s) => s.trim().to_string(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .unwrap_or_default()
        };
        let excerpt = field(&["before", "originalExcerpt"]);
        Self {
            location_ref: field(&["s", "locationRef"]),
            category: field(&["cat", "category"]),
            error_description: field(&["error", "errorDescription"]),
            original_excerpt: (!excerpt.is_empty()).then_some(excerpt),
            suggested_fix: field(&["after", "suggestedFix"]),
            rationale: field(&["reason", "rationale"]),
        }
    }

    /// Decode the `items` array of an extracted improvement object.
    pub fn list_from_value(value: &Value) -> Vec<Self> {
        value
            .get("items")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(Self::from_value).collect())
            .unwrap_or_default()
    }
}
