//! Paragraph and sentence segmentation with stable `S<n>` ids.

use std::sync::LazyLock;

use regex::Regex;

static HORIZONTAL_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("valid whitespace regex"));
static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n\s*").expect("valid paragraph regex"));
static SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?。！？]+(?:[.!?。！？]+|$)").expect("valid sentence regex"));

/// One addressable sentence of the submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceUnit {
    /// 1-based, contiguous across the whole submission.
    pub id: u32,
    /// 1-based paragraph number.
    pub paragraph: u32,
    pub text: String,
}

impl SentenceUnit {
    pub fn label(&self) -> String {
        format!("S{}", self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Segmentation {
    pub units: Vec<SentenceUnit>,
    pub paragraph_count: u32,
}

impl Segmentation {
    /// `¶1 [S1] First. [S2] Second.` per paragraph, separated by a blank line.
    pub fn numbered_text(&self) -> String {
        let mut paragraphs: Vec<String> = Vec::new();
        let mut current = 0;
        for unit in &self.units {
            if unit.paragraph != current {
                current = unit.paragraph;
                paragraphs.push(format!("¶{}", current));
            }
            if let Some(last) = paragraphs.last_mut() {
                last.push_str(&format!(" [{}] {}", unit.label(), unit.text));
            }
        }
        paragraphs.join("\n\n")
    }

    pub fn sentence_count(&self) -> usize {
        self.units.len()
    }
}

/// Whitespace-delimited token count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split `text` into paragraphs on blank lines and each paragraph into
/// sentences on sentence-final punctuation (Latin and full-width), keeping
/// the punctuation. Empty paragraphs are dropped; a non-empty paragraph with
/// no recognizable sentence becomes a single unit.
pub fn segment(text: &str) -> Segmentation {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let normalized = HORIZONTAL_SPACE.replace_all(&normalized, " ");

    let mut segmentation = Segmentation::default();
    let mut next_id = 1;

    for raw_paragraph in PARAGRAPH_BREAK.split(normalized.trim()) {
        let paragraph = raw_paragraph
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if paragraph.is_empty() {
            continue;
        }
        segmentation.paragraph_count += 1;
        let paragraph_no = segmentation.paragraph_count;

        let mut sentences: Vec<String> = SENTENCE
            .find_iter(&paragraph)
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if sentences.is_empty() {
            sentences.push(paragraph.clone());
        }

        for sentence in sentences {
            segmentation.units.push(SentenceUnit {
                id: next_id,
                paragraph: paragraph_no,
                text: sentence,
            });
            next_id += 1;
        }
    }

    segmentation
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn splits_sentences_and_keeps_punctuation() {
        let seg = segment("I like cats. They are cute! Do you?");
        let texts: Vec<&str> = seg.units.iter().map(|u| u.text.as_str()).collect();
        assert_eq!(texts, vec!["I like cats.", "They are cute!", "Do you?"]);
        assert_eq!(seg.paragraph_count, 1);
    }

    #[test]
    fn ids_continue_across_paragraphs() {
        let seg = segment("First one. Second one.\n\n  Third one.\r\n\r\nFourth");
        let ids: Vec<(u32, u32)> = seg.units.iter().map(|u| (u.id, u.paragraph)).collect();
        assert_eq!(ids, vec![(1, 1), (2, 1), (3, 2), (4, 3)]);
        assert_eq!(seg.units[3].text, "Fourth");
    }

    #[test]
    fn single_newlines_stay_in_one_paragraph() {
        let seg = segment("Line one\ncontinues here. Next.");
        assert_eq!(seg.paragraph_count, 1);
        assert_eq!(seg.units[0].text, "Line one continues here.");
    }

    #[test]
    fn full_width_punctuation_splits() {
        let seg = segment("今日は晴れ。明日は雨？");
        assert_eq!(seg.sentence_count(), 2);
        assert_eq!(seg.units[1].text, "明日は雨？");
    }

    #[test]
    fn punctuation_only_paragraph_still_yields_a_unit() {
        let seg = segment("Hello.\n\n...\n\nBye.");
        assert_eq!(seg.paragraph_count, 3);
        assert_eq!(seg.units[1].text, "...");
        assert_eq!(seg.units[1].paragraph, 2);
    }

    #[test]
    fn blank_input_yields_nothing() {
        let seg = segment(" \n\n \t ");
        assert!(seg.units.is_empty());
        assert_eq!(seg.numbered_text(), "");
    }

    #[test]
    fn numbered_text_format() {
        let seg = segment("A b.  C d!\n\nE f.");
        assert_eq!(seg.numbered_text(), "¶1 [S1] A b. [S2] C d!\n\n¶2 [S3] E f.");
    }

    #[test]
    fn word_count_counts_whitespace_tokens() {
        assert_eq!(word_count("  I think,  therefore\nI am. "), 5);
        assert_eq!(word_count(""), 0);
    }

    fn arb_paragraph() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-z]{1,8}( [a-z]{1,8}){0,6}[.!?。]?", 1..5)
            .prop_map(|sentences| sentences.join(" "))
    }

    proptest! {
        #[test]
        fn ids_are_contiguous_and_grouped(paragraphs in prop::collection::vec(arb_paragraph(), 1..6)) {
            let text = paragraphs.join("\n\n");
            let seg = segment(&text);

            prop_assert_eq!(seg.paragraph_count as usize, paragraphs.len());
            for (index, unit) in seg.units.iter().enumerate() {
                prop_assert_eq!(unit.id as usize, index + 1);
            }
            // Paragraph numbers never decrease, so each id sits in one group.
            for pair in seg.units.windows(2) {
                prop_assert!(pair[0].paragraph <= pair[1].paragraph);
            }
            let groups: std::collections::BTreeSet<u32> = seg.units.iter().map(|u| u.paragraph).collect();
            prop_assert_eq!(groups.len(), paragraphs.len());
        }
    }
}
