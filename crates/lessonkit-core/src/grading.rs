//! Local correctness rules for the variants that are graded on-device.
//!
//! FreeText, Translation and VoiceAnswer are graded remotely (see
//! [`crate::traits::AnswerValidator`]); explanation variants and
//! SpeakAndRepeat have no correctness check.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::{Highlight, MatchPair, Mcq, ReorderList, SliderEstimate};

/// Slider answers within this share of the slider range count as correct.
pub const SLIDER_TOLERANCE_RATIO: f64 = 0.10;

/// A swipe further than this share of the screen width commits a direction.
pub const SWIPE_DISTANCE_RATIO: f64 = 0.20;

/// Horizontal release velocity (points per millisecond) that commits a swipe
/// regardless of distance.
pub const SWIPE_VELOCITY_THRESHOLD: f64 = 0.5;

// ---------------------------------------------------------------------------
// MCQ
// ---------------------------------------------------------------------------

pub fn grade_mcq(mcq: &Mcq, selected: &str) -> bool {
    selected == mcq.answer
}

// ---------------------------------------------------------------------------
// Fill in the blanks
// ---------------------------------------------------------------------------

/// A piece of a FIB template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "segment", rename_all = "snake_case")]
pub enum TemplateSegment {
    Text { text: String },
    /// `index` is the blank's position of appearance; `label` is the `n` in
    /// `{BLANK_n}` as written.
    Blank { index: usize, label: u32 },
}

/// Split a template into text and `{BLANK_n}` placeholders.
///
/// Anything that looks like a placeholder but is not well-formed stays text.
pub fn parse_template(template: &str) -> Vec<TemplateSegment> {
    const OPEN: &str = "{BLANK_";

    let mut segments = Vec::new();
    let mut text = String::new();
    let mut rest = template;
    let mut index = 0;

    while let Some(start) = rest.find(OPEN) {
        text.push_str(&rest[..start]);
        let after = &rest[start + OPEN.len()..];
        let digits = after.chars().take_while(char::is_ascii_digit).count();
        let label = after[..digits].parse::<u32>().ok();

        match (label, after[digits..].starts_with('}')) {
            (Some(label), true) => {
                if !text.is_empty() {
                    segments.push(TemplateSegment::Text {
                        text: std::mem::take(&mut text),
                    });
                }
                segments.push(TemplateSegment::Blank { index, label });
                index += 1;
                rest = &after[digits + 1..];
            }
            _ => {
                text.push_str(OPEN);
                rest = after;
            }
        }
    }
    text.push_str(rest);
    if !text.is_empty() {
        segments.push(TemplateSegment::Text { text });
    }
    segments
}

pub fn blank_count(template: &str) -> usize {
    parse_template(template)
        .iter()
        .filter(|s| matches!(s, TemplateSegment::Blank { .. }))
        .count()
}

fn normalize_blank(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Every input, trimmed and lower-cased, must equal the correct answer at the
/// same index.
pub fn grade_fib(correct_answers: &[String], inputs: &[String]) -> bool {
    inputs.len() == correct_answers.len()
        && inputs
            .iter()
            .zip(correct_answers)
            .all(|(input, correct)| normalize_blank(input) == normalize_blank(correct))
}

// ---------------------------------------------------------------------------
// Highlight
// ---------------------------------------------------------------------------

/// A selectable word of a highlight passage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordToken {
    pub word_index: usize,
    pub text: String,
}

/// Whitespace tokenisation; `word_index` disambiguates repeated words.
pub fn tokenize_passage(text: &str) -> Vec<WordToken> {
    text.split_whitespace()
        .enumerate()
        .map(|(word_index, word)| WordToken {
            word_index,
            text: word.to_string(),
        })
        .collect()
}

/// Comparison key for a word: edge punctuation trimmed, case-folded.
fn word_key(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Every word of every `answer` entry must appear among the selected tokens.
pub fn grade_highlight(highlight: &Highlight, selected: &BTreeSet<usize>) -> bool {
    let tokens = tokenize_passage(&highlight.text);
    let chosen: BTreeSet<String> = selected
        .iter()
        .filter_map(|&i| tokens.get(i))
        .map(|t| word_key(&t.text))
        .collect();

    highlight
        .answer
        .iter()
        .flat_map(|a| a.split_whitespace())
        .map(word_key)
        .filter(|k| !k.is_empty())
        .all(|k| chosen.contains(&k))
}

/// Word indices a fully correct selection would contain.
pub fn highlight_solution(highlight: &Highlight) -> BTreeSet<usize> {
    let wanted: BTreeSet<String> = highlight
        .answer
        .iter()
        .flat_map(|a| a.split_whitespace())
        .map(word_key)
        .collect();
    tokenize_passage(&highlight.text)
        .into_iter()
        .filter(|t| wanted.contains(&word_key(&t.text)))
        .map(|t| t.word_index)
        .collect()
}

// ---------------------------------------------------------------------------
// Match pairs / reorder
// ---------------------------------------------------------------------------

pub fn grade_match_pair(question: &MatchPair, matches: &BTreeMap<String, String>) -> bool {
    question
        .pairs
        .iter()
        .all(|p| matches.get(&p.left) == Some(&p.right))
}

pub fn grade_reorder(question: &ReorderList, order: &[String]) -> bool {
    order == question.steps.as_slice()
}

/// The order steps are first shown in: sorted, or rotated by one when the
/// sorted order already is the answer.
pub fn initial_order(steps: &[String]) -> Vec<String> {
    let mut order = steps.to_vec();
    order.sort();
    if order == steps && order.len() > 1 {
        order.rotate_left(1);
    }
    order
}

// ---------------------------------------------------------------------------
// Slider
// ---------------------------------------------------------------------------

/// Clamp to the slider range and snap to the nearest step from `min_value`.
pub fn snap_slider(slider: &SliderEstimate, value: f64) -> f64 {
    let (lo, hi) = if slider.min_value <= slider.max_value {
        (slider.min_value, slider.max_value)
    } else {
        (slider.max_value, slider.min_value)
    };
    let clamped = value.clamp(lo, hi);
    if slider.step_size <= 0.0 || !slider.step_size.is_finite() {
        return clamped;
    }
    let steps = ((clamped - lo) / slider.step_size).round();
    (lo + steps * slider.step_size).clamp(lo, hi)
}

pub fn slider_tolerance(slider: &SliderEstimate) -> f64 {
    SLIDER_TOLERANCE_RATIO * (slider.max_value - slider.min_value).abs()
}

/// `|value - correct_value| <= 10% of (max_value - min_value)`.
pub fn grade_slider(slider: &SliderEstimate, value: f64) -> bool {
    // Absorbs float noise from step snapping, e.g. 0.1 + 0.2.
    const EPSILON: f64 = 1e-9;
    (value - slider.correct_value).abs() <= slider_tolerance(slider) + EPSILON
}

// ---------------------------------------------------------------------------
// Swipe cards
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwipeDirection {
    Left,
    Right,
}

impl SwipeDirection {
    /// Right means "true", left means "false".
    pub fn as_answer(self) -> bool {
        matches!(self, SwipeDirection::Right)
    }

    pub fn from_answer(answer: bool) -> Self {
        if answer {
            SwipeDirection::Right
        } else {
            SwipeDirection::Left
        }
    }
}

/// Resolve a released drag into a direction, or `None` when the card should
/// snap back.
pub fn swipe_direction(dx: f64, velocity_x: f64, screen_width: f64) -> Option<SwipeDirection> {
    let threshold = screen_width.abs() * SWIPE_DISTANCE_RATIO;
    if dx > threshold || velocity_x > SWIPE_VELOCITY_THRESHOLD {
        Some(SwipeDirection::Right)
    } else if dx < -threshold || velocity_x < -SWIPE_VELOCITY_THRESHOLD {
        Some(SwipeDirection::Left)
    } else {
        None
    }
}

pub fn grade_swipe(answer: bool, direction: SwipeDirection) -> bool {
    direction.as_answer() == answer
}

// ---------------------------------------------------------------------------
// Listen and type
// ---------------------------------------------------------------------------

/// Strip punctuation, collapse whitespace, case-fold.
pub fn normalize_transcript(s: &str) -> String {
    let kept: String = s
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn grade_listen_and_type(expected: &str, input: &str) -> bool {
    normalize_transcript(input) == normalize_transcript(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Pair;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn mcq_matches_answer_key_only() {
        let mcq = Mcq {
            options: [("A", "Berlin"), ("B", "Paris"), ("C", "Rome")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            answer: "B".into(),
        };
        assert!(grade_mcq(&mcq, "B"));
        assert!(!grade_mcq(&mcq, "A"));
        assert!(!grade_mcq(&mcq, "C"));
        assert!(!grade_mcq(&mcq, "b"));
    }

    #[test]
    fn fib_is_case_and_whitespace_insensitive() {
        let correct = strings(&["Paris", "1789"]);
        assert!(grade_fib(&correct, &strings(&["paris", "1789"])));
        assert!(grade_fib(&correct, &strings(&["  PARIS ", "1789"])));
        assert!(!grade_fib(&correct, &strings(&["Paris", "1788"])));
        assert!(!grade_fib(&correct, &strings(&["Paris"])));
    }

    #[test]
    fn template_blanks_in_order_of_appearance() {
        let segments = parse_template("{BLANK_2} fell in {BLANK_1}.");
        assert_eq!(
            segments,
            vec![
                TemplateSegment::Blank { index: 0, label: 2 },
                TemplateSegment::Text {
                    text: " fell in ".into()
                },
                TemplateSegment::Blank { index: 1, label: 1 },
                TemplateSegment::Text { text: ".".into() },
            ]
        );
    }

    #[test]
    fn malformed_placeholder_stays_text() {
        assert_eq!(blank_count("{BLANK_x} and {BLANK_3"), 0);
        assert_eq!(blank_count("The {BLANK_1} of {BLANK_}"), 1);
    }

    #[test]
    fn highlight_uses_word_index_for_duplicates() {
        let h = Highlight {
            text: "The cat saw the dog.".into(),
            answer: strings(&["dog"]),
        };
        let tokens = tokenize_passage(&h.text);
        assert_eq!(tokens[4].text, "dog.");
        assert!(grade_highlight(&h, &BTreeSet::from([4])));
        assert!(grade_highlight(&h, &BTreeSet::from([1, 4])));
        assert!(!grade_highlight(&h, &BTreeSet::from([1])));
        assert_eq!(highlight_solution(&h), BTreeSet::from([4]));
    }

    #[test]
    fn highlight_phrase_needs_every_word() {
        let h = Highlight {
            text: "She moved to New York last year".into(),
            answer: strings(&["New York"]),
        };
        assert!(!grade_highlight(&h, &BTreeSet::from([3])));
        assert!(grade_highlight(&h, &BTreeSet::from([3, 4])));
    }

    #[test]
    fn match_pair_requires_every_left() {
        let q = MatchPair {
            pairs: vec![
                Pair {
                    left: "H2O".into(),
                    right: "Water".into(),
                },
                Pair {
                    left: "NaCl".into(),
                    right: "Salt".into(),
                },
            ],
        };
        let mut matches = BTreeMap::new();
        matches.insert("H2O".to_string(), "Water".to_string());
        assert!(!grade_match_pair(&q, &matches));
        matches.insert("NaCl".to_string(), "Salt".to_string());
        assert!(grade_match_pair(&q, &matches));
        matches.insert("NaCl".to_string(), "Water".to_string());
        assert!(!grade_match_pair(&q, &matches));
    }

    #[test]
    fn reorder_index_for_index() {
        let q = ReorderList {
            steps: strings(&["A", "B", "C"]),
        };
        assert!(grade_reorder(&q, &strings(&["A", "B", "C"])));
        assert!(!grade_reorder(&q, &strings(&["B", "A", "C"])));
    }

    #[test]
    fn initial_order_never_starts_solved() {
        assert_eq!(
            initial_order(&strings(&["A", "B", "C"])),
            strings(&["B", "C", "A"])
        );
        assert_eq!(
            initial_order(&strings(&["boil", "add", "cook"])),
            strings(&["add", "boil", "cook"])
        );
        assert_eq!(initial_order(&strings(&["only"])), strings(&["only"]));
    }

    fn slider() -> SliderEstimate {
        SliderEstimate {
            min_value: 0.0,
            max_value: 100.0,
            step_size: 1.0,
            correct_value: 50.0,
            unit: "%".into(),
        }
    }

    #[test]
    fn slider_within_ten_percent_of_range() {
        let s = slider();
        assert!(grade_slider(&s, 45.0));
        assert!(grade_slider(&s, 60.0));
        assert!(grade_slider(&s, 40.0));
        assert!(!grade_slider(&s, 38.0));
        assert!(!grade_slider(&s, 61.0));
    }

    #[test]
    fn slider_snaps_and_clamps() {
        let s = SliderEstimate {
            step_size: 5.0,
            ..slider()
        };
        assert_eq!(snap_slider(&s, 43.0), 45.0);
        assert_eq!(snap_slider(&s, -10.0), 0.0);
        assert_eq!(snap_slider(&s, 1000.0), 100.0);
    }

    #[test]
    fn swipe_thresholds() {
        // 20% of 400 is 80.
        assert_eq!(swipe_direction(81.0, 0.0, 400.0), Some(SwipeDirection::Right));
        assert_eq!(swipe_direction(-81.0, 0.0, 400.0), Some(SwipeDirection::Left));
        assert_eq!(swipe_direction(40.0, 0.0, 400.0), None);
        assert_eq!(swipe_direction(10.0, 0.8, 400.0), Some(SwipeDirection::Right));
        assert_eq!(swipe_direction(-10.0, -0.8, 400.0), Some(SwipeDirection::Left));
        assert!(grade_swipe(true, SwipeDirection::Right));
        assert!(!grade_swipe(true, SwipeDirection::Left));
        assert!(grade_swipe(false, SwipeDirection::Left));
    }

    #[test]
    fn transcript_normalization() {
        assert_eq!(
            normalize_transcript("  Hello,   World!  How are\tyou? "),
            "hello world how are you"
        );
        assert!(grade_listen_and_type(
            "Où est la gare?",
            "où   est la GARE"
        ));
        assert!(!grade_listen_and_type("the cat sat", "the cat sat down"));
    }
}
