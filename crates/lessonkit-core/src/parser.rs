//! Lesson file loading and validation.
//!
//! Lessons are JSON (the backend's wire shape) or TOML (hand-authored). Both
//! share one layout: `id`, `title`, optional `description`, and a
//! `questions` array whose entries carry a `type` tag.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};

use crate::grading::{blank_count, tokenize_passage};
use crate::model::{Lesson, LessonItem, QuestionKind};

/// Lesson file formats, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonFormat {
    Json,
    Toml,
}

impl LessonFormat {
    /// `.toml` is TOML; anything else is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => LessonFormat::Toml,
            _ => LessonFormat::Json,
        }
    }
}

/// Parse a lesson file.
pub fn parse_lesson(path: &Path) -> Result<Lesson> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read lesson file: {}", path.display()))?;

    parse_lesson_str(&content, LessonFormat::from_path(path))
        .with_context(|| format!("failed to parse lesson: {}", path.display()))
}

/// Parse lesson text in the given format.
///
/// Individual questions never fail the parse; they become
/// [`LessonItem::Unsupported`] entries.
pub fn parse_lesson_str(content: &str, format: LessonFormat) -> Result<Lesson> {
    let lesson: Lesson = match format {
        LessonFormat::Json => serde_json::from_str(content).context("invalid lesson JSON")?,
        LessonFormat::Toml => toml::from_str(content).context("invalid lesson TOML")?,
    };
    Ok(lesson)
}

/// Load every `.json` and `.toml` lesson under `dir`, recursively.
///
/// Files that fail to parse are skipped with a warning.
pub fn load_lesson_directory(dir: &Path) -> Result<Vec<Lesson>> {
    let mut lessons = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            lessons.extend(load_lesson_directory(&path)?);
        } else if path
            .extension()
            .is_some_and(|ext| ext == "json" || ext == "toml")
        {
            match parse_lesson(&path) {
                Ok(lesson) => lessons.push(lesson),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(lessons)
}

/// A warning from lesson validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonWarning {
    /// The lesson the warning belongs to.
    pub lesson_id: String,
    /// 1-based question number, if the warning is about one question.
    pub question_number: Option<usize>,
    pub message: String,
}

impl std::fmt::Display for LessonWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.question_number {
            Some(n) => write!(f, "[{}] question {n}: {}", self.lesson_id, self.message),
            None => write!(f, "[{}] {}", self.lesson_id, self.message),
        }
    }
}

/// Validate a lesson for content issues the parser tolerates.
pub fn validate_lesson(lesson: &Lesson) -> Vec<LessonWarning> {
    let mut warnings = Vec::new();
    let lesson_warning = |message: String| LessonWarning {
        lesson_id: lesson.id.clone(),
        question_number: None,
        message,
    };

    if lesson.id.trim().is_empty() {
        warnings.push(lesson_warning("lesson id is empty".into()));
    }
    if lesson.title.trim().is_empty() {
        warnings.push(lesson_warning("lesson title is empty".into()));
    }
    if lesson.questions.is_empty() {
        warnings.push(lesson_warning("lesson has no questions".into()));
    }

    for (index, item) in lesson.questions.iter().enumerate() {
        for message in item_issues(item) {
            warnings.push(LessonWarning {
                lesson_id: lesson.id.clone(),
                question_number: Some(index + 1),
                message,
            });
        }
    }

    warnings
}

/// Validate several lessons, adding duplicate-id warnings.
pub fn validate_lessons(lessons: &[Lesson]) -> Vec<LessonWarning> {
    let mut warnings = Vec::new();
    let mut seen_ids = HashSet::new();
    for lesson in lessons {
        if !lesson.id.is_empty() && !seen_ids.insert(lesson.id.as_str()) {
            warnings.push(LessonWarning {
                lesson_id: lesson.id.clone(),
                question_number: None,
                message: format!("duplicate lesson id: {}", lesson.id),
            });
        }
        warnings.extend(validate_lesson(lesson));
    }
    warnings
}

fn comparable_word(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

fn item_issues(item: &LessonItem) -> Vec<String> {
    let question = match item {
        LessonItem::Question(q) => q,
        LessonItem::Unsupported(u) => return vec![u.error.to_string()],
    };

    let mut issues = Vec::new();
    match &question.kind {
        QuestionKind::Mcq(mcq) => {
            if mcq.options.is_empty() {
                issues.push("mcq has no options".to_string());
            } else if !mcq.options.contains_key(&mcq.answer) {
                issues.push(format!("answer `{}` is not one of the options", mcq.answer));
            }
        }
        QuestionKind::Fib(fib) => {
            let template = question.prompt.question.as_deref().unwrap_or_default();
            let blanks = blank_count(template);
            if fib.correct_answers.is_empty() {
                issues.push("fib has no correct_answers".to_string());
            } else if blanks > 0 && blanks != fib.correct_answers.len() {
                issues.push(format!(
                    "template has {blanks} blanks but {} correct_answers",
                    fib.correct_answers.len()
                ));
            }
        }
        QuestionKind::Highlight(h) => {
            let passage: HashSet<String> = tokenize_passage(&h.text)
                .iter()
                .map(|t| comparable_word(&t.text))
                .collect();
            if h.answer.is_empty() {
                issues.push("highlight has no answer".to_string());
            }
            for answer in &h.answer {
                if answer
                    .split_whitespace()
                    .any(|w| !passage.contains(&comparable_word(w)))
                {
                    issues.push(format!("highlight answer `{answer}` is not in the passage"));
                }
            }
        }
        QuestionKind::MatchPair(m) => {
            if m.pairs.is_empty() {
                issues.push("match_pair has no pairs".to_string());
            }
            let mut lefts = HashSet::new();
            for pair in &m.pairs {
                if !lefts.insert(pair.left.as_str()) {
                    issues.push(format!("duplicate left item: {}", pair.left));
                }
            }
        }
        QuestionKind::ReorderList(r) => {
            if r.steps.is_empty() {
                issues.push("reorder_list has no steps".to_string());
            }
            let unique: HashSet<&str> = r.steps.iter().map(String::as_str).collect();
            if unique.len() != r.steps.len() {
                issues.push("reorder_list has duplicate steps".to_string());
            }
        }
        QuestionKind::SliderEstimate(s) => {
            if s.max_value <= s.min_value {
                issues.push(format!(
                    "slider range is empty ({}..{})",
                    s.min_value, s.max_value
                ));
            } else if s.correct_value < s.min_value || s.correct_value > s.max_value {
                issues.push(format!(
                    "correct_value {} is outside {}..{}",
                    s.correct_value, s.min_value, s.max_value
                ));
            }
            if s.step_size <= 0.0 {
                issues.push("step_size must be positive".to_string());
            }
        }
        QuestionKind::Translation(t) => {
            if t.text.trim().is_empty() {
                issues.push("translation text is empty".to_string());
            }
        }
        QuestionKind::ListenAndType(l) => {
            if l.text.trim().is_empty() {
                issues.push("listen_and_type text is empty".to_string());
            }
        }
        QuestionKind::SpeakAndRepeat(s) => {
            if s.text.trim().is_empty() {
                issues.push("speak_and_repeat text is empty".to_string());
            }
        }
        QuestionKind::FreeText(_)
        | QuestionKind::VoiceAnswer(_)
        | QuestionKind::SwipeCards(_)
        | QuestionKind::FeynmanWhy(_)
        | QuestionKind::MiniMindmap(_)
        | QuestionKind::Derivation(_)
        | QuestionKind::AnalogyCard(_)
        | QuestionKind::SpacedRecap(_) => {}
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionType;

    const VALID_TOML: &str = r#"
id = "geo-101"
title = "European capitals"
description = "A warm-up lesson"

[[questions]]
type = "mcq"
question = "Capital of France?"
answer = "B"

[questions.options]
A = "Berlin"
B = "Paris"

[[questions]]
type = "fib"
question = "The capital of Italy is {BLANK_1}."
correct_answers = ["Rome"]

[[questions]]
type = "slider_estimate"
question = "How many EU member states?"
min_value = 0
max_value = 50
correct_value = 27

[[questions]]
type = "spaced_recap"
title = "Recap"
points = ["Paris", "Rome"]
"#;

    const VALID_JSON: &str = r#"{
  "id": "geo-102",
  "title": "True or false",
  "items": [
    {"type": "swipe_cards", "statement": "Madrid is in Spain.", "answer": true},
    {"type": "FIB", "question": "{BLANK_1} is big.", "correct_answers": ["Berlin"]}
  ]
}"#;

    #[test]
    fn parse_valid_toml() {
        let lesson = parse_lesson_str(VALID_TOML, LessonFormat::Toml).unwrap();
        assert_eq!(lesson.id, "geo-101");
        assert_eq!(lesson.questions.len(), 4);
        let types: Vec<_> = lesson.questions.iter().map(LessonItem::question_type).collect();
        assert_eq!(
            types,
            vec![
                Some(QuestionType::Mcq),
                Some(QuestionType::Fib),
                Some(QuestionType::SliderEstimate),
                Some(QuestionType::SpacedRecap),
            ]
        );
        assert!(validate_lesson(&lesson).is_empty());
    }

    #[test]
    fn parse_json_with_items_alias() {
        let lesson = parse_lesson_str(VALID_JSON, LessonFormat::Json).unwrap();
        assert_eq!(lesson.questions.len(), 2);
        assert_eq!(lesson.description, "");
        assert_eq!(lesson.questions[1].question_type(), Some(QuestionType::Fib));
    }

    #[test]
    fn unknown_types_do_not_fail_the_parse() {
        let json = r#"{"id": "x", "title": "X", "questions": [
            {"type": "hologram"},
            {"question": "no type"},
            {"type": "free_text"}
        ]}"#;
        let lesson = parse_lesson_str(json, LessonFormat::Json).unwrap();
        assert!(lesson
            .questions
            .iter()
            .all(|q| matches!(q, LessonItem::Unsupported(_))));

        let warnings = validate_lesson(&lesson);
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].message.contains("hologram"));
        assert!(warnings[1].message.contains("no `type`"));
        assert!(warnings[2].message.contains("missing field `question`"));
        assert_eq!(warnings[2].question_number, Some(3));
    }

    #[test]
    fn validate_content_issues() {
        let json = r#"{"id": "bad", "title": "Bad", "questions": [
            {"type": "mcq", "question": "?", "options": {"A": "x"}, "answer": "Z"},
            {"type": "fib", "question": "{BLANK_1} and {BLANK_2}", "correct_answers": ["a"]},
            {"type": "slider_estimate", "question": "?", "min_value": 10, "max_value": 10, "correct_value": 10},
            {"type": "slider_estimate", "question": "?", "min_value": 0, "max_value": 10, "correct_value": 11},
            {"type": "reorder_list", "steps": []},
            {"type": "highlight", "text": "The quick fox", "answer": ["slow"]}
        ]}"#;
        let lesson = parse_lesson_str(json, LessonFormat::Json).unwrap();
        let warnings = validate_lesson(&lesson);
        let text: Vec<String> = warnings.iter().map(ToString::to_string).collect();

        assert!(text.iter().any(|w| w.contains("question 1") && w.contains("not one of the options")));
        assert!(text.iter().any(|w| w.contains("question 2") && w.contains("2 blanks but 1")));
        assert!(text.iter().any(|w| w.contains("question 3") && w.contains("range is empty")));
        assert!(text.iter().any(|w| w.contains("question 4") && w.contains("outside")));
        assert!(text.iter().any(|w| w.contains("question 5") && w.contains("no steps")));
        assert!(text.iter().any(|w| w.contains("question 6") && w.contains("`slow`")));
    }

    #[test]
    fn duplicate_lesson_ids() {
        let a = parse_lesson_str(VALID_JSON, LessonFormat::Json).unwrap();
        let b = a.clone();
        let warnings = validate_lessons(&[a, b]);
        assert!(warnings.iter().any(|w| w.message.contains("duplicate lesson id")));
    }

    #[test]
    fn parse_malformed_file() {
        assert!(parse_lesson_str("this is not [valid toml }{", LessonFormat::Toml).is_err());
        assert!(parse_lesson_str("{\"id\": 3", LessonFormat::Json).is_err());
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(LessonFormat::from_path(Path::new("a.toml")), LessonFormat::Toml);
        assert_eq!(LessonFormat::from_path(Path::new("a.TOML")), LessonFormat::Toml);
        assert_eq!(LessonFormat::from_path(Path::new("a.json")), LessonFormat::Json);
        assert_eq!(LessonFormat::from_path(Path::new("lesson")), LessonFormat::Json);
    }

    #[test]
    fn load_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.toml"), VALID_TOML).unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/b.json"), VALID_JSON).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let lessons = load_lesson_directory(dir.path()).unwrap();
        let ids: Vec<&str> = lessons.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["geo-101", "geo-102"]);
    }

    #[test]
    fn parse_lesson_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lesson.toml");
        std::fs::write(&path, VALID_TOML).unwrap();
        assert_eq!(parse_lesson(&path).unwrap().title, "European capitals");

        let err = parse_lesson(&dir.path().join("missing.json")).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read lesson file"));
    }
}
