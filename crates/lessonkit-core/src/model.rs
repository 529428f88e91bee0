//! Core data model types for lessonkit.
//!
//! A lesson is an ordered list of items. Each item is either a [`Question`]
//! (one of seventeen question/explanation variants) or an
//! [`UnsupportedItem`] kept around so the learner sees a notice instead of a
//! silently skipped step.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::QuestionError;

/// The fixed set of question/explanation presentation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Mcq,
    Fib,
    FreeText,
    Translation,
    VoiceAnswer,
    Highlight,
    MatchPair,
    ReorderList,
    SliderEstimate,
    SwipeCards,
    ListenAndType,
    SpeakAndRepeat,
    FeynmanWhy,
    MiniMindmap,
    Derivation,
    AnalogyCard,
    SpacedRecap,
}

impl QuestionType {
    pub const ALL: [QuestionType; 17] = [
        QuestionType::Mcq,
        QuestionType::Fib,
        QuestionType::FreeText,
        QuestionType::Translation,
        QuestionType::VoiceAnswer,
        QuestionType::Highlight,
        QuestionType::MatchPair,
        QuestionType::ReorderList,
        QuestionType::SliderEstimate,
        QuestionType::SwipeCards,
        QuestionType::ListenAndType,
        QuestionType::SpeakAndRepeat,
        QuestionType::FeynmanWhy,
        QuestionType::MiniMindmap,
        QuestionType::Derivation,
        QuestionType::AnalogyCard,
        QuestionType::SpacedRecap,
    ];

    /// The wire tag used in the `type` field.
    pub fn tag(self) -> &'static str {
        match self {
            QuestionType::Mcq => "mcq",
            QuestionType::Fib => "fib",
            QuestionType::FreeText => "free_text",
            QuestionType::Translation => "translation",
            QuestionType::VoiceAnswer => "voice_answer",
            QuestionType::Highlight => "highlight",
            QuestionType::MatchPair => "match_pair",
            QuestionType::ReorderList => "reorder_list",
            QuestionType::SliderEstimate => "slider_estimate",
            QuestionType::SwipeCards => "swipe_cards",
            QuestionType::ListenAndType => "listen_and_type",
            QuestionType::SpeakAndRepeat => "speak_and_repeat",
            QuestionType::FeynmanWhy => "feynman_why",
            QuestionType::MiniMindmap => "mini_mindmap",
            QuestionType::Derivation => "derivation",
            QuestionType::AnalogyCard => "analogy_card",
            QuestionType::SpacedRecap => "spaced_recap",
        }
    }

    /// Human-readable name, used as a header fallback.
    pub fn label(self) -> &'static str {
        match self {
            QuestionType::Mcq => "Multiple choice",
            QuestionType::Fib => "Fill in the blanks",
            QuestionType::FreeText => "Free answer",
            QuestionType::Translation => "Translate",
            QuestionType::VoiceAnswer => "Answer out loud",
            QuestionType::Highlight => "Highlight the words",
            QuestionType::MatchPair => "Match the pairs",
            QuestionType::ReorderList => "Put the steps in order",
            QuestionType::SliderEstimate => "Estimate",
            QuestionType::SwipeCards => "True or false",
            QuestionType::ListenAndType => "Listen and type",
            QuestionType::SpeakAndRepeat => "Speak and repeat",
            QuestionType::FeynmanWhy => "Why does it work?",
            QuestionType::MiniMindmap => "Mind map",
            QuestionType::Derivation => "Derivation",
            QuestionType::AnalogyCard => "Analogy",
            QuestionType::SpacedRecap => "Recap",
        }
    }

    /// Informational variants with no correctness concept.
    pub fn is_explanation(self) -> bool {
        matches!(
            self,
            QuestionType::FeynmanWhy
                | QuestionType::MiniMindmap
                | QuestionType::Derivation
                | QuestionType::AnalogyCard
                | QuestionType::SpacedRecap
        )
    }

    /// Variants reported correct as soon as they are viewed.
    ///
    /// Continue is always offered for these; a local check is still
    /// available for Highlight, MatchPair and ReorderList but does not change
    /// the reported outcome.
    pub fn is_auto_answer(self) -> bool {
        self.is_explanation()
            || matches!(
                self,
                QuestionType::Highlight | QuestionType::MatchPair | QuestionType::ReorderList
            )
    }

    /// Variants graded by the remote validation endpoint.
    pub fn is_remote(self) -> bool {
        matches!(
            self,
            QuestionType::FreeText | QuestionType::Translation | QuestionType::VoiceAnswer
        )
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MCQ" => return Ok(QuestionType::Mcq),
            "FIB" => return Ok(QuestionType::Fib),
            _ => {}
        }
        QuestionType::ALL
            .into_iter()
            .find(|t| t.tag() == s)
            .ok_or_else(|| format!("unknown question type: {s}"))
    }
}

/// Free-form display fields shared by every variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptText {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PromptText {
    /// First non-empty of `question`, `statement`, `title`, `description`.
    pub fn header(&self) -> Option<&str> {
        [
            &self.question,
            &self.statement,
            &self.title,
            &self.description,
        ]
        .into_iter()
        .filter_map(|f| f.as_deref())
        .map(str::trim)
        .find(|s| !s.is_empty())
    }
}

/// Multiple choice: `options` keyed by choice key, `answer` is the correct key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mcq {
    pub options: BTreeMap<String, String>,
    pub answer: String,
}

/// Fill in the blanks. The template lives in the prompt's `question` field and
/// contains `{BLANK_n}` placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fib {
    pub correct_answers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeText {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub text: String,
    pub from_language: String,
    pub to_language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_translation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceAnswer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_answer: Option<String>,
}

/// Select the words of `text` listed in `answer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub text: String,
    pub answer: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPair {
    pub pairs: Vec<Pair>,
}

/// `steps` is the correct order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderList {
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliderEstimate {
    pub min_value: f64,
    pub max_value: f64,
    #[serde(default = "default_step_size")]
    pub step_size: f64,
    pub correct_value: f64,
    #[serde(default)]
    pub unit: String,
}

fn default_step_size() -> f64 {
    1.0
}

/// True/false card. The statement lives in the prompt's `statement` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwipeCards {
    pub answer: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenAndType {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakAndRepeat {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeynmanWhy {
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub why_points: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MindmapBranch {
    pub label: String,
    #[serde(default)]
    pub children: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MiniMindmap {
    #[serde(default)]
    pub center: String,
    #[serde(default)]
    pub branches: Vec<MindmapBranch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Derivation {
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalogyCard {
    #[serde(default)]
    pub concept: String,
    #[serde(default)]
    pub analogy: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpacedRecap {
    #[serde(default)]
    pub points: Vec<String>,
}

/// Variant-specific payload, discriminated by the `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    #[serde(alias = "MCQ")]
    Mcq(Mcq),
    #[serde(alias = "FIB")]
    Fib(Fib),
    FreeText(FreeText),
    Translation(Translation),
    VoiceAnswer(VoiceAnswer),
    Highlight(Highlight),
    MatchPair(MatchPair),
    ReorderList(ReorderList),
    SliderEstimate(SliderEstimate),
    SwipeCards(SwipeCards),
    ListenAndType(ListenAndType),
    SpeakAndRepeat(SpeakAndRepeat),
    FeynmanWhy(FeynmanWhy),
    MiniMindmap(MiniMindmap),
    Derivation(Derivation),
    AnalogyCard(AnalogyCard),
    SpacedRecap(SpacedRecap),
}

impl QuestionKind {
    pub fn question_type(&self) -> QuestionType {
        match self {
            QuestionKind::Mcq(_) => QuestionType::Mcq,
            QuestionKind::Fib(_) => QuestionType::Fib,
            QuestionKind::FreeText(_) => QuestionType::FreeText,
            QuestionKind::Translation(_) => QuestionType::Translation,
            QuestionKind::VoiceAnswer(_) => QuestionType::VoiceAnswer,
            QuestionKind::Highlight(_) => QuestionType::Highlight,
            QuestionKind::MatchPair(_) => QuestionType::MatchPair,
            QuestionKind::ReorderList(_) => QuestionType::ReorderList,
            QuestionKind::SliderEstimate(_) => QuestionType::SliderEstimate,
            QuestionKind::SwipeCards(_) => QuestionType::SwipeCards,
            QuestionKind::ListenAndType(_) => QuestionType::ListenAndType,
            QuestionKind::SpeakAndRepeat(_) => QuestionType::SpeakAndRepeat,
            QuestionKind::FeynmanWhy(_) => QuestionType::FeynmanWhy,
            QuestionKind::MiniMindmap(_) => QuestionType::MiniMindmap,
            QuestionKind::Derivation(_) => QuestionType::Derivation,
            QuestionKind::AnalogyCard(_) => QuestionType::AnalogyCard,
            QuestionKind::SpacedRecap(_) => QuestionType::SpacedRecap,
        }
    }
}

/// A single question: shared display text plus exactly one variant payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub prompt: PromptText,
    pub kind: QuestionKind,
}

impl Question {
    pub fn new(prompt: PromptText, kind: QuestionKind) -> Self {
        Self { prompt, kind }
    }

    pub fn question_type(&self) -> QuestionType {
        self.kind.question_type()
    }

    /// The header shown above the question body.
    ///
    /// A FIB `question` is the blank template rendered in the body, so it is
    /// skipped here.
    pub fn header(&self) -> String {
        let header = match &self.kind {
            QuestionKind::Fib(_) => PromptText {
                question: None,
                ..self.prompt.clone()
            }
            .header()
            .map(str::to_string),
            _ => self.prompt.header().map(str::to_string),
        };
        header.unwrap_or_else(|| self.question_type().label().to_string())
    }

    /// Build a question from a raw object.
    ///
    /// Unknown tags and missing required fields both fail closed; the caller
    /// turns the error into an [`UnsupportedItem`].
    pub fn from_value(value: Value) -> Result<Self, QuestionError> {
        let Value::Object(map) = &value else {
            return Err(QuestionError::NotAnObject);
        };
        let tag = map
            .get("type")
            .and_then(Value::as_str)
            .ok_or(QuestionError::MissingType)?;
        let question_type: QuestionType = tag
            .parse()
            .map_err(|_| QuestionError::UnknownType(tag.to_string()))?;

        let malformed = |message: String| QuestionError::Malformed {
            kind: question_type,
            message,
        };

        let kind: QuestionKind =
            serde_json::from_value(value.clone()).map_err(|e| malformed(e.to_string()))?;
        let prompt: PromptText =
            serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;

        let required = match question_type {
            QuestionType::Fib | QuestionType::FreeText | QuestionType::VoiceAnswer => {
                Some(("question", &prompt.question))
            }
            QuestionType::SwipeCards => Some(("statement", &prompt.statement)),
            _ => None,
        };
        if let Some((field, value)) = required {
            if value.as_deref().map_or(true, |s| s.trim().is_empty()) {
                return Err(malformed(format!("missing field `{field}`")));
            }
        }

        Ok(Self { prompt, kind })
    }

    /// Flatten back into the wire shape (`type` tag, payload and prompt fields).
    pub fn to_value(&self) -> serde_json::Result<Value> {
        let mut value = serde_json::to_value(&self.kind)?;
        if let (Value::Object(map), Value::Object(prompt)) =
            (&mut value, serde_json::to_value(&self.prompt)?)
        {
            map.extend(prompt);
        }
        Ok(value)
    }
}

impl Serialize for Question {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Question {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Question::from_value(value).map_err(serde::de::Error::custom)
    }
}

/// A lesson entry that could not be turned into a [`Question`].
#[derive(Debug, Clone, PartialEq)]
pub struct UnsupportedItem {
    pub error: QuestionError,
    pub raw: Value,
}

impl UnsupportedItem {
    /// The raw `type` tag, if one was present.
    pub fn type_name(&self) -> Option<&str> {
        self.raw.get("type").and_then(Value::as_str)
    }
}

/// One entry of a lesson.
#[derive(Debug, Clone, PartialEq)]
pub enum LessonItem {
    Question(Question),
    Unsupported(UnsupportedItem),
}

impl LessonItem {
    pub fn from_value(value: Value) -> Self {
        match Question::from_value(value.clone()) {
            Ok(q) => LessonItem::Question(q),
            Err(error) => LessonItem::Unsupported(UnsupportedItem { error, raw: value }),
        }
    }

    pub fn question(&self) -> Option<&Question> {
        match self {
            LessonItem::Question(q) => Some(q),
            LessonItem::Unsupported(_) => None,
        }
    }

    pub fn question_type(&self) -> Option<QuestionType> {
        self.question().map(Question::question_type)
    }
}

impl From<Question> for LessonItem {
    fn from(q: Question) -> Self {
        LessonItem::Question(q)
    }
}

impl Serialize for LessonItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LessonItem::Question(q) => q.serialize(serializer),
            LessonItem::Unsupported(u) => u.raw.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for LessonItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(LessonItem::from_value(Value::deserialize(deserializer)?))
    }
}

/// An ordered sequence of lesson items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "items")]
    pub questions: Vec<LessonItem>,
}
