//! Question dispatch and the per-variant interactive views.
//!
//! [`Dispatcher::mount`] turns a lesson item into a [`QuestionView`]. The view
//! owns the learner's transient response (selected option, typed text, slider
//! value, ...) and reports through [`AnswerCallbacks`]: `on_answer` at most
//! once per mounted question, `on_next` on every accepted Continue.
//!
//! Rendering is headless: [`QuestionView::render`] produces a
//! [`RenderedQuestion`] the host shell draws however it likes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::InteractionError;
use crate::grading::{
    blank_count, grade_fib, grade_highlight, grade_listen_and_type, grade_match_pair, grade_mcq,
    grade_reorder, grade_slider, grade_swipe, highlight_solution, initial_order, parse_template,
    snap_slider, swipe_direction, tokenize_passage, SwipeDirection, TemplateSegment,
};
use crate::model::{LessonItem, Question, QuestionKind, QuestionType, UnsupportedItem};
use crate::traits::{AnswerCallbacks, AnswerValidator, Recording, ValidationRequest, ValidationVerdict};

const FEEDBACK_CORRECT: &str = "Correct!";
const FEEDBACK_INCORRECT: &str = "Not quite.";
const FEEDBACK_VALIDATING: &str = "Checking your answer…";
const FEEDBACK_VALIDATION_FAILED: &str = "We couldn't check your answer. Please try again.";

// ---------------------------------------------------------------------------
// Interactions
// ---------------------------------------------------------------------------

/// A learner action delivered to a mounted question.
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    /// MCQ: pick an option by key.
    SelectOption(String),
    /// FIB: set the text of the blank at `index` (order of appearance).
    SetBlank { index: usize, text: String },
    /// Highlight: select or deselect a word token.
    ToggleWord(usize),
    /// MatchPair: record `right` as the match for `left`.
    MatchPair { left: String, right: String },
    ClearMatch(String),
    /// ReorderList: move the step at `from` to position `to`.
    MoveStep { from: usize, to: usize },
    /// ReorderList: replace the whole ordering.
    SetOrder(Vec<String>),
    SetSlider(f64),
    /// SwipeCards: a released drag. Commits when past the distance or
    /// velocity threshold.
    Swipe {
        dx: f64,
        velocity_x: f64,
        screen_width: f64,
    },
    /// FreeText, Translation, ListenAndType.
    SetText(String),
    AttachRecording(Recording),
    Submit,
    TryAgain,
    Continue,
}

impl Interaction {
    pub fn name(&self) -> &'static str {
        match self {
            Interaction::SelectOption(_) => "select option",
            Interaction::SetBlank { .. } => "fill blank",
            Interaction::ToggleWord(_) => "toggle word",
            Interaction::MatchPair { .. } => "match pair",
            Interaction::ClearMatch(_) => "clear match",
            Interaction::MoveStep { .. } => "move step",
            Interaction::SetOrder(_) => "set order",
            Interaction::SetSlider(_) => "set slider",
            Interaction::Swipe { .. } => "swipe",
            Interaction::SetText(_) => "type answer",
            Interaction::AttachRecording(_) => "attach recording",
            Interaction::Submit => "submit",
            Interaction::TryAgain => "try again",
            Interaction::Continue => "continue",
        }
    }
}

// ---------------------------------------------------------------------------
// Rendered output
// ---------------------------------------------------------------------------

/// Everything a host shell needs to draw one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedQuestion {
    pub number: usize,
    pub question_type: Option<QuestionType>,
    pub header: String,
    pub body: Body,
    pub controls: Vec<Control>,
    pub answered: bool,
    pub correct: Option<bool>,
    pub validating: bool,
    pub reveal: bool,
    pub feedback: Option<String>,
    pub correct_answer: Option<String>,
}

impl RenderedQuestion {
    pub fn shows_continue(&self) -> bool {
        self.controls.contains(&Control::Continue)
    }

    pub fn shows_try_again(&self) -> bool {
        self.controls.contains(&Control::TryAgain)
    }

    /// `Some(enabled)` when a Submit control is shown.
    pub fn submit_enabled(&self) -> Option<bool> {
        self.controls.iter().find_map(|c| match c {
            Control::Submit { enabled } => Some(*enabled),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "control", rename_all = "snake_case")]
pub enum Control {
    Submit { enabled: bool },
    TryAgain,
    Continue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "body", rename_all = "snake_case")]
pub enum Body {
    Choices {
        options: Vec<ChoiceOption>,
    },
    Blanks {
        segments: Vec<BlankSegment>,
    },
    Words {
        words: Vec<WordChip>,
    },
    Pairs {
        rows: Vec<PairRow>,
        choices: Vec<String>,
    },
    Steps {
        order: Vec<String>,
    },
    Slider {
        min: f64,
        max: f64,
        step: f64,
        value: f64,
        unit: String,
    },
    Card {
        statement: String,
        swiped: Option<SwipeDirection>,
    },
    TextInput {
        source: Option<SourceText>,
        value: String,
    },
    Recorder {
        has_recording: bool,
    },
    Listen {
        speech: Speech,
        value: String,
    },
    Repeat {
        speech: Speech,
    },
    Explanation {
        sections: Vec<Section>,
    },
    Unsupported {
        type_name: Option<String>,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceOption {
    pub key: String,
    pub text: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "segment", rename_all = "snake_case")]
pub enum BlankSegment {
    Text { text: String },
    Input { index: usize, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordChip {
    pub word_index: usize,
    pub text: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairRow {
    pub left: String,
    pub matched: Option<String>,
}

/// The text a translation question asks to translate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceText {
    pub text: String,
    pub from_language: String,
    pub to_language: String,
}

/// Text the host should speak (text-to-speech) or ask the learner to speak.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Speech {
    pub text: String,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub heading: Option<String>,
    pub lines: Vec<String>,
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Selects the view for a lesson item.
#[derive(Clone)]
pub struct Dispatcher {
    validator: Option<Arc<dyn AnswerValidator>>,
}

impl Dispatcher {
    pub fn new(validator: Arc<dyn AnswerValidator>) -> Self {
        Self {
            validator: Some(validator),
        }
    }

    /// No remote validator: remote-graded answers resolve as failed
    /// validations (incorrect, Try Again offered).
    pub fn offline() -> Self {
        Self { validator: None }
    }

    /// Mount a view for `item`.
    ///
    /// Auto-answer variants report correct immediately unless `show_answer`
    /// is set; reveal mode never reports.
    pub fn mount(
        &self,
        item: &LessonItem,
        number: usize,
        show_answer: bool,
        callbacks: &mut dyn AnswerCallbacks,
    ) -> QuestionView {
        let content = match item {
            LessonItem::Question(question) => Content::Question {
                response: if show_answer {
                    Response::revealed(question)
                } else {
                    Response::initial(question)
                },
                question: question.clone(),
            },
            LessonItem::Unsupported(item) => {
                warn!(
                    question = number,
                    type_name = item.type_name().unwrap_or("<missing>"),
                    reason = %item.error,
                    "unsupported lesson item"
                );
                Content::Unsupported(item.clone())
            }
        };

        let mut view = QuestionView {
            number,
            show_answer,
            content,
            status: Status::Open,
            reported: None,
            validator: self.validator.clone(),
        };

        if !show_answer
            && view
                .question_type()
                .is_some_and(QuestionType::is_auto_answer)
        {
            view.report(true, callbacks);
        }
        view
    }
}

// ---------------------------------------------------------------------------
// Question view
// ---------------------------------------------------------------------------

/// A mounted question with its interaction state.
///
/// At most one validation request is in flight per view. Dropping the view
/// aborts it, so a late response never lands on a torn-down view.
pub struct QuestionView {
    number: usize,
    show_answer: bool,
    content: Content,
    status: Status,
    /// The verdict sent through `on_answer`, once reported.
    reported: Option<bool>,
    validator: Option<Arc<dyn AnswerValidator>>,
}

enum Content {
    Question {
        question: Question,
        response: Response,
    },
    Unsupported(UnsupportedItem),
}

/// The learner's current response, one shape per variant family.
#[derive(Debug, Clone, PartialEq)]
enum Response {
    Mcq { selected: Option<String> },
    Fib { inputs: Vec<String> },
    Highlight { selected: BTreeSet<usize> },
    Matches { matches: BTreeMap<String, String> },
    Order { order: Vec<String> },
    Slider { value: f64 },
    Swipe { decided: Option<SwipeDirection> },
    Text { text: String },
    Voice { recording: Option<Recording> },
    Acknowledge,
}

impl Response {
    fn initial(question: &Question) -> Self {
        match &question.kind {
            QuestionKind::Mcq(_) => Response::Mcq { selected: None },
            QuestionKind::Fib(fib) => {
                let template = question.prompt.question.as_deref().unwrap_or_default();
                let blanks = match blank_count(template) {
                    0 => fib.correct_answers.len(),
                    n => n,
                };
                Response::Fib {
                    inputs: vec![String::new(); blanks],
                }
            }
            QuestionKind::Highlight(_) => Response::Highlight {
                selected: BTreeSet::new(),
            },
            QuestionKind::MatchPair(_) => Response::Matches {
                matches: BTreeMap::new(),
            },
            QuestionKind::ReorderList(r) => Response::Order {
                order: initial_order(&r.steps),
            },
            QuestionKind::SliderEstimate(s) => Response::Slider {
                value: snap_slider(s, s.min_value + (s.max_value - s.min_value) / 2.0),
            },
            QuestionKind::SwipeCards(_) => Response::Swipe { decided: None },
            QuestionKind::FreeText(_)
            | QuestionKind::Translation(_)
            | QuestionKind::ListenAndType(_) => Response::Text {
                text: String::new(),
            },
            QuestionKind::VoiceAnswer(_) => Response::Voice { recording: None },
            QuestionKind::SpeakAndRepeat(_)
            | QuestionKind::FeynmanWhy(_)
            | QuestionKind::MiniMindmap(_)
            | QuestionKind::Derivation(_)
            | QuestionKind::AnalogyCard(_)
            | QuestionKind::SpacedRecap(_) => Response::Acknowledge,
        }
    }

    /// The response a fully correct learner would have given.
    fn revealed(question: &Question) -> Self {
        match &question.kind {
            QuestionKind::Mcq(mcq) => Response::Mcq {
                selected: Some(mcq.answer.clone()),
            },
            QuestionKind::Fib(fib) => Response::Fib {
                inputs: fib.correct_answers.clone(),
            },
            QuestionKind::Highlight(h) => Response::Highlight {
                selected: highlight_solution(h),
            },
            QuestionKind::MatchPair(m) => Response::Matches {
                matches: m
                    .pairs
                    .iter()
                    .map(|p| (p.left.clone(), p.right.clone()))
                    .collect(),
            },
            QuestionKind::ReorderList(r) => Response::Order {
                order: r.steps.clone(),
            },
            QuestionKind::SliderEstimate(s) => Response::Slider {
                value: s.correct_value,
            },
            QuestionKind::SwipeCards(card) => Response::Swipe {
                decided: Some(SwipeDirection::from_answer(card.answer)),
            },
            QuestionKind::ListenAndType(l) => Response::Text {
                text: l.text.clone(),
            },
            QuestionKind::FreeText(f) => Response::Text {
                text: f.sample_answer.clone().unwrap_or_default(),
            },
            QuestionKind::Translation(t) => Response::Text {
                text: t.reference_translation.clone().unwrap_or_default(),
            },
            QuestionKind::VoiceAnswer(_) => Response::Voice { recording: None },
            _ => Response::Acknowledge,
        }
    }
}

enum Status {
    Open,
    Validating(InFlight),
    Graded {
        correct: bool,
        feedback: Option<String>,
    },
    /// The validation request failed; reported as incorrect, retry allowed.
    Failed,
}

struct InFlight {
    handle: JoinHandle<anyhow::Result<ValidationVerdict>>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

enum Submission {
    Local(bool),
    Remote(ValidationRequest),
}

impl QuestionView {
    pub fn number(&self) -> usize {
        self.number
    }

    pub fn question_type(&self) -> Option<QuestionType> {
        match &self.content {
            Content::Question { question, .. } => Some(question.question_type()),
            Content::Unsupported(_) => None,
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self.content, Content::Question { .. })
    }

    pub fn is_validating(&self) -> bool {
        matches!(self.status, Status::Validating(_))
    }

    /// True once the response has resolved, or on mount for auto-answer
    /// variants.
    pub fn is_answered(&self) -> bool {
        match self.status {
            Status::Graded { .. } | Status::Failed => true,
            Status::Open => self.reported.is_some(),
            Status::Validating(_) => false,
        }
    }

    /// The verdict currently shown to the learner.
    pub fn is_correct(&self) -> Option<bool> {
        match self.status {
            Status::Graded { correct, .. } => Some(correct),
            Status::Failed => Some(false),
            Status::Open => self.reported,
            Status::Validating(_) => None,
        }
    }

    pub fn can_continue(&self) -> bool {
        self.is_supported()
            && !self.is_validating()
            && (self.show_answer
                || self.reported.is_some()
                || matches!(self.status, Status::Graded { .. } | Status::Failed))
    }

    pub fn can_retry(&self) -> bool {
        matches!(self.status, Status::Failed)
    }

    /// Apply one learner interaction.
    pub fn apply(
        &mut self,
        interaction: Interaction,
        callbacks: &mut dyn AnswerCallbacks,
    ) -> Result<(), InteractionError> {
        if !self.is_supported() {
            return Err(InteractionError::Unsupported);
        }
        match interaction {
            Interaction::Continue => self.advance(callbacks),
            Interaction::TryAgain => self.retry(),
            Interaction::Submit => {
                self.ensure_open()?;
                self.submit(callbacks)
            }
            Interaction::Swipe {
                dx,
                velocity_x,
                screen_width,
            } => {
                self.ensure_open()?;
                self.swipe(dx, velocity_x, screen_width, callbacks)
            }
            other => {
                self.ensure_open()?;
                self.edit(other)
            }
        }
    }

    /// Wait for the in-flight validation, if any, and apply its verdict.
    ///
    /// Returns `false` when nothing was pending.
    pub async fn settle(&mut self, callbacks: &mut dyn AnswerCallbacks) -> bool {
        let Status::Validating(flight) = &mut self.status else {
            return false;
        };
        let result = (&mut flight.handle).await;

        match result {
            Ok(Ok(verdict)) => {
                debug!(question = self.number, correct = verdict.correct, "answer validated");
                let correct = verdict.correct;
                self.status = Status::Graded {
                    correct,
                    feedback: verdict.feedback,
                };
                self.report(correct, callbacks);
            }
            Ok(Err(e)) => {
                warn!(question = self.number, "answer validation failed: {e:#}");
                self.status = Status::Failed;
                self.report(false, callbacks);
            }
            Err(e) => {
                warn!(question = self.number, "answer validation task ended: {e}");
                self.status = Status::Failed;
                self.report(false, callbacks);
            }
        }
        true
    }

    fn ensure_open(&self) -> Result<(), InteractionError> {
        if self.show_answer {
            return Err(InteractionError::InputLocked);
        }
        match self.status {
            Status::Open => Ok(()),
            Status::Validating(_) => Err(InteractionError::ValidationPending),
            Status::Graded { .. } | Status::Failed => Err(InteractionError::InputLocked),
        }
    }

    fn report(&mut self, correct: bool, callbacks: &mut dyn AnswerCallbacks) {
        if self.show_answer || self.reported.is_some() {
            return;
        }
        self.reported = Some(correct);
        debug!(question = self.number, correct, "answer reported");
        callbacks.on_answer(correct);
    }

    fn advance(&mut self, callbacks: &mut dyn AnswerCallbacks) -> Result<(), InteractionError> {
        if self.is_validating() {
            return Err(InteractionError::ValidationPending);
        }
        if !self.can_continue() {
            return Err(InteractionError::NotAnswered);
        }
        callbacks.on_next();
        Ok(())
    }

    fn retry(&mut self) -> Result<(), InteractionError> {
        if !self.can_retry() {
            return Err(InteractionError::NothingToRetry);
        }
        debug!(question = self.number, "retrying after failed validation");
        self.status = Status::Open;
        Ok(())
    }

    fn edit(&mut self, interaction: Interaction) -> Result<(), InteractionError> {
        let Content::Question { question, response } = &mut self.content else {
            return Err(InteractionError::Unsupported);
        };
        let kind = question.question_type();

        match (&question.kind, response, interaction) {
            (QuestionKind::Mcq(mcq), Response::Mcq { selected }, Interaction::SelectOption(key)) => {
                if !mcq.options.contains_key(&key) {
                    return Err(InteractionError::UnknownOption(key));
                }
                *selected = Some(key);
            }
            (_, Response::Fib { inputs }, Interaction::SetBlank { index, text }) => {
                let count = inputs.len();
                let slot = inputs
                    .get_mut(index)
                    .ok_or(InteractionError::BlankOutOfRange { index, count })?;
                *slot = text;
            }
            (QuestionKind::Highlight(h), Response::Highlight { selected }, Interaction::ToggleWord(i)) => {
                if i >= tokenize_passage(&h.text).len() {
                    return Err(InteractionError::WordOutOfRange(i));
                }
                if !selected.remove(&i) {
                    selected.insert(i);
                }
            }
            (
                QuestionKind::MatchPair(m),
                Response::Matches { matches },
                Interaction::MatchPair { left, right },
            ) => {
                if !m.pairs.iter().any(|p| p.left == left) {
                    return Err(InteractionError::UnknownPairItem(left));
                }
                if !m.pairs.iter().any(|p| p.right == right) {
                    return Err(InteractionError::UnknownPairItem(right));
                }
                matches.insert(left, right);
            }
            (_, Response::Matches { matches }, Interaction::ClearMatch(left)) => {
                matches.remove(&left);
            }
            (_, Response::Order { order }, Interaction::MoveStep { from, to }) => {
                if from >= order.len() || to >= order.len() {
                    return Err(InteractionError::InvalidOrder(order.len()));
                }
                let step = order.remove(from);
                order.insert(to, step);
            }
            (QuestionKind::ReorderList(r), Response::Order { order }, Interaction::SetOrder(new)) => {
                let mut wanted = r.steps.clone();
                let mut given = new.clone();
                wanted.sort();
                given.sort();
                if wanted != given {
                    return Err(InteractionError::InvalidOrder(r.steps.len()));
                }
                *order = new;
            }
            (QuestionKind::SliderEstimate(s), Response::Slider { value }, Interaction::SetSlider(v)) => {
                if !v.is_finite() {
                    return Err(InteractionError::InvalidSliderValue);
                }
                *value = snap_slider(s, v);
            }
            (_, Response::Text { text }, Interaction::SetText(t)) => {
                *text = t;
            }
            (_, Response::Voice { recording }, Interaction::AttachRecording(r)) => {
                *recording = Some(r);
            }
            (_, _, interaction) => {
                return Err(InteractionError::NotApplicable {
                    interaction: interaction.name(),
                    kind,
                });
            }
        }
        Ok(())
    }

    fn swipe(
        &mut self,
        dx: f64,
        velocity_x: f64,
        screen_width: f64,
        callbacks: &mut dyn AnswerCallbacks,
    ) -> Result<(), InteractionError> {
        let Content::Question { question, response } = &mut self.content else {
            return Err(InteractionError::Unsupported);
        };
        let kind = question.question_type();
        let (QuestionKind::SwipeCards(card), Response::Swipe { decided }) =
            (&question.kind, response)
        else {
            return Err(InteractionError::NotApplicable {
                interaction: "swipe",
                kind,
            });
        };

        let Some(direction) = swipe_direction(dx, velocity_x, screen_width) else {
            debug!(question = self.number, dx, velocity_x, "swipe below threshold");
            return Ok(());
        };
        *decided = Some(direction);
        let correct = grade_swipe(card.answer, direction);

        self.status = Status::Graded {
            correct,
            feedback: None,
        };
        self.report(correct, callbacks);
        Ok(())
    }

    fn submit(&mut self, callbacks: &mut dyn AnswerCallbacks) -> Result<(), InteractionError> {
        let Content::Question { question, response } = &self.content else {
            return Err(InteractionError::Unsupported);
        };
        let kind = question.question_type();
        let prompt_question = || {
            question
                .prompt
                .question
                .clone()
                .unwrap_or_else(|| question.header())
        };

        let submission = match (&question.kind, response) {
            (QuestionKind::Mcq(mcq), Response::Mcq { selected }) => {
                let key = selected.as_deref().ok_or(InteractionError::NothingSelected)?;
                Submission::Local(grade_mcq(mcq, key))
            }
            (QuestionKind::Fib(fib), Response::Fib { inputs }) => {
                Submission::Local(grade_fib(&fib.correct_answers, inputs))
            }
            (QuestionKind::Highlight(h), Response::Highlight { selected }) => {
                Submission::Local(grade_highlight(h, selected))
            }
            (QuestionKind::MatchPair(m), Response::Matches { matches }) => {
                Submission::Local(grade_match_pair(m, matches))
            }
            (QuestionKind::ReorderList(r), Response::Order { order }) => {
                Submission::Local(grade_reorder(r, order))
            }
            (QuestionKind::SliderEstimate(s), Response::Slider { value }) => {
                Submission::Local(grade_slider(s, *value))
            }
            (QuestionKind::ListenAndType(l), Response::Text { text }) => {
                if text.trim().is_empty() {
                    return Err(InteractionError::EmptyAnswer);
                }
                Submission::Local(grade_listen_and_type(&l.text, text))
            }
            (QuestionKind::SpeakAndRepeat(_), _) => Submission::Local(true),
            (QuestionKind::FreeText(_), Response::Text { text }) => {
                if text.trim().is_empty() {
                    return Err(InteractionError::EmptyAnswer);
                }
                Submission::Remote(ValidationRequest::FreeText {
                    question: prompt_question(),
                    answer: text.trim().to_string(),
                })
            }
            (QuestionKind::Translation(t), Response::Text { text }) => {
                if text.trim().is_empty() {
                    return Err(InteractionError::EmptyAnswer);
                }
                Submission::Remote(ValidationRequest::Translation {
                    text: t.text.clone(),
                    translation: text.trim().to_string(),
                    from_language: t.from_language.clone(),
                    to_language: t.to_language.clone(),
                })
            }
            (QuestionKind::VoiceAnswer(_), Response::Voice { recording }) => {
                let recording = recording.clone().ok_or(InteractionError::MissingRecording)?;
                Submission::Remote(ValidationRequest::VoiceAnswer {
                    question: prompt_question(),
                    recording,
                })
            }
            _ => {
                return Err(InteractionError::NotApplicable {
                    interaction: "submit",
                    kind,
                })
            }
        };

        match submission {
            Submission::Local(correct) => {
                self.status = Status::Graded {
                    correct,
                    feedback: None,
                };
                self.report(correct, callbacks);
            }
            Submission::Remote(request) => self.start_validation(request, callbacks),
        }
        Ok(())
    }

    fn start_validation(&mut self, request: ValidationRequest, callbacks: &mut dyn AnswerCallbacks) {
        let Some(validator) = self.validator.clone() else {
            warn!(question = self.number, "no answer validator configured");
            self.status = Status::Failed;
            self.report(false, callbacks);
            return;
        };
        debug!(
            question = self.number,
            kind = %request.question_type(),
            validator = validator.name(),
            "validating answer"
        );
        let handle = tokio::spawn(async move { validator.validate(&request).await });
        self.status = Status::Validating(InFlight { handle });
    }

    /// Render the current state.
    pub fn render(&self) -> RenderedQuestion {
        match &self.content {
            Content::Unsupported(item) => RenderedQuestion {
                number: self.number,
                question_type: None,
                header: "Unsupported question".to_string(),
                body: Body::Unsupported {
                    type_name: item.type_name().map(str::to_string),
                    reason: item.error.to_string(),
                },
                controls: Vec::new(),
                answered: false,
                correct: None,
                validating: false,
                reveal: self.show_answer,
                feedback: Some(format!(
                    "This question type ({}) is not supported yet.",
                    item.type_name().unwrap_or("unknown")
                )),
                correct_answer: None,
            },
            Content::Question { question, response } => {
                let graded_wrong = matches!(self.status, Status::Graded { correct: false, .. });
                RenderedQuestion {
                    number: self.number,
                    question_type: Some(question.question_type()),
                    header: question.header(),
                    body: render_body(question, response),
                    controls: self.controls(question, response),
                    answered: !self.show_answer && self.is_answered(),
                    correct: if self.show_answer {
                        None
                    } else {
                        self.is_correct()
                    },
                    validating: self.is_validating(),
                    reveal: self.show_answer,
                    feedback: self.feedback(),
                    correct_answer: if self.show_answer || graded_wrong {
                        describe_answer(question)
                    } else {
                        None
                    },
                }
            }
        }
    }

    fn controls(&self, question: &Question, response: &Response) -> Vec<Control> {
        let kind = question.question_type();
        if self.show_answer || kind.is_explanation() {
            return vec![Control::Continue];
        }
        match self.status {
            Status::Validating(_) => vec![Control::Submit { enabled: false }],
            Status::Graded { .. } => vec![Control::Continue],
            Status::Failed => vec![Control::TryAgain, Control::Continue],
            Status::Open if kind == QuestionType::SwipeCards => Vec::new(),
            Status::Open => {
                let mut controls = vec![Control::Submit {
                    enabled: submit_ready(response),
                }];
                if self.reported.is_some() {
                    controls.push(Control::Continue);
                }
                controls
            }
        }
    }

    fn feedback(&self) -> Option<String> {
        if self.show_answer {
            return None;
        }
        match &self.status {
            Status::Open => None,
            Status::Validating(_) => Some(FEEDBACK_VALIDATING.to_string()),
            Status::Graded { correct, feedback } => Some(feedback.clone().unwrap_or_else(|| {
                if *correct {
                    FEEDBACK_CORRECT.to_string()
                } else {
                    FEEDBACK_INCORRECT.to_string()
                }
            })),
            Status::Failed => Some(FEEDBACK_VALIDATION_FAILED.to_string()),
        }
    }
}

fn submit_ready(response: &Response) -> bool {
    match response {
        Response::Mcq { selected } => selected.is_some(),
        Response::Text { text } => !text.trim().is_empty(),
        Response::Voice { recording } => recording.is_some(),
        Response::Swipe { .. } => false,
        _ => true,
    }
}

fn render_body(question: &Question, response: &Response) -> Body {
    match (&question.kind, response) {
        (QuestionKind::Mcq(mcq), Response::Mcq { selected }) => Body::Choices {
            options: mcq
                .options
                .iter()
                .map(|(key, text)| ChoiceOption {
                    key: key.clone(),
                    text: text.clone(),
                    selected: selected.as_deref() == Some(key.as_str()),
                })
                .collect(),
        },
        (QuestionKind::Fib(_), Response::Fib { inputs }) => {
            let template = question.prompt.question.as_deref().unwrap_or_default();
            let mut segments: Vec<BlankSegment> = parse_template(template)
                .into_iter()
                .map(|s| match s {
                    TemplateSegment::Text { text } => BlankSegment::Text { text },
                    TemplateSegment::Blank { index, .. } => BlankSegment::Input {
                        index,
                        value: inputs.get(index).cloned().unwrap_or_default(),
                    },
                })
                .collect();
            if blank_count(template) == 0 {
                segments.extend(inputs.iter().enumerate().map(|(index, value)| {
                    BlankSegment::Input {
                        index,
                        value: value.clone(),
                    }
                }));
            }
            Body::Blanks { segments }
        }
        (QuestionKind::Highlight(h), Response::Highlight { selected }) => Body::Words {
            words: tokenize_passage(&h.text)
                .into_iter()
                .map(|t| WordChip {
                    selected: selected.contains(&t.word_index),
                    word_index: t.word_index,
                    text: t.text,
                })
                .collect(),
        },
        (QuestionKind::MatchPair(m), Response::Matches { matches }) => {
            let mut choices: Vec<String> = m.pairs.iter().map(|p| p.right.clone()).collect();
            choices.sort();
            choices.dedup();
            Body::Pairs {
                rows: m
                    .pairs
                    .iter()
                    .map(|p| PairRow {
                        left: p.left.clone(),
                        matched: matches.get(&p.left).cloned(),
                    })
                    .collect(),
                choices,
            }
        }
        (QuestionKind::ReorderList(_), Response::Order { order }) => Body::Steps {
            order: order.clone(),
        },
        (QuestionKind::SliderEstimate(s), Response::Slider { value }) => Body::Slider {
            min: s.min_value,
            max: s.max_value,
            step: s.step_size,
            value: *value,
            unit: s.unit.clone(),
        },
        (QuestionKind::SwipeCards(_), Response::Swipe { decided }) => Body::Card {
            statement: question.prompt.statement.clone().unwrap_or_default(),
            swiped: *decided,
        },
        (QuestionKind::Translation(t), Response::Text { text }) => Body::TextInput {
            source: Some(SourceText {
                text: t.text.clone(),
                from_language: t.from_language.clone(),
                to_language: t.to_language.clone(),
            }),
            value: text.clone(),
        },
        (QuestionKind::ListenAndType(l), Response::Text { text }) => Body::Listen {
            speech: Speech {
                text: l.text.clone(),
                language: l.language.clone(),
            },
            value: text.clone(),
        },
        (_, Response::Text { text }) => Body::TextInput {
            source: None,
            value: text.clone(),
        },
        (_, Response::Voice { recording }) => Body::Recorder {
            has_recording: recording.is_some(),
        },
        (QuestionKind::SpeakAndRepeat(s), _) => Body::Repeat {
            speech: Speech {
                text: s.text.clone(),
                language: s.language.clone(),
            },
        },
        (kind, _) => Body::Explanation {
            sections: explanation_sections(kind),
        },
    }
}

fn section(heading: Option<&str>, lines: Vec<String>) -> Option<Section> {
    let heading = heading.map(str::trim).filter(|h| !h.is_empty());
    let lines: Vec<String> = lines.into_iter().filter(|l| !l.trim().is_empty()).collect();
    if heading.is_none() && lines.is_empty() {
        return None;
    }
    Some(Section {
        heading: heading.map(str::to_string),
        lines,
    })
}

fn explanation_sections(kind: &QuestionKind) -> Vec<Section> {
    let sections: Vec<Option<Section>> = match kind {
        QuestionKind::FeynmanWhy(f) => vec![
            section(None, vec![f.explanation.clone()]),
            section(
                (!f.why_points.is_empty()).then_some("Why"),
                f.why_points.clone(),
            ),
        ],
        QuestionKind::MiniMindmap(m) => std::iter::once(section(Some(m.center.as_str()), Vec::new()))
            .chain(
                m.branches
                    .iter()
                    .map(|b| section(Some(b.label.as_str()), b.children.clone())),
            )
            .collect(),
        QuestionKind::Derivation(d) => vec![
            section(
                None,
                d.steps
                    .iter()
                    .enumerate()
                    .map(|(i, s)| format!("{}. {s}", i + 1))
                    .collect(),
            ),
            section(
                d.result.as_ref().map(|_| "Result"),
                d.result.iter().cloned().collect(),
            ),
        ],
        QuestionKind::AnalogyCard(a) => vec![
            section(Some(a.concept.as_str()), vec![a.analogy.clone()]),
            section(None, vec![a.explanation.clone()]),
        ],
        QuestionKind::SpacedRecap(r) => vec![section(None, r.points.clone())],
        _ => Vec::new(),
    };
    sections.into_iter().flatten().collect()
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

/// The correct answer as shown inline in reveal mode or after a wrong answer.
pub fn describe_answer(question: &Question) -> Option<String> {
    match &question.kind {
        QuestionKind::Mcq(mcq) => Some(match mcq.options.get(&mcq.answer) {
            Some(text) => format!("{}. {text}", mcq.answer),
            None => mcq.answer.clone(),
        }),
        QuestionKind::Fib(fib) => Some(fib.correct_answers.join(", ")),
        QuestionKind::Highlight(h) => Some(h.answer.join(", ")),
        QuestionKind::MatchPair(m) => Some(
            m.pairs
                .iter()
                .map(|p| format!("{} → {}", p.left, p.right))
                .collect::<Vec<_>>()
                .join("; "),
        ),
        QuestionKind::ReorderList(r) => Some(r.steps.join(" → ")),
        QuestionKind::SliderEstimate(s) => Some(
            format!("{} {}", format_number(s.correct_value), s.unit)
                .trim_end()
                .to_string(),
        ),
        QuestionKind::SwipeCards(card) => Some(if card.answer { "True" } else { "False" }.to_string()),
        QuestionKind::ListenAndType(l) => Some(l.text.clone()),
        QuestionKind::Translation(t) => t.reference_translation.clone(),
        QuestionKind::FreeText(f) => f.sample_answer.clone(),
        QuestionKind::VoiceAnswer(v) => v.sample_answer.clone(),
        QuestionKind::SpeakAndRepeat(_)
        | QuestionKind::FeynmanWhy(_)
        | QuestionKind::MiniMindmap(_)
        | QuestionKind::Derivation(_)
        | QuestionKind::AnalogyCard(_)
        | QuestionKind::SpacedRecap(_) => None,
    }
}
