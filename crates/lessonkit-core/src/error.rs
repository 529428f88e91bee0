//! Error types for question parsing and learner interactions.
//!
//! Neither kind of error is fatal to a lesson: a question that fails to parse
//! becomes an unsupported item, and a rejected interaction is shown inline.

use thiserror::Error;

use crate::model::QuestionType;

/// Why a raw question payload could not become a [`crate::model::Question`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuestionError {
    /// The payload is not a JSON/TOML object.
    #[error("question must be an object")]
    NotAnObject,

    /// The payload has no string `type` field.
    #[error("question has no `type` field")]
    MissingType,

    /// The `type` tag is not one of the known variants.
    #[error("unsupported question type: {0}")]
    UnknownType(String),

    /// The tag is known but required fields are missing or mistyped.
    #[error("malformed `{kind}` question: {message}")]
    Malformed { kind: QuestionType, message: String },
}

/// An interaction the current question view cannot accept.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InteractionError {
    /// Reveal mode is on, or the question has already been graded.
    #[error("input is locked")]
    InputLocked,

    /// The item could not be parsed and only shows a notice.
    #[error("this question type is not supported")]
    Unsupported,

    /// The interaction belongs to another question variant.
    #[error("{interaction} does not apply to {kind} questions")]
    NotApplicable {
        interaction: &'static str,
        kind: QuestionType,
    },

    #[error("unknown option: {0}")]
    UnknownOption(String),

    #[error("no option selected")]
    NothingSelected,

    #[error("blank {index} is out of range ({count} blanks)")]
    BlankOutOfRange { index: usize, count: usize },

    #[error("word {0} is out of range")]
    WordOutOfRange(usize),

    #[error("unknown item: {0}")]
    UnknownPairItem(String),

    #[error("ordering must be a permutation of the {0} steps")]
    InvalidOrder(usize),

    #[error("slider value must be a finite number")]
    InvalidSliderValue,

    #[error("answer is empty")]
    EmptyAnswer,

    #[error("no recording attached")]
    MissingRecording,

    /// Submit (or Continue) while a validation request is in flight.
    #[error("an answer is already being validated")]
    ValidationPending,

    /// Try Again is only offered after a validation failure.
    #[error("nothing to retry")]
    NothingToRetry,

    /// Continue before the question has been resolved.
    #[error("the question has not been answered yet")]
    NotAnswered,
}
