//! Trait seams between the question views and their collaborators.
//!
//! `AnswerValidator` is implemented by `lessonkit-client` against the remote
//! AI validation endpoints. `AnswerCallbacks` is the host-shell contract: the
//! two callbacks a question view reports through.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::QuestionType;

// ---------------------------------------------------------------------------
// Remote validation
// ---------------------------------------------------------------------------

/// Trait for backends that judge free-form answers.
#[async_trait]
pub trait AnswerValidator: Send + Sync {
    /// Human-readable validator name (e.g. "http").
    fn name(&self) -> &str;

    /// Judge one answer. Any error is treated as an incorrect answer by the
    /// caller.
    async fn validate(&self, request: &ValidationRequest) -> anyhow::Result<ValidationVerdict>;
}

/// An audio clip attached to a voice answer. Sent as `audio/wav`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Recording {
    pub fn wav(bytes: Vec<u8>) -> Self {
        Self {
            file_name: "answer.wav".to_string(),
            bytes,
        }
    }
}

/// One request to the validation backend.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationRequest {
    FreeText {
        question: String,
        answer: String,
    },
    Translation {
        text: String,
        translation: String,
        from_language: String,
        to_language: String,
    },
    VoiceAnswer {
        question: String,
        recording: Recording,
    },
}

impl ValidationRequest {
    pub fn question_type(&self) -> QuestionType {
        match self {
            ValidationRequest::FreeText { .. } => QuestionType::FreeText,
            ValidationRequest::Translation { .. } => QuestionType::Translation,
            ValidationRequest::VoiceAnswer { .. } => QuestionType::VoiceAnswer,
        }
    }
}

/// Response body of every validation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub correct: bool,
    /// Optional explanation shown inline.
    #[serde(default, alias = "explanation", skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl ValidationVerdict {
    pub fn correct() -> Self {
        Self {
            correct: true,
            feedback: None,
        }
    }

    pub fn incorrect() -> Self {
        Self {
            correct: false,
            feedback: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Host callbacks
// ---------------------------------------------------------------------------

/// The two callbacks a question view reports through.
pub trait AnswerCallbacks {
    /// Called at most once per mounted question, when the response resolves.
    fn on_answer(&mut self, is_correct: bool);

    /// Called when the learner taps Continue.
    fn on_next(&mut self);
}

/// Adapts a pair of closures to [`AnswerCallbacks`].
pub struct Callbacks<A, N> {
    pub on_answer: A,
    pub on_next: N,
}

impl<A, N> AnswerCallbacks for Callbacks<A, N>
where
    A: FnMut(bool),
    N: FnMut(),
{
    fn on_answer(&mut self, is_correct: bool) {
        (self.on_answer)(is_correct)
    }

    fn on_next(&mut self) {
        (self.on_next)()
    }
}

/// Records callback invocations; used by the runner between host inputs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordedCallbacks {
    pub answers: Vec<bool>,
    pub next_count: u32,
}

impl AnswerCallbacks for RecordedCallbacks {
    fn on_answer(&mut self, is_correct: bool) {
        self.answers.push(is_correct);
    }

    fn on_next(&mut self) {
        self.next_count += 1;
    }
}
