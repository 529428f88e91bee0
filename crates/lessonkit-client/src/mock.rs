//! Mock validator for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use lessonkit_core::model::QuestionType;
use lessonkit_core::traits::{AnswerValidator, ValidationRequest, ValidationVerdict};

/// An answer validator that never touches the network.
///
/// Verdicts are configured per question type; unconfigured types get the
/// default verdict, or an error when built with [`MockValidator::failing`].
pub struct MockValidator {
    verdicts: HashMap<QuestionType, ValidationVerdict>,
    default_verdict: Option<ValidationVerdict>,
    failure: String,
    call_count: AtomicU32,
    last_request: Mutex<Option<ValidationRequest>>,
}

impl MockValidator {
    /// A validator that answers every request with `correct`.
    pub fn with_fixed_verdict(correct: bool) -> Self {
        Self {
            verdicts: HashMap::new(),
            default_verdict: Some(ValidationVerdict {
                correct,
                feedback: None,
            }),
            failure: String::new(),
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// A validator whose every request fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            verdicts: HashMap::new(),
            default_verdict: None,
            failure: message.to_string(),
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Override the verdict for one question type.
    pub fn with_verdict(mut self, question_type: QuestionType, verdict: ValidationVerdict) -> Self {
        self.verdicts.insert(question_type, verdict);
        self
    }

    /// Get the number of calls made to this validator.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Get the last request made to this validator.
    pub fn last_request(&self) -> Option<ValidationRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl AnswerValidator for MockValidator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn validate(&self, request: &ValidationRequest) -> anyhow::Result<ValidationVerdict> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self
            .last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(request.clone());

        match self
            .verdicts
            .get(&request.question_type())
            .or(self.default_verdict.as_ref())
        {
            Some(verdict) => Ok(verdict.clone()),
            None => anyhow::bail!("{}", self.failure),
        }
    }
}
