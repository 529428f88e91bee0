//! Sequential lesson runner.
//!
//! Mounts each item through the [`Dispatcher`], feeds it interactions from a
//! [`LessonHost`], waits on in-flight validation, and advances when the view
//! reports `on_next`. Reported answers are aggregated into a
//! [`LessonReport`].

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::InteractionError;
use crate::model::{Lesson, LessonItem, QuestionType};
use crate::report::{LessonReport, QuestionOutcome, RunStatus};
use crate::session::SessionOutcomes;
use crate::traits::RecordedCallbacks;
use crate::view::{Dispatcher, Interaction, QuestionView, RenderedQuestion};

/// What the host wants to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum HostInput {
    Interact(Interaction),
    /// Leave the lesson.
    Exit,
}

/// The shell that draws questions and collects learner input.
#[async_trait]
pub trait LessonHost: Send {
    /// Show `view` and wait for the learner's next input.
    async fn next_input(&mut self, view: &RenderedQuestion) -> Result<HostInput>;

    /// An interaction was refused; the view is unchanged.
    fn interaction_rejected(&mut self, _view: &RenderedQuestion, _error: &InteractionError) {}

    /// A validation request is in flight for `view`.
    fn validating(&mut self, _view: &RenderedQuestion) {}

    /// The lesson cannot continue past `view`.
    fn blocked(&mut self, _view: &RenderedQuestion) {}
}

/// Lesson progress hooks.
pub trait LessonObserver: Send + Sync {
    fn on_question_mounted(&self, number: usize, question_type: Option<QuestionType>);
    fn on_answer_recorded(&self, number: usize, correct: bool);
    fn on_item_unsupported(&self, number: usize, reason: &str);
    fn on_lesson_finished(&self, report: &LessonReport);
}

/// No-op observer.
pub struct NoopObserver;

impl LessonObserver for NoopObserver {
    fn on_question_mounted(&self, _: usize, _: Option<QuestionType>) {}
    fn on_answer_recorded(&self, _: usize, _: bool) {}
    fn on_item_unsupported(&self, _: usize, _: &str) {}
    fn on_lesson_finished(&self, _: &LessonReport) {}
}

pub struct LessonRunner {
    dispatcher: Dispatcher,
    show_answer: bool,
}

/// Answers reported so far in a run.
#[derive(Default)]
struct Tally {
    session: SessionOutcomes,
    outcomes: Vec<QuestionOutcome>,
}

impl Tally {
    fn absorb(
        &mut self,
        view: &QuestionView,
        callbacks: &mut RecordedCallbacks,
        observer: &dyn LessonObserver,
    ) {
        let Some(question_type) = view.question_type() else {
            return;
        };
        for correct in callbacks.answers.drain(..) {
            self.session.record(correct);
            self.outcomes.push(QuestionOutcome {
                number: view.number(),
                question_type,
                correct,
            });
            observer.on_answer_recorded(view.number(), correct);
        }
    }
}

impl LessonRunner {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            show_answer: false,
        }
    }

    /// Run every question in reveal mode.
    pub fn with_show_answer(mut self, show_answer: bool) -> Self {
        self.show_answer = show_answer;
        self
    }

    /// Run `lesson` to completion, a blocking item, or the host leaving.
    ///
    /// Only host errors abort the run.
    pub async fn run(
        &self,
        lesson: &Lesson,
        host: &mut dyn LessonHost,
        observer: &dyn LessonObserver,
    ) -> Result<LessonReport> {
        let started_at = Utc::now();
        let mut tally = Tally::default();
        let mut status = RunStatus::Completed;

        info!(
            lesson = %lesson.id,
            items = lesson.questions.len(),
            reveal = self.show_answer,
            "starting lesson"
        );

        'items: for (index, item) in lesson.questions.iter().enumerate() {
            let number = index + 1;
            let mut callbacks = RecordedCallbacks::default();
            let mut view = self
                .dispatcher
                .mount(item, number, self.show_answer, &mut callbacks);
            observer.on_question_mounted(number, item.question_type());

            if let LessonItem::Unsupported(unsupported) = item {
                let reason = unsupported.error.to_string();
                observer.on_item_unsupported(number, &reason);
                host.blocked(&view.render());
                status = RunStatus::Blocked {
                    question_number: number,
                    reason,
                };
                break;
            }

            loop {
                tally.absorb(&view, &mut callbacks, observer);
                if callbacks.next_count > 0 {
                    continue 'items;
                }

                let rendered = view.render();
                match host.next_input(&rendered).await? {
                    HostInput::Exit => {
                        debug!(question = number, "host left the lesson");
                        status = RunStatus::Abandoned {
                            question_number: number,
                        };
                        break 'items;
                    }
                    HostInput::Interact(interaction) => {
                        let name = interaction.name();
                        if let Err(e) = view.apply(interaction, &mut callbacks) {
                            debug!(question = number, interaction = name, "rejected: {e}");
                            host.interaction_rejected(&rendered, &e);
                        }
                        if view.is_validating() {
                            host.validating(&view.render());
                            view.settle(&mut callbacks).await;
                        }
                    }
                }
            }
        }

        let Tally { session, outcomes } = tally;
        let summary = session.finish();
        let report = LessonReport {
            id: Uuid::new_v4(),
            lesson_id: lesson.id.clone(),
            lesson_title: lesson.title.clone(),
            started_at,
            finished_at: Utc::now(),
            status,
            outcomes,
            summary,
        };

        info!(
            lesson = %lesson.id,
            status = %report.status.label(),
            "lesson finished: {summary}"
        );
        observer.on_lesson_finished(&report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use serde_json::json;

    use crate::session::PerformanceTier;
    use crate::traits::{AnswerValidator, ValidationRequest, ValidationVerdict};

    /// Replays a fixed list of inputs and records what it was shown.
    #[derive(Default)]
    struct ScriptedHost {
        script: VecDeque<HostInput>,
        rejected: Vec<InteractionError>,
        validating: u32,
        blocked: Vec<usize>,
    }

    impl ScriptedHost {
        fn new(script: impl IntoIterator<Item = HostInput>) -> Self {
            Self {
                script: script.into_iter().collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl LessonHost for ScriptedHost {
        async fn next_input(&mut self, view: &RenderedQuestion) -> Result<HostInput> {
            match self.script.pop_front() {
                Some(input) => Ok(input),
                None => anyhow::bail!("script exhausted at question {}", view.number),
            }
        }

        fn interaction_rejected(&mut self, _view: &RenderedQuestion, error: &InteractionError) {
            self.rejected.push(error.clone());
        }

        fn validating(&mut self, _view: &RenderedQuestion) {
            self.validating += 1;
        }

        fn blocked(&mut self, view: &RenderedQuestion) {
            self.blocked.push(view.number);
        }
    }

    #[derive(Default)]
    struct CountingObserver {
        mounted: AtomicU32,
        answered: AtomicU32,
        unsupported: AtomicU32,
        finished: AtomicU32,
    }

    impl LessonObserver for CountingObserver {
        fn on_question_mounted(&self, _: usize, _: Option<QuestionType>) {
            self.mounted.fetch_add(1, Ordering::Relaxed);
        }
        fn on_answer_recorded(&self, _: usize, _: bool) {
            self.answered.fetch_add(1, Ordering::Relaxed);
        }
        fn on_item_unsupported(&self, _: usize, _: &str) {
            self.unsupported.fetch_add(1, Ordering::Relaxed);
        }
        fn on_lesson_finished(&self, _: &LessonReport) {
            self.finished.fetch_add(1, Ordering::Relaxed);
        }
    }

    struct FailingValidator;

    #[async_trait]
    impl AnswerValidator for FailingValidator {
        fn name(&self) -> &str {
            "failing"
        }

        async fn validate(&self, _request: &ValidationRequest) -> Result<ValidationVerdict> {
            anyhow::bail!("HTTP 503")
        }
    }

    fn interact(i: Interaction) -> HostInput {
        HostInput::Interact(i)
    }

    fn lesson(items: serde_json::Value) -> Lesson {
        serde_json::from_value(json!({
            "id": "geo-101",
            "title": "Capitals",
            "questions": items
        }))
        .unwrap()
    }

    fn mixed_lesson() -> Lesson {
        lesson(json!([
            {"type": "MCQ", "question": "Capital of France?",
             "options": {"A": "Berlin", "B": "Paris"}, "answer": "B"},
            {"type": "fib", "question": "{BLANK_1} fell in {BLANK_2}.",
             "correct_answers": ["Rome", "476"]},
            {"type": "reorder_list", "steps": ["Plan", "Build", "Ship"]}
        ]))
    }

    #[tokio::test]
    async fn completes_mixed_lesson() {
        let mut host = ScriptedHost::new([
            interact(Interaction::SelectOption("B".into())),
            interact(Interaction::Submit),
            interact(Interaction::Continue),
            interact(Interaction::SetBlank {
                index: 0,
                text: "Rome".into(),
            }),
            interact(Interaction::SetBlank {
                index: 1,
                text: "1453".into(),
            }),
            interact(Interaction::Submit),
            interact(Interaction::Continue),
            interact(Interaction::Continue),
        ]);
        let observer = CountingObserver::default();

        let report = LessonRunner::new(Dispatcher::offline())
            .run(&mixed_lesson(), &mut host, &observer)
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        let flags: Vec<bool> = report.outcomes.iter().map(|o| o.correct).collect();
        assert_eq!(flags, vec![true, false, true]);
        assert_eq!(report.summary.percentage, 67);
        assert_eq!(report.summary.tier, PerformanceTier::KeepPracticing);
        assert_eq!(report.outcomes[2].question_type, QuestionType::ReorderList);

        assert_eq!(observer.mounted.load(Ordering::Relaxed), 3);
        assert_eq!(observer.answered.load(Ordering::Relaxed), 3);
        assert_eq!(observer.finished.load(Ordering::Relaxed), 1);
        assert!(host.rejected.is_empty());
    }

    #[tokio::test]
    async fn rejected_interactions_reach_the_host() {
        let mut host = ScriptedHost::new([
            interact(Interaction::Continue),
            interact(Interaction::SelectOption("A".into())),
            interact(Interaction::Submit),
            interact(Interaction::Continue),
            HostInput::Exit,
        ]);
        let report = LessonRunner::new(Dispatcher::offline())
            .run(&mixed_lesson(), &mut host, &NoopObserver)
            .await
            .unwrap();

        assert_eq!(host.rejected, vec![InteractionError::NotAnswered]);
        assert_eq!(
            report.status,
            RunStatus::Abandoned { question_number: 2 }
        );
        assert_eq!(report.summary.to_string(), "0/1, 0%, Keep practicing!");
    }

    #[tokio::test]
    async fn unsupported_item_blocks_progression() {
        let lesson = lesson(json!([
            {"type": "spaced_recap", "title": "Recap", "points": ["Paris is in France"]},
            {"type": "hologram", "question": "?"},
            {"type": "spaced_recap", "points": ["never reached"]}
        ]));
        let mut host = ScriptedHost::new([interact(Interaction::Continue)]);
        let observer = CountingObserver::default();

        let report = LessonRunner::new(Dispatcher::offline())
            .run(&lesson, &mut host, &observer)
            .await
            .unwrap();

        match &report.status {
            RunStatus::Blocked {
                question_number,
                reason,
            } => {
                assert_eq!(*question_number, 2);
                assert!(reason.contains("hologram"));
            }
            other => panic!("expected blocked, got {other:?}"),
        }
        assert_eq!(host.blocked, vec![2]);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(observer.unsupported.load(Ordering::Relaxed), 1);
        assert_eq!(observer.mounted.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn failed_validation_keeps_first_verdict() {
        let lesson = lesson(json!([
            {"type": "translation", "text": "Bonjour", "from_language": "fr", "to_language": "en"}
        ]));
        let mut host = ScriptedHost::new([
            interact(Interaction::SetText("Hello".into())),
            interact(Interaction::Submit),
            interact(Interaction::TryAgain),
            interact(Interaction::Submit),
            interact(Interaction::Continue),
        ]);

        let report = LessonRunner::new(Dispatcher::new(Arc::new(FailingValidator)))
            .run(&lesson, &mut host, &NoopObserver)
            .await
            .unwrap();

        assert_eq!(host.validating, 2);
        assert_eq!(report.outcomes.len(), 1);
        assert!(!report.outcomes[0].correct);
        assert!(report.status.is_completed());
    }

    #[tokio::test]
    async fn reveal_mode_records_nothing() {
        let mut host = ScriptedHost::new(std::iter::repeat(interact(Interaction::Continue)).take(3));
        let report = LessonRunner::new(Dispatcher::offline())
            .with_show_answer(true)
            .run(&mixed_lesson(), &mut host, &NoopObserver)
            .await
            .unwrap();

        assert!(report.status.is_completed());
        assert!(report.outcomes.is_empty());
        assert_eq!(report.summary.total, 0);
    }

    #[tokio::test]
    async fn host_errors_abort_the_run() {
        let mut host = ScriptedHost::default();
        let err = LessonRunner::new(Dispatcher::offline())
            .run(&mixed_lesson(), &mut host, &NoopObserver)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("script exhausted"));
    }
}
