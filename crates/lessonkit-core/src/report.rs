//! Lesson run reports with JSON persistence.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::QuestionType;
use crate::session::SessionSummary;

/// The record of one pass through a lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonReport {
    /// Unique run identifier.
    pub id: Uuid,
    pub lesson_id: String,
    pub lesson_title: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// How the run ended.
    pub status: RunStatus,
    /// One entry per reported answer, in display order.
    pub outcomes: Vec<QuestionOutcome>,
    pub summary: SessionSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every item was shown and the learner continued past the last one.
    Completed,
    /// An unsupported item stopped progression.
    Blocked {
        question_number: usize,
        reason: String,
    },
    /// The learner left before the end.
    Abandoned { question_number: usize },
}

impl RunStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }

    pub fn label(&self) -> String {
        match self {
            RunStatus::Completed => "completed".to_string(),
            RunStatus::Blocked {
                question_number, ..
            } => format!("blocked at question {question_number}"),
            RunStatus::Abandoned { question_number } => {
                format!("abandoned at question {question_number}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    /// 1-based display number.
    pub number: usize,
    pub question_type: QuestionType,
    pub correct: bool,
}

impl LessonReport {
    /// Save the report as pretty-printed JSON, creating parent directories.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: LessonReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Outcomes the learner got wrong.
    pub fn missed(&self) -> impl Iterator<Item = &QuestionOutcome> {
        self.outcomes.iter().filter(|o| !o.correct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_report(status: RunStatus, answers: &[(QuestionType, bool)]) -> LessonReport {
        let outcomes: Vec<QuestionOutcome> = answers
            .iter()
            .enumerate()
            .map(|(i, &(question_type, correct))| QuestionOutcome {
                number: i + 1,
                question_type,
                correct,
            })
            .collect();
        let flags: Vec<bool> = outcomes.iter().map(|o| o.correct).collect();
        let now = Utc::now();
        LessonReport {
            id: Uuid::nil(),
            lesson_id: "geo-101".into(),
            lesson_title: "Capitals".into(),
            started_at: now - chrono::Duration::seconds(90),
            finished_at: now,
            status,
            outcomes,
            summary: SessionSummary::from_outcomes(&flags),
        }
    }

    #[test]
    fn json_roundtrip() {
        let report = make_report(
            RunStatus::Blocked {
                question_number: 3,
                reason: "unsupported question type: hologram".into(),
            },
            &[(QuestionType::Mcq, true), (QuestionType::Fib, false)],
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/run.json");

        report.save_json(&path).unwrap();
        let loaded = LessonReport::load_json(&path).unwrap();

        assert_eq!(loaded, report);
        assert_eq!(loaded.status.label(), "blocked at question 3");
    }

    #[test]
    fn status_is_tagged() {
        let json = serde_json::to_value(RunStatus::Abandoned { question_number: 2 }).unwrap();
        assert_eq!(json["status"], "abandoned");
        assert_eq!(json["question_number"], 2);
    }

    #[test]
    fn missed_and_duration() {
        let report = make_report(
            RunStatus::Completed,
            &[
                (QuestionType::Mcq, true),
                (QuestionType::SliderEstimate, false),
                (QuestionType::Translation, false),
            ],
        );
        let missed: Vec<usize> = report.missed().map(|o| o.number).collect();
        assert_eq!(missed, vec![2, 3]);
        assert_eq!(report.duration().num_seconds(), 90);
        assert!(report.status.is_completed());
    }

    #[test]
    fn load_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = LessonReport::load_json(&dir.path().join("nope.json")).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read report"));
    }
}
