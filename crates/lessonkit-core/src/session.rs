//! Session aggregation: per-question outcomes to the completion summary.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered outcomes for one pass through a lesson.
///
/// Created when a lesson starts. [`SessionOutcomes::finish`] consumes it, so
/// a restarted lesson always starts from a fresh session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOutcomes {
    outcomes: Vec<bool>,
}

impl SessionOutcomes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, is_correct: bool) {
        self.outcomes.push(is_correct);
    }

    pub fn outcomes(&self) -> &[bool] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary::from_outcomes(&self.outcomes)
    }

    pub fn finish(self) -> SessionSummary {
        self.summary()
    }
}

impl FromIterator<bool> for SessionOutcomes {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self {
            outcomes: iter.into_iter().collect(),
        }
    }
}

/// Performance tier shown on the completion screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTier {
    KeepPracticing,
    GoodJob,
    Excellent,
    Outstanding,
}

impl PerformanceTier {
    pub fn from_percentage(percentage: u32) -> Self {
        match percentage {
            90.. => PerformanceTier::Outstanding,
            80..=89 => PerformanceTier::Excellent,
            70..=79 => PerformanceTier::GoodJob,
            _ => PerformanceTier::KeepPracticing,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            PerformanceTier::Outstanding => "Outstanding!",
            PerformanceTier::Excellent => "Excellent!",
            PerformanceTier::GoodJob => "Good job!",
            PerformanceTier::KeepPracticing => "Keep practicing!",
        }
    }
}

impl fmt::Display for PerformanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub correct: u32,
    pub total: u32,
    /// Whole-number percentage, rounded half up.
    pub percentage: u32,
    pub tier: PerformanceTier,
}

impl SessionSummary {
    pub fn from_outcomes(outcomes: &[bool]) -> Self {
        let total = u32::try_from(outcomes.len()).unwrap_or(u32::MAX);
        let correct = u32::try_from(outcomes.iter().filter(|&&c| c).count()).unwrap_or(u32::MAX);
        let percentage = round_half_up_percentage(correct, total);
        Self {
            correct,
            total,
            percentage,
            tier: PerformanceTier::from_percentage(percentage),
        }
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}, {}%, {}",
            self.correct, self.total, self.percentage, self.tier
        )
    }
}

/// `correct * 100 / total` rounded half up; 0 for an empty session.
fn round_half_up_percentage(correct: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let (correct, total) = (u64::from(correct), u64::from(total));
    ((correct * 200 + total) / (2 * total)) as u32
}
