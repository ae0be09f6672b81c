use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::SessionId;

//
// ─── STAGE SCORE ───────────────────────────────────────────────────────────────
//

/// Score revealed once a stage's fill animation completes, in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StageScore(u32);

impl StageScore {
    pub const MAX: u32 = 100;

    /// Creates a score, clamped to `0..=100`.
    #[must_use]
    pub fn new(value: u32) -> Self {
        Self(value.min(Self::MAX))
    }

    /// Percentage of hits among the feedback events recorded for a stage.
    ///
    /// A stage with no events scores zero.
    #[must_use]
    pub fn from_tally(hits: u32, misses: u32) -> Self {
        let total = u64::from(hits) + u64::from(misses);
        if total == 0 {
            return Self(0);
        }
        let scaled = (u64::from(hits) * u64::from(Self::MAX) + total / 2) / total;
        Self::new(u32::try_from(scaled).unwrap_or(Self::MAX))
    }

    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for StageScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//
// ─── SESSION RESULT ────────────────────────────────────────────────────────────
//

/// Aggregate outcome produced once, when the analysis window ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    session_id: SessionId,
    stage_scores: Vec<StageScore>,
    total_score: u32,
    outcome: String,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
}

impl SessionResult {
    /// Build the result from every stage score; the total is their rounded mean.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        stage_scores: Vec<StageScore>,
        outcome: impl Into<String>,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let total_score = mean_score(&stage_scores);
        Self {
            session_id,
            stage_scores,
            total_score,
            outcome: outcome.into(),
            started_at,
            completed_at,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn stage_scores(&self) -> &[StageScore] {
        &self.stage_scores
    }

    #[must_use]
    pub fn total_score(&self) -> u32 {
        self.total_score
    }

    #[must_use]
    pub fn outcome(&self) -> &str {
        &self.outcome
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }
}

impl fmt::Display for SessionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\nTotal score: {}", self.outcome, self.total_score)
    }
}

fn mean_score(scores: &[StageScore]) -> u32 {
    if scores.is_empty() {
        return 0;
    }
    let count = scores.len() as u64;
    let sum: u64 = scores.iter().map(|s| u64::from(s.value())).sum();
    u32::try_from((sum + count / 2) / count).unwrap_or(StageScore::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn tally_rounds_to_nearest_percent() {
        assert_eq!(StageScore::from_tally(0, 0).value(), 0);
        assert_eq!(StageScore::from_tally(5, 0).value(), 100);
        assert_eq!(StageScore::from_tally(2, 1).value(), 67);
        assert_eq!(StageScore::from_tally(1, 2).value(), 33);
        assert_eq!(StageScore::new(250).value(), 100);
    }

    #[test]
    fn result_total_is_mean_of_stages() {
        let scores = vec![StageScore::new(80), StageScore::new(100), StageScore::new(75)];
        let result = SessionResult::new(
            SessionId::new(),
            scores,
            "Great job!",
            fixed_now(),
            fixed_now(),
        );

        assert_eq!(result.total_score(), 85);
        assert_eq!(result.to_string(), "Great job!\nTotal score: 85");
    }

    #[test]
    fn empty_result_scores_zero() {
        let result = SessionResult::new(SessionId::new(), Vec::new(), "x", fixed_now(), fixed_now());
        assert_eq!(result.total_score(), 0);
    }

    #[test]
    fn result_serializes_with_timestamps() {
        let result = SessionResult::new(
            SessionId::new(),
            vec![StageScore::new(40), StageScore::new(60)],
            "Great job!",
            fixed_now(),
            fixed_now(),
        );
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("2023-11-14T22:13:20Z"));

        let back: SessionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
