use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlanError {
    #[error("stage count must be >= 1")]
    ZeroStages,

    #[error("stage duration must be > 0")]
    ZeroStageDuration,

    #[error("{field} must not be negative (got {millis} ms)")]
    NegativeDuration { field: &'static str, millis: i64 },
}

//
// ─── WINDOWS ───────────────────────────────────────────────────────────────────
//

/// Half-open interval `[start, end)` measured from session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageWindow {
    pub start: Duration,
    pub end: Duration,
}

impl StageWindow {
    #[must_use]
    pub fn len(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    #[must_use]
    pub fn contains(&self, offset: Duration) -> bool {
        self.start <= offset && offset < self.end
    }
}

//
// ─── PLAN ──────────────────────────────────────────────────────────────────────
//

/// Fixed timing plan for one staged session.
///
/// Stage 0 runs for the full `stage_duration`. Every later stage runs for
/// `stage_duration - analysis_duration` (floored at zero), because the score
/// fill of the previous stage overlaps the start of the next one. The analysis
/// window follows the last stage. Boundaries are computed by multiplication
/// from the session start, so no error accumulates across stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPlan {
    stage_count: usize,
    stage_duration: Duration,
    analysis_duration: Duration,
}

impl SessionPlan {
    /// Build a plan from its three inputs.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::ZeroStages` or `PlanError::ZeroStageDuration` when the
    /// plan could not run a single stage.
    pub fn derive(
        stage_count: usize,
        stage_duration: Duration,
        analysis_duration: Duration,
    ) -> Result<Self, PlanError> {
        if stage_count < 1 {
            return Err(PlanError::ZeroStages);
        }
        if stage_duration.is_zero() {
            return Err(PlanError::ZeroStageDuration);
        }

        Ok(Self {
            stage_count,
            stage_duration,
            analysis_duration,
        })
    }

    /// Build a plan from signed millisecond inputs, as read from configuration.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::NegativeDuration` for negative durations, plus every
    /// error `derive` can return.
    pub fn from_millis(
        stage_count: usize,
        stage_duration_ms: i64,
        analysis_duration_ms: i64,
    ) -> Result<Self, PlanError> {
        let stage_duration = non_negative_millis("stage duration", stage_duration_ms)?;
        let analysis_duration = non_negative_millis("analysis duration", analysis_duration_ms)?;
        Self::derive(stage_count, stage_duration, analysis_duration)
    }

    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stage_count
    }

    #[must_use]
    pub fn stage_duration(&self) -> Duration {
        self.stage_duration
    }

    #[must_use]
    pub fn analysis_duration(&self) -> Duration {
        self.analysis_duration
    }

    /// Offset at which `stage` becomes current. `boundary(stage_count)` is the
    /// start of the analysis window; larger indices clamp to it.
    #[must_use]
    pub fn boundary(&self, stage: usize) -> Duration {
        let stage = stage.min(self.stage_count);
        if stage == 0 {
            return Duration::ZERO;
        }
        let later = u32::try_from(stage - 1).unwrap_or(u32::MAX);
        self.stage_duration
            .saturating_add(self.later_stage_len().saturating_mul(later))
    }

    /// Window during which `stage` is current, or `None` past the last stage.
    #[must_use]
    pub fn stage_window(&self, stage: usize) -> Option<StageWindow> {
        (stage < self.stage_count).then(|| StageWindow {
            start: self.boundary(stage),
            end: self.boundary(stage + 1),
        })
    }

    /// Trailing window in which the last stage is scored.
    #[must_use]
    pub fn analysis_window(&self) -> StageWindow {
        let start = self.boundary(self.stage_count);
        StageWindow {
            start,
            end: start.saturating_add(self.analysis_duration),
        }
    }

    /// Length of the whole session timeline, from stage 0 to the end of analysis.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.analysis_window().end
    }

    /// Configured play time: `stage_count * stage_duration + analysis_duration`.
    ///
    /// This is the nominal budget the plan is described with; the live
    /// timeline (`total_duration`) is shorter whenever `stage_count > 1`
    /// because later stages overlap the previous stage's analysis fill.
    #[must_use]
    pub fn nominal_duration(&self) -> Duration {
        let count = u32::try_from(self.stage_count).unwrap_or(u32::MAX);
        self.stage_duration
            .saturating_mul(count)
            .saturating_add(self.analysis_duration)
    }

    /// Every stage window in order, followed by nothing else.
    pub fn windows(&self) -> impl Iterator<Item = StageWindow> + '_ {
        (0..self.stage_count).filter_map(|stage| self.stage_window(stage))
    }

    /// Stage that is current at `offset`, or `None` once the analysis window began.
    #[must_use]
    pub fn stage_at(&self, offset: Duration) -> Option<usize> {
        self.windows().position(|window| window.contains(offset))
    }

    fn later_stage_len(&self) -> Duration {
        self.stage_duration.saturating_sub(self.analysis_duration)
    }
}

fn non_negative_millis(field: &'static str, millis: i64) -> Result<Duration, PlanError> {
    u64::try_from(millis)
        .map(Duration::from_millis)
        .map_err(|_| PlanError::NegativeDuration { field, millis })
}
