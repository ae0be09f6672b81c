//! The timed activities one session runs concurrently.
//!
//! Every worker suspends only at absolute deadlines (or stage transitions) and
//! checks the session's cancellation token before each side effect.

mod advancer;
mod filler;
mod highlighter;
mod ticker;

use std::sync::Arc;
use std::time::Duration;

use stage_core::model::SessionPlan;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::presenter::PresenterSink;
use crate::stage_cell::StageCell;

pub use advancer::{CompletedStage, run_stage_advancer};
pub use filler::{SessionFinish, fill_fraction, run_progress_filler};
pub use highlighter::run_stage_highlighter;
pub use ticker::{FeedbackTicker, run_feedback_ticker};

/// Floor for periodic workers, so a zero period can not spin.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// What every worker of one session shares.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub plan: SessionPlan,
    pub cell: Arc<StageCell>,
    pub sink: PresenterSink,
    pub cancel: CancellationToken,
    /// Anchor for every deadline of the session.
    pub started_at: Instant,
}

impl WorkerContext {
    /// Absolute instant `offset` after session start.
    #[must_use]
    pub fn deadline(&self, offset: Duration) -> Instant {
        self.started_at + offset
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Sleep until `deadline`. Returns `false` if the session was cancelled first.
    pub async fn sleep_until(&self, deadline: Instant) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            () = time::sleep_until(deadline) => !self.cancel.is_cancelled(),
        }
    }
}
