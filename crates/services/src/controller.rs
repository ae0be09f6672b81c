use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use stage_core::Clock;
use stage_core::model::{SessionId, SessionPlan, SessionResult, SessionTuning};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;
use crate::presenter::{ApplyContext, Presenter, wait_closed};
use crate::scoreboard::Scoreboard;
use crate::stage_cell::StageCell;
use crate::workers::{
    FeedbackTicker, SessionFinish, WorkerContext, run_feedback_ticker, run_progress_filler,
    run_stage_advancer, run_stage_highlighter,
};

//
// ─── PHASE ─────────────────────────────────────────────────────────────────────
//

/// Observable lifecycle of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No session, or the last one was stopped.
    Idle,
    Running { stage: usize },
    /// Every stage is done; the last stage is being scored.
    Analyzing,
    /// The result was shown and every worker has finished.
    Complete,
    /// `stop` was requested and workers are still winding down.
    Stopping,
}

impl SessionPhase {
    /// True while a session still owns the presenter.
    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(
            self,
            SessionPhase::Running { .. } | SessionPhase::Analyzing | SessionPhase::Stopping
        )
    }
}

//
// ─── ACTIVE SESSION ────────────────────────────────────────────────────────────
//

struct ActiveSession {
    id: SessionId,
    cell: Arc<StageCell>,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
    apply: ApplyContext,
    result: Arc<OnceLock<SessionResult>>,
}

impl ActiveSession {
    fn phase(&self) -> SessionPhase {
        if self.apply.is_closed() {
            return if self.result.get().is_some() {
                SessionPhase::Complete
            } else {
                SessionPhase::Idle
            };
        }
        if self.cancel.is_cancelled() {
            return SessionPhase::Stopping;
        }
        let stage = self.cell.current();
        if stage < self.cell.stage_count() {
            SessionPhase::Running { stage }
        } else {
            SessionPhase::Analyzing
        }
    }
}

//
// ─── CONTROLLER ────────────────────────────────────────────────────────────────
//

/// Runs one staged session at a time against a `Presenter`.
///
/// `start` spawns the stage advancer, the feedback ticker, one highlighter per
/// stage and the progress filler on the current Tokio runtime, all anchored to
/// the same start instant. `stop` cancels them together.
pub struct StageController {
    tuning: SessionTuning,
    clock: Clock,
    session: Mutex<Option<ActiveSession>>,
}

impl StageController {
    #[must_use]
    pub fn new(tuning: SessionTuning) -> Self {
        Self {
            tuning,
            clock: Clock::system(),
            session: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn tuning(&self) -> &SessionTuning {
        &self.tuning
    }

    /// Start a session and return immediately; it progresses on its own schedule.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidConfig` for out-of-range tuning,
    /// `SessionError::AlreadyRunning` while a previous session is live,
    /// and `SessionError::NoRuntime` outside a Tokio runtime.
    pub fn start(
        &self,
        plan: SessionPlan,
        presenter: Arc<dyn Presenter>,
    ) -> Result<SessionId, SessionError> {
        self.tuning.validate()?;
        let runtime = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;

        let mut slot = self.lock();
        if slot.as_ref().is_some_and(|active| active.phase().is_live()) {
            return Err(SessionError::AlreadyRunning);
        }

        let id = SessionId::new();
        let count = plan.stage_count();
        let cancel = CancellationToken::new();
        let (cell, writer) = StageCell::new(count);
        let (sink, apply) = ApplyContext::spawn(&runtime, presenter, cancel.clone());
        let ctx = WorkerContext {
            plan,
            cell: Arc::clone(&cell),
            sink,
            cancel: cancel.clone(),
            started_at: Instant::now(),
        };

        let scoreboard = Arc::new(Scoreboard::new(count));
        let result = Arc::new(OnceLock::new());
        let (completed_tx, completed_rx) = mpsc::unbounded_channel();

        let mut workers = Vec::with_capacity(count + 3);
        workers.push(runtime.spawn(run_stage_advancer(ctx.clone(), writer, completed_tx)));
        workers.push(runtime.spawn(run_feedback_ticker(
            ctx.clone(),
            FeedbackTicker::new(
                self.tuning.feedback_period,
                self.tuning.hit_probability,
                self.tuning.feedback_seed,
                Arc::clone(&scoreboard),
            ),
        )));
        for stage in 0..count {
            workers.push(runtime.spawn(run_stage_highlighter(
                ctx.clone(),
                stage,
                self.tuning.blink_half_period,
            )));
        }
        let finish = SessionFinish {
            session_id: id,
            clock: self.clock,
            started_at: self.clock.now(),
            outcome_text: self.tuning.outcome_text.clone(),
            scoreboard,
            fill_steps: self.tuning.fill_steps,
            result: Arc::clone(&result),
        };
        workers.push(runtime.spawn(async move {
            let _ = run_progress_filler(ctx, completed_rx, finish).await;
        }));

        log::info!(
            "session {id} started: {count} stages, timeline {:?}",
            plan.total_duration()
        );

        *slot = Some(ActiveSession {
            id,
            cell,
            cancel,
            workers,
            apply,
            result,
        });
        Ok(id)
    }

    /// Cancel every worker of the current session and wait for them to finish.
    ///
    /// Idempotent. Once this returns, the presenter receives no further calls
    /// from the session.
    pub async fn stop(&self) {
        let (id, workers, join, closed) = {
            let mut slot = self.lock();
            let Some(active) = slot.as_mut() else {
                return;
            };
            active.cancel.cancel();
            (
                active.id,
                std::mem::take(&mut active.workers),
                active.apply.take_join(),
                active.apply.closed(),
            )
        };

        for worker in workers {
            if let Err(err) = worker.await {
                if err.is_panic() {
                    log::error!("session {id}: worker panicked: {err}");
                }
            }
        }
        if let Some(join) = join {
            match join.await {
                Ok(stats) => log::info!(
                    "session {id} stopped ({} presenter calls applied, {} rejected)",
                    stats.applied,
                    stats.rejected
                ),
                Err(err) => log::error!("session {id}: apply context failed: {err}"),
            }
        }
        wait_closed(closed).await;
    }

    /// Wait until the current session completes or is stopped.
    ///
    /// Returns the result if the session ran to completion.
    pub async fn wait(&self) -> Option<SessionResult> {
        let (closed, result) = {
            let slot = self.lock();
            let active = slot.as_ref()?;
            (active.apply.closed(), Arc::clone(&active.result))
        };
        wait_closed(closed).await;
        result.get().cloned()
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.lock()
            .as_ref()
            .map_or(SessionPhase::Idle, ActiveSession::phase)
    }

    /// Current stage of the latest session, `stage_count` once all stages are done.
    #[must_use]
    pub fn current_stage(&self) -> Option<usize> {
        self.lock().as_ref().map(|active| active.cell.current())
    }

    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.lock().as_ref().map(|active| active.id)
    }

    /// Result of the latest session, once it was produced.
    #[must_use]
    pub fn result(&self) -> Option<SessionResult> {
        self.lock()
            .as_ref()
            .and_then(|active| active.result.get().cloned())
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for StageController {
    fn drop(&mut self) {
        if let Some(active) = self.lock().as_ref() {
            active.cancel.cancel();
        }
    }
}
