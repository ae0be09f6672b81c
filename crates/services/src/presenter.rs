//! Presenter capability and the single apply context that serializes its calls.

use std::sync::Arc;

use stage_core::model::{FeedbackKind, SessionResult, StageScore};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{PresenterError, SessionError};

//
// ─── CAPABILITY ────────────────────────────────────────────────────────────────
//

/// Rendering surface driven by a session.
///
/// The controller only ever writes to it. Every call is issued from one task at
/// a time, in the order workers produced them.
pub trait Presenter: Send + Sync {
    fn show_feedback(&self, kind: FeedbackKind) -> Result<(), PresenterError>;

    fn set_stage_highlight(&self, stage: usize, visible: bool) -> Result<(), PresenterError>;

    /// `fraction` is in `0.0..=1.0`; the last fill of a stage is exactly `1.0`.
    fn set_progress_fill(&self, stage: usize, fraction: f64) -> Result<(), PresenterError>;

    fn reveal_score(&self, stage: usize, score: StageScore) -> Result<(), PresenterError>;

    fn show_loading(&self) -> Result<(), PresenterError>;

    fn show_final_result(&self, result: &SessionResult) -> Result<(), PresenterError>;

    /// Emphasize the label of the current stage; `None` dims every label.
    fn mark_current_stage(&self, _stage: Option<usize>) -> Result<(), PresenterError> {
        Ok(())
    }
}

//
// ─── COMMANDS ──────────────────────────────────────────────────────────────────
//

/// One deferred Presenter call.
#[derive(Debug, Clone, PartialEq)]
pub enum PresenterCommand {
    Feedback(FeedbackKind),
    Highlight { stage: usize, visible: bool },
    Fill { stage: usize, fraction: f64 },
    RevealScore { stage: usize, score: StageScore },
    MarkCurrentStage(Option<usize>),
    Loading,
    FinalResult(SessionResult),
}

impl PresenterCommand {
    /// Issue this command against `presenter`.
    ///
    /// # Errors
    ///
    /// Returns whatever the presenter returned.
    pub fn apply(&self, presenter: &dyn Presenter) -> Result<(), PresenterError> {
        match self {
            PresenterCommand::Feedback(kind) => presenter.show_feedback(*kind),
            PresenterCommand::Highlight { stage, visible } => {
                presenter.set_stage_highlight(*stage, *visible)
            }
            PresenterCommand::Fill { stage, fraction } => {
                presenter.set_progress_fill(*stage, *fraction)
            }
            PresenterCommand::RevealScore { stage, score } => {
                presenter.reveal_score(*stage, *score)
            }
            PresenterCommand::MarkCurrentStage(stage) => presenter.mark_current_stage(*stage),
            PresenterCommand::Loading => presenter.show_loading(),
            PresenterCommand::FinalResult(result) => presenter.show_final_result(result),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            PresenterCommand::Feedback(_) => "show_feedback",
            PresenterCommand::Highlight { .. } => "set_stage_highlight",
            PresenterCommand::Fill { .. } => "set_progress_fill",
            PresenterCommand::RevealScore { .. } => "reveal_score",
            PresenterCommand::MarkCurrentStage(_) => "mark_current_stage",
            PresenterCommand::Loading => "show_loading",
            PresenterCommand::FinalResult(_) => "show_final_result",
        }
    }
}

//
// ─── SINK ──────────────────────────────────────────────────────────────────────
//

/// Worker-side handle for queueing Presenter calls.
///
/// Cancellation is checked before anything is queued, so a call is either
/// fully queued or never started.
#[derive(Debug, Clone)]
pub struct PresenterSink {
    tx: mpsc::UnboundedSender<PresenterCommand>,
    cancel: CancellationToken,
}

impl PresenterSink {
    /// Create a sink and the receiving end an apply context drains.
    #[must_use]
    pub fn channel(cancel: CancellationToken) -> (Self, mpsc::UnboundedReceiver<PresenterCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, cancel }, rx)
    }

    /// Queue `command`. Returns `false` if the session was cancelled or the
    /// apply context is gone.
    pub fn send(&self, command: PresenterCommand) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.tx.send(command).is_ok()
    }
}

//
// ─── APPLY CONTEXT ─────────────────────────────────────────────────────────────
//

/// Counters reported by the apply context when it shuts down.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub applied: u64,
    pub rejected: u64,
}

/// Handle on the task that owns the Presenter for one session.
#[derive(Debug)]
pub struct ApplyContext {
    join: Option<JoinHandle<DispatchStats>>,
    closed: watch::Receiver<bool>,
}

impl ApplyContext {
    /// Spawn the apply context on `runtime`. It runs until every sink is dropped
    /// or `cancel` fires, whichever comes first.
    pub fn spawn(
        runtime: &tokio::runtime::Handle,
        presenter: Arc<dyn Presenter>,
        cancel: CancellationToken,
    ) -> (PresenterSink, Self) {
        let (sink, rx) = PresenterSink::channel(cancel.clone());
        let (closed_tx, closed) = watch::channel(false);
        let join = runtime.spawn(apply_loop(presenter, rx, cancel, closed_tx));
        (
            sink,
            Self {
                join: Some(join),
                closed,
            },
        )
    }

    /// Subscribe to shutdown; the value turns `true` after the last Presenter call.
    #[must_use]
    pub fn closed(&self) -> watch::Receiver<bool> {
        self.closed.clone()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
            || self.closed.has_changed().is_err()
            || self.join.as_ref().is_some_and(JoinHandle::is_finished)
    }

    /// Take the join handle; only the first caller receives it.
    pub fn take_join(&mut self) -> Option<JoinHandle<DispatchStats>> {
        self.join.take()
    }
}

/// Wait until the apply context behind `closed` has issued its last call.
pub async fn wait_closed(mut closed: watch::Receiver<bool>) {
    // A dropped sender means the apply task is gone as well.
    let _ = closed.wait_for(|done| *done).await;
}

async fn apply_loop(
    presenter: Arc<dyn Presenter>,
    mut rx: mpsc::UnboundedReceiver<PresenterCommand>,
    cancel: CancellationToken,
    closed: watch::Sender<bool>,
) -> DispatchStats {
    let mut stats = DispatchStats::default();
    loop {
        let command = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            command = rx.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        match command.apply(presenter.as_ref()) {
            Ok(()) => stats.applied += 1,
            Err(err) => {
                stats.rejected += 1;
                log::warn!("{} failed: {}", command.name(), SessionError::from(err));
            }
        }
    }
    rx.close();
    closed.send_replace(true);
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Log {
        calls: Mutex<Vec<&'static str>>,
        fail_loading: bool,
    }

    impl Log {
        fn push(&self, name: &'static str) -> Result<(), PresenterError> {
            self.calls.lock().unwrap().push(name);
            Ok(())
        }
    }

    impl Presenter for Log {
        fn show_feedback(&self, _kind: FeedbackKind) -> Result<(), PresenterError> {
            self.push("feedback")
        }
        fn set_stage_highlight(&self, _stage: usize, _visible: bool) -> Result<(), PresenterError> {
            self.push("highlight")
        }
        fn set_progress_fill(&self, _stage: usize, _fraction: f64) -> Result<(), PresenterError> {
            self.push("fill")
        }
        fn reveal_score(&self, _stage: usize, _score: StageScore) -> Result<(), PresenterError> {
            self.push("score")
        }
        fn show_loading(&self) -> Result<(), PresenterError> {
            if self.fail_loading {
                return Err(PresenterError::Unavailable);
            }
            self.push("loading")
        }
        fn show_final_result(&self, _result: &SessionResult) -> Result<(), PresenterError> {
            self.push("final")
        }
    }

    #[tokio::test]
    async fn applies_in_order_and_survives_rejections() {
        let presenter = Arc::new(Log {
            fail_loading: true,
            ..Log::default()
        });
        let cancel = CancellationToken::new();
        let (sink, mut ctx) =
            ApplyContext::spawn(&tokio::runtime::Handle::current(), presenter.clone(), cancel);

        assert!(sink.send(PresenterCommand::Feedback(FeedbackKind::Hit)));
        assert!(sink.send(PresenterCommand::Loading));
        assert!(sink.send(PresenterCommand::Fill { stage: 0, fraction: 1.0 }));
        drop(sink);

        let stats = ctx.take_join().unwrap().await.unwrap();
        assert_eq!(stats, DispatchStats { applied: 2, rejected: 1 });
        assert_eq!(*presenter.calls.lock().unwrap(), vec!["feedback", "fill"]);
        assert!(ctx.is_closed());
    }

    #[tokio::test]
    async fn cancelled_sink_queues_nothing() {
        let presenter = Arc::new(Log::default());
        let cancel = CancellationToken::new();
        let (sink, ctx) = ApplyContext::spawn(
            &tokio::runtime::Handle::current(),
            presenter.clone(),
            cancel.clone(),
        );

        cancel.cancel();
        assert!(!sink.send(PresenterCommand::Loading));
        wait_closed(ctx.closed()).await;
        assert!(presenter.calls.lock().unwrap().is_empty());
    }
}
