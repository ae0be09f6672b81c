#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use services::{Presenter, PresenterCommand, PresenterError};
use stage_core::model::{FeedbackKind, SessionPlan, SessionResult, StageScore};
use tokio::time::Instant;

pub fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

pub fn reference_plan() -> SessionPlan {
    SessionPlan::derive(3, ms(5000), ms(2000)).unwrap()
}

/// Records every call with its offset from creation on the (paused) Tokio clock.
pub struct RecordingPresenter {
    origin: Instant,
    calls: Mutex<Vec<(Duration, PresenterCommand)>>,
    reject: fn(&PresenterCommand) -> bool,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::rejecting(|_| false)
    }

    /// Calls matching `reject` are recorded, then fail with `Unavailable`.
    pub fn rejecting(reject: fn(&PresenterCommand) -> bool) -> Self {
        Self {
            origin: Instant::now(),
            calls: Mutex::new(Vec::new()),
            reject,
        }
    }

    pub fn calls(&self) -> Vec<(Duration, PresenterCommand)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn times_of(&self, wanted: impl Fn(&PresenterCommand) -> bool) -> Vec<Duration> {
        self.calls()
            .into_iter()
            .filter(|(_, command)| wanted(command))
            .map(|(at, _)| at)
            .collect()
    }

    fn record(&self, command: PresenterCommand) -> Result<(), PresenterError> {
        let rejected = (self.reject)(&command);
        self.calls
            .lock()
            .unwrap()
            .push((Instant::now() - self.origin, command));
        if rejected {
            Err(PresenterError::Unavailable)
        } else {
            Ok(())
        }
    }
}

impl Presenter for RecordingPresenter {
    fn show_feedback(&self, kind: FeedbackKind) -> Result<(), PresenterError> {
        self.record(PresenterCommand::Feedback(kind))
    }

    fn set_stage_highlight(&self, stage: usize, visible: bool) -> Result<(), PresenterError> {
        self.record(PresenterCommand::Highlight { stage, visible })
    }

    fn set_progress_fill(&self, stage: usize, fraction: f64) -> Result<(), PresenterError> {
        self.record(PresenterCommand::Fill { stage, fraction })
    }

    fn reveal_score(&self, stage: usize, score: StageScore) -> Result<(), PresenterError> {
        self.record(PresenterCommand::RevealScore { stage, score })
    }

    fn show_loading(&self) -> Result<(), PresenterError> {
        self.record(PresenterCommand::Loading)
    }

    fn show_final_result(&self, result: &SessionResult) -> Result<(), PresenterError> {
        self.record(PresenterCommand::FinalResult(result.clone()))
    }

    fn mark_current_stage(&self, stage: Option<usize>) -> Result<(), PresenterError> {
        self.record(PresenterCommand::MarkCurrentStage(stage))
    }
}
