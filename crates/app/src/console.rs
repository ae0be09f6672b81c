use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use services::{PipelineError, PipelineSelector, Presenter, PresenterError};
use stage_core::model::{DetectorModel, FeedbackKind, SessionResult, StageScore};

const BAR_WIDTH: usize = 20;

/// Renders a session as plain text lines.
pub struct ConsolePresenter<W> {
    out: Mutex<W>,
}

impl ConsolePresenter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsolePresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, text: &str, newline: bool) -> Result<(), PresenterError> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let written = if newline {
            writeln!(out, "{text}")
        } else {
            write!(out, "{text}")
        };
        written
            .and_then(|()| out.flush())
            .map_err(|err| PresenterError::Rejected(err.to_string()))
    }
}

fn progress_bar(fraction: f64) -> String {
    let fraction = fraction.clamp(0.0, 1.0);
    // Truncation is intended: a cell only fills once it is complete.
    let filled = (fraction * BAR_WIDTH as f64) as usize;
    format!(
        "[{}{}] {:>3.0}%",
        "#".repeat(filled),
        ".".repeat(BAR_WIDTH - filled),
        fraction * 100.0
    )
}

impl<W: Write + Send> Presenter for ConsolePresenter<W> {
    fn show_feedback(&self, kind: FeedbackKind) -> Result<(), PresenterError> {
        self.write(&format!("  {kind}"), true)
    }

    fn set_stage_highlight(&self, stage: usize, visible: bool) -> Result<(), PresenterError> {
        log::trace!("stage {} indicator visible={visible}", stage + 1);
        Ok(())
    }

    fn set_progress_fill(&self, stage: usize, fraction: f64) -> Result<(), PresenterError> {
        let line = format!("\rstage {} {}", stage + 1, progress_bar(fraction));
        self.write(&line, fraction >= 1.0)
    }

    fn reveal_score(&self, stage: usize, score: StageScore) -> Result<(), PresenterError> {
        self.write(&format!("stage {} score: {score}", stage + 1), true)
    }

    fn show_loading(&self) -> Result<(), PresenterError> {
        self.write("Analyzing...", true)
    }

    fn show_final_result(&self, result: &SessionResult) -> Result<(), PresenterError> {
        self.write(&result.to_string(), true)
    }

    fn mark_current_stage(&self, stage: Option<usize>) -> Result<(), PresenterError> {
        match stage {
            Some(stage) => self.write(&format!("== stage {} ==", stage + 1), true),
            None => Ok(()),
        }
    }
}

/// Stand-in for the camera pipeline: logs what would be attached.
///
/// Only the models offered in the live-session picker have a processor.
#[derive(Debug, Default)]
pub struct LoggingSelector;

#[async_trait]
impl PipelineSelector for LoggingSelector {
    async fn select(&self, model: DetectorModel) -> Result<(), PipelineError> {
        if !DetectorModel::LIVE_SESSION.contains(&model) {
            return Err(PipelineError::ProcessorUnavailable {
                model,
                reason: "not offered in the live session".to_string(),
            });
        }
        log::info!("Using {model} processor");
        Ok(())
    }

    async fn release(&self) {
        log::info!("camera released");
    }
}
