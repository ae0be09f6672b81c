use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use stage_core::Clock;
use stage_core::model::{DetectorModel, SessionConfig, SessionId, ValidatedConfig};
use tokio_util::sync::CancellationToken;

use crate::controller::StageController;
use crate::error::SessionError;
use crate::pipeline::PipelineSelector;
use crate::presenter::Presenter;

/// Host lifecycle: the detection pipeline and the staged session start and
/// stop together.
pub struct LiveSession {
    config: ValidatedConfig,
    selector: Arc<dyn PipelineSelector>,
    presenter: Arc<dyn Presenter>,
    controller: StageController,
    model: Mutex<DetectorModel>,
    /// Set while a `start` waits for its start delay; taken and cancelled by `stop`.
    pending: Mutex<Option<CancellationToken>>,
}

impl LiveSession {
    /// Validate `config` and build the host.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidPlan` or `SessionError::InvalidConfig`.
    pub fn new(
        config: &SessionConfig,
        selector: Arc<dyn PipelineSelector>,
        presenter: Arc<dyn Presenter>,
    ) -> Result<Self, SessionError> {
        let config = config.validate()?;
        Ok(Self {
            controller: StageController::new(config.tuning.clone()),
            model: Mutex::new(config.model),
            pending: Mutex::new(None),
            config,
            selector,
            presenter,
        })
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.controller = self.controller.with_clock(clock);
        self
    }

    #[must_use]
    pub fn controller(&self) -> &StageController {
        &self.controller
    }

    #[must_use]
    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    #[must_use]
    pub fn model(&self) -> DetectorModel {
        *self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switch the detection pipeline. The running session, if any, is unaffected.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Pipeline` if the selector could not attach `model`;
    /// the selection is still remembered for the next start.
    pub async fn select_model(&self, model: DetectorModel) -> Result<(), SessionError> {
        *self.model.lock().unwrap_or_else(PoisonError::into_inner) = model;
        log::info!("Selected model: {model}");
        self.selector.select(model).await?;
        Ok(())
    }

    /// Attach the selected pipeline, wait the configured start delay, then start
    /// the staged session.
    ///
    /// A pipeline failure is logged and does not prevent the session. Returns
    /// `Ok(None)` when `stop` was called before the session began.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyRunning` if a session is live or another
    /// `start` is still waiting.
    pub async fn start(&self) -> Result<Option<SessionId>, SessionError> {
        let cancel = {
            let mut pending = self.pending();
            if pending.is_some() || self.controller.phase().is_live() {
                return Err(SessionError::AlreadyRunning);
            }
            let cancel = CancellationToken::new();
            *pending = Some(cancel.clone());
            cancel
        };

        let model = self.model();
        if let Err(err) = self.selector.select(model).await {
            log::error!("{err}");
        }

        if !self.config.start_delay.is_zero() {
            log::debug!("session starts in {:?}", self.config.start_delay);
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(self.config.start_delay) => {}
            }
        }

        // Held across the check and the start so a concurrent `stop` either
        // prevents the session or sees it.
        let mut pending = self.pending();
        if cancel.is_cancelled() {
            log::info!("session start abandoned: stopped during the start delay");
            return Ok(None);
        }
        // Not cancelled, so `stop` has not taken the slot: it is still ours.
        *pending = None;
        self.controller
            .start(self.config.plan, Arc::clone(&self.presenter))
            .map(Some)
    }

    /// Stop the session, or abandon one still waiting for its start delay,
    /// then release the camera.
    pub async fn stop(&self) {
        if let Some(cancel) = self.pending().take() {
            cancel.cancel();
        }
        self.controller.stop().await;
        self.selector.release().await;
    }

    fn pending(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
