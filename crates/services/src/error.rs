//! Shared error types for the services crate.

use thiserror::Error;

use stage_core::model::{ConfigError, DetectorModel, PlanError};

/// Errors emitted by a `Presenter` when a render call cannot be delivered.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PresenterError {
    #[error("presentation surface is unavailable")]
    Unavailable,
    #[error("presentation surface rejected {0}")]
    Rejected(String),
}

/// Errors emitted by a `PipelineSelector`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PipelineError {
    #[error("can not create image processor for {model}: {reason}")]
    ProcessorUnavailable {
        model: DetectorModel,
        reason: String,
    },
    #[error("camera source is not available")]
    CameraUnavailable,
}

/// Errors emitted by the stage controller and the live-session host.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("invalid session plan: {0}")]
    InvalidPlan(#[from] PlanError),
    #[error("invalid session config: {0}")]
    InvalidConfig(ConfigError),
    #[error("a session is already running")]
    AlreadyRunning,
    #[error("presenter unavailable: {0}")]
    PresenterUnavailable(#[source] PresenterError),
    #[error("no async runtime is available to run the session")]
    NoRuntime,
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl From<ConfigError> for SessionError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Plan(plan) => SessionError::InvalidPlan(plan),
            other => SessionError::InvalidConfig(other),
        }
    }
}

impl From<PresenterError> for SessionError {
    fn from(err: PresenterError) -> Self {
        SessionError::PresenterUnavailable(err)
    }
}
