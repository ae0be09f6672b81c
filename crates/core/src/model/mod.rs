mod config;
mod detector;
mod feedback;
mod ids;
mod plan;
mod score;

pub use config::{ConfigError, SessionConfig, SessionTuning, ValidatedConfig};
pub use detector::{DetectorModel, ParseModelError};
pub use feedback::FeedbackKind;
pub use ids::SessionId;
pub use plan::{PlanError, SessionPlan, StageWindow};
pub use score::{SessionResult, StageScore};
