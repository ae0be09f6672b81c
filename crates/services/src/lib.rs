#![forbid(unsafe_code)]

pub mod controller;
pub mod error;
pub mod live_session;
pub mod pipeline;
pub mod presenter;
pub mod scoreboard;
pub mod stage_cell;
pub mod workers;

pub use stage_core::Clock;

pub use controller::{SessionPhase, StageController};
pub use error::{PipelineError, PresenterError, SessionError};
pub use live_session::LiveSession;
pub use pipeline::PipelineSelector;
pub use presenter::{ApplyContext, DispatchStats, Presenter, PresenterCommand, PresenterSink};
pub use scoreboard::Scoreboard;
pub use stage_cell::{StageCell, StageWriter};
