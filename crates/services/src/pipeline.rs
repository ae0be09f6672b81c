use async_trait::async_trait;
use stage_core::model::DetectorModel;

use crate::error::PipelineError;

/// Detection pipeline attached to the camera stream.
///
/// The session core only notifies it when the selected model changes and when
/// the host stops; frame processing itself happens elsewhere.
#[async_trait]
pub trait PipelineSelector: Send + Sync {
    /// Replace the active frame processor with one for `model`.
    async fn select(&self, model: DetectorModel) -> Result<(), PipelineError>;

    /// Stop the camera stream. Default is a no-op.
    async fn release(&self) {}
}
