use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::watch;

/// The shared "current stage" of one session.
///
/// Reads are lock-free. The only way to change the value is through the single
/// `StageWriter` handed out by `StageCell::new`, and the value never decreases.
/// `stage_count` means every stage is complete.
#[derive(Debug)]
pub struct StageCell {
    current: AtomicUsize,
    stage_count: usize,
    changed: watch::Sender<usize>,
}

impl StageCell {
    /// Create a cell at stage 0 together with its only writer.
    #[must_use]
    pub fn new(stage_count: usize) -> (Arc<Self>, StageWriter) {
        let (changed, _) = watch::channel(0);
        let cell = Arc::new(Self {
            current: AtomicUsize::new(0),
            stage_count,
            changed,
        });
        let writer = StageWriter {
            cell: Arc::clone(&cell),
        };
        (cell, writer)
    }

    #[must_use]
    pub fn current(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stage_count
    }

    /// True once every stage has been completed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.current() >= self.stage_count
    }

    /// Subscribe to stage transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.changed.subscribe()
    }
}

/// Sole write handle of a `StageCell`. Not `Clone`.
#[derive(Debug)]
pub struct StageWriter {
    cell: Arc<StageCell>,
}

impl StageWriter {
    /// Move the cell to `stage` and wake every subscriber.
    ///
    /// Returns `false` and leaves the cell untouched when `stage` is behind the
    /// current value or past `stage_count`.
    pub fn advance_to(&self, stage: usize) -> bool {
        let current = self.cell.current();
        if stage < current || stage > self.cell.stage_count {
            log::warn!(
                "refusing stage transition {current} -> {stage} (stage count {})",
                self.cell.stage_count
            );
            return false;
        }
        self.cell.current.store(stage, Ordering::Release);
        self.cell.changed.send_replace(stage);
        true
    }

    #[must_use]
    pub fn cell(&self) -> &Arc<StageCell> {
        &self.cell
    }
}
