use std::sync::atomic::{AtomicU32, Ordering};

use stage_core::model::{FeedbackKind, StageScore};

#[derive(Debug, Default)]
struct Tally {
    hits: AtomicU32,
    misses: AtomicU32,
}

/// Per-stage hit/miss counters, written by the feedback ticker and read by the filler.
#[derive(Debug)]
pub struct Scoreboard {
    stages: Vec<Tally>,
}

impl Scoreboard {
    #[must_use]
    pub fn new(stage_count: usize) -> Self {
        Self {
            stages: (0..stage_count).map(|_| Tally::default()).collect(),
        }
    }

    /// Record one feedback event against `stage`. Out-of-range stages are ignored.
    pub fn record(&self, stage: usize, kind: FeedbackKind) {
        let Some(tally) = self.stages.get(stage) else {
            return;
        };
        let counter = if kind.is_hit() {
            &tally.hits
        } else {
            &tally.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// `(hits, misses)` recorded for `stage`.
    #[must_use]
    pub fn tally(&self, stage: usize) -> (u32, u32) {
        self.stages.get(stage).map_or((0, 0), |tally| {
            (
                tally.hits.load(Ordering::Relaxed),
                tally.misses.load(Ordering::Relaxed),
            )
        })
    }

    #[must_use]
    pub fn score(&self, stage: usize) -> StageScore {
        let (hits, misses) = self.tally(stage);
        StageScore::from_tally(hits, misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_each_stage_independently() {
        let board = Scoreboard::new(2);
        board.record(0, FeedbackKind::Hit);
        board.record(0, FeedbackKind::Hit);
        board.record(0, FeedbackKind::Miss);
        board.record(1, FeedbackKind::Miss);
        board.record(7, FeedbackKind::Hit);

        assert_eq!(board.tally(0), (2, 1));
        assert_eq!(board.score(0).value(), 67);
        assert_eq!(board.score(1).value(), 0);
        assert_eq!(board.tally(7), (0, 0));
    }
}
