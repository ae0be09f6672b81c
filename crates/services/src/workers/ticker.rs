use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stage_core::model::FeedbackKind;
use tokio::time::Instant;

use super::{MIN_PERIOD, WorkerContext};
use crate::presenter::PresenterCommand;
use crate::scoreboard::Scoreboard;

/// Weighted hit/miss source for the feedback ticker.
#[derive(Debug)]
pub struct FeedbackTicker {
    period: Duration,
    hit_probability: f64,
    rng: StdRng,
    scoreboard: Arc<Scoreboard>,
}

impl FeedbackTicker {
    /// `hit_probability` must already be validated to lie in `[0, 1]`.
    #[must_use]
    pub fn new(
        period: Duration,
        hit_probability: f64,
        seed: Option<u64>,
        scoreboard: Arc<Scoreboard>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        let hit_probability = if hit_probability.is_nan() {
            0.0
        } else {
            hit_probability.clamp(0.0, 1.0)
        };
        Self {
            period: period.max(MIN_PERIOD),
            hit_probability,
            rng,
            scoreboard,
        }
    }

    fn roll(&mut self) -> FeedbackKind {
        if self.rng.random_bool(self.hit_probability) {
            FeedbackKind::Hit
        } else {
            FeedbackKind::Miss
        }
    }
}

/// Emit one hit/miss per period while the session still has a current stage.
///
/// The stage is checked at the top of every period; the ticker also wakes
/// early and exits as soon as the terminal stage is reached. Nothing is emitted
/// at or after the terminal boundary, even if the advancer runs late.
pub async fn run_feedback_ticker(ctx: WorkerContext, mut ticker: FeedbackTicker) {
    let count = ctx.plan.stage_count();
    let terminal_at = ctx.deadline(ctx.plan.boundary(count));
    let mut stages = ctx.cell.subscribe();
    let mut ticks: u32 = 0;

    loop {
        if ctx.is_cancelled() {
            return;
        }
        if ctx.cell.current() >= count || Instant::now() >= terminal_at {
            break;
        }
        // Credit the stage that owns the scheduled tick, not whichever stage
        // the advancer has reached when this task wakes.
        let Some(stage) = ctx.plan.stage_at(ticker.period.saturating_mul(ticks)) else {
            break;
        };

        let kind = ticker.roll();
        ticker.scoreboard.record(stage, kind);
        ctx.sink.send(PresenterCommand::Feedback(kind));
        ticks = ticks.saturating_add(1);

        let next = ctx.deadline(ticker.period.saturating_mul(ticks));
        let finished = tokio::select! {
            slept = ctx.sleep_until(next) => !slept,
            _ = stages.wait_for(|stage| *stage >= count) => true,
        };
        if finished {
            break;
        }
    }

    log::debug!("feedback ticker finished after {ticks} events");
}

#[cfg(test)]
mod tests {
    use super::*;
    use stage_core::model::SessionPlan;
    use tokio_util::sync::CancellationToken;

    use crate::presenter::PresenterSink;
    use crate::stage_cell::StageCell;

    #[test]
    fn probability_extremes_are_deterministic() {
        let board = Arc::new(Scoreboard::new(1));
        let mut always = FeedbackTicker::new(Duration::from_secs(1), 1.0, None, board.clone());
        let mut never = FeedbackTicker::new(Duration::from_secs(1), 0.0, None, board);

        for _ in 0..50 {
            assert_eq!(always.roll(), FeedbackKind::Hit);
            assert_eq!(never.roll(), FeedbackKind::Miss);
        }
    }

    #[test]
    fn seeded_tickers_agree() {
        let board = Arc::new(Scoreboard::new(1));
        let mut a = FeedbackTicker::new(Duration::from_secs(1), 0.7, Some(42), board.clone());
        let mut b = FeedbackTicker::new(Duration::from_secs(1), 0.7, Some(42), board);

        let left: Vec<_> = (0..32).map(|_| a.roll()).collect();
        let right: Vec<_> = (0..32).map(|_| b.roll()).collect();
        assert_eq!(left, right);
    }

    #[tokio::test(start_paused = true)]
    async fn credits_ticks_by_schedule_and_stops_at_terminal_stage() {
        let plan = SessionPlan::derive(3, Duration::from_secs(5), Duration::from_secs(2)).unwrap();
        let cancel = CancellationToken::new();
        let (sink, mut commands) = PresenterSink::channel(cancel.clone());
        let (cell, writer) = StageCell::new(3);
        let board = Arc::new(Scoreboard::new(3));
        let ctx = WorkerContext {
            plan,
            cell,
            sink,
            cancel,
            started_at: Instant::now(),
        };
        let ticker = FeedbackTicker::new(Duration::from_secs(1), 1.0, Some(1), board.clone());
        let task = tokio::spawn(run_feedback_ticker(ctx, ticker));

        // The cell lags behind the 5000 ms boundary on purpose: ticks at 5000
        // and 6000 ms still belong to stage 1.
        tokio::time::sleep(Duration::from_millis(6500)).await;
        writer.advance_to(3);
        task.await.unwrap();

        let mut emitted = 0;
        while let Ok(command) = commands.try_recv() {
            assert_eq!(command, PresenterCommand::Feedback(FeedbackKind::Hit));
            emitted += 1;
        }
        assert_eq!(emitted, 7);
        assert_eq!(board.tally(0), (5, 0));
        assert_eq!(board.tally(1), (2, 0));
        assert_eq!(board.tally(2), (0, 0));
    }
}
