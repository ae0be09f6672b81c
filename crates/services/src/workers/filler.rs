use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use stage_core::Clock;
use stage_core::model::{SessionId, SessionResult, StageScore};
use tokio::sync::mpsc;

use super::{CompletedStage, WorkerContext};
use crate::presenter::PresenterCommand;
use crate::scoreboard::Scoreboard;

/// Everything the filler needs to produce the `SessionResult`.
#[derive(Debug, Clone)]
pub struct SessionFinish {
    pub session_id: SessionId,
    pub clock: Clock,
    pub started_at: DateTime<Utc>,
    pub outcome_text: String,
    pub scoreboard: Arc<Scoreboard>,
    pub fill_steps: u32,
    /// Written exactly once, after the final result was queued.
    pub result: Arc<OnceLock<SessionResult>>,
}

/// Fraction shown at `step` of `steps`. The last step is exactly `1.0`.
#[must_use]
pub fn fill_fraction(step: u32, steps: u32) -> f64 {
    if step + 1 >= steps {
        1.0
    } else {
        f64::from(step) / f64::from(steps)
    }
}

/// Offset of `step` within `total` split into `steps` equal parts.
fn step_offset(total: Duration, step: u32, steps: u32) -> Duration {
    let nanos = total.as_nanos() * u128::from(step) / u128::from(steps.max(1));
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Animate the progress bar of each completed stage, then reveal its score.
///
/// Stages are filled one after another, each across the analysis window that
/// starts at the stage's end. After the last stage's score is revealed the
/// session result is published.
pub async fn run_progress_filler(
    ctx: WorkerContext,
    mut completed: mpsc::UnboundedReceiver<CompletedStage>,
    finish: SessionFinish,
) -> Option<SessionResult> {
    let count = ctx.plan.stage_count();
    let mut scores = Vec::with_capacity(count);

    loop {
        let done = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => return None,
            next = completed.recv() => next?,
        };

        if !fill_stage(&ctx, done, finish.fill_steps).await {
            return None;
        }

        let score = finish.scoreboard.score(done.stage);
        if !ctx.sink.send(PresenterCommand::RevealScore {
            stage: done.stage,
            score,
        }) {
            return None;
        }
        log::debug!("stage {} scored {score}", done.stage);
        scores.push(score);

        if done.stage + 1 >= count {
            return publish_result(&ctx, &finish, scores);
        }
    }
}

async fn fill_stage(ctx: &WorkerContext, done: CompletedStage, steps: u32) -> bool {
    let analysis = ctx.plan.analysis_duration();
    for step in 0..steps {
        if !ctx
            .sleep_until(done.ended_at + step_offset(analysis, step, steps))
            .await
        {
            return false;
        }
        let fraction = fill_fraction(step, steps);
        if !ctx.sink.send(PresenterCommand::Fill {
            stage: done.stage,
            fraction,
        }) {
            return false;
        }
    }
    ctx.sleep_until(done.ended_at + analysis).await
}

fn publish_result(
    ctx: &WorkerContext,
    finish: &SessionFinish,
    scores: Vec<StageScore>,
) -> Option<SessionResult> {
    let result = SessionResult::new(
        finish.session_id,
        scores,
        finish.outcome_text.clone(),
        finish.started_at,
        finish.clock.now(),
    );
    if !ctx.sink.send(PresenterCommand::FinalResult(result.clone())) {
        return None;
    }
    log::info!(
        "session {} complete: total score {}",
        finish.session_id,
        result.total_score()
    );
    let _ = finish.result.set(result.clone());
    Some(result)
}
