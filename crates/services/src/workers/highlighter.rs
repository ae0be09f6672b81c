use std::time::Duration;

use tokio::time::{self, Instant};

use super::{MIN_PERIOD, WorkerContext};
use crate::presenter::PresenterCommand;

/// Blink the indicator of `stage` while it is the current stage.
///
/// One highlighter per stage is started with the session. It waits for its
/// stage, alternates visible/invisible every `half_period`, and hides the
/// indicator the moment the stage is left or its window has elapsed.
pub async fn run_stage_highlighter(ctx: WorkerContext, stage: usize, half_period: Duration) {
    let Some(window) = ctx.plan.stage_window(stage) else {
        return;
    };
    let half_period = half_period.max(MIN_PERIOD);
    let leaves_at = ctx.deadline(window.end);
    let mut stages = ctx.cell.subscribe();

    let reached = tokio::select! {
        biased;
        () = ctx.cancel.cancelled() => return,
        reached = stages.wait_for(|current| *current >= stage) => reached.map(|current| *current),
    };
    match reached {
        Ok(current) if current == stage => {}
        _ => return,
    }

    let mut visible = true;
    loop {
        if ctx.is_cancelled() || ctx.cell.current() != stage || Instant::now() >= leaves_at {
            break;
        }
        ctx.sink.send(PresenterCommand::Highlight { stage, visible });

        let left = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => return,
            _ = stages.wait_for(|current| *current != stage) => true,
            () = time::sleep(half_period) => false,
        };
        if left {
            break;
        }
        visible = !visible;
    }

    ctx.sink.send(PresenterCommand::Highlight {
        stage,
        visible: false,
    });
}
