use tokio::sync::mpsc;
use tokio::time::Instant;

use super::WorkerContext;
use crate::presenter::PresenterCommand;
use crate::stage_cell::StageWriter;

/// A stage whose window just closed, handed to the progress filler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedStage {
    pub stage: usize,
    pub ended_at: Instant,
}

/// Sole writer of the current stage.
///
/// Sets stage `i` at `started_at + plan.boundary(i)` for every `i` in
/// `0..=stage_count`, so a late wake-up never shifts later boundaries. On the
/// terminal stage it clears every highlight and shows the loading state.
pub async fn run_stage_advancer(
    ctx: WorkerContext,
    writer: StageWriter,
    completed: mpsc::UnboundedSender<CompletedStage>,
) {
    let count = ctx.plan.stage_count();

    for stage in 0..=count {
        let deadline = ctx.deadline(ctx.plan.boundary(stage));
        if !ctx.sleep_until(deadline).await {
            log::debug!("stage advancer cancelled before stage {stage}");
            return;
        }

        writer.advance_to(stage);
        log::debug!(
            "stage {stage}/{count} at {:?} (late by {:?})",
            ctx.plan.boundary(stage),
            Instant::now().saturating_duration_since(deadline)
        );

        if stage < count {
            ctx.sink.send(PresenterCommand::MarkCurrentStage(Some(stage)));
        } else {
            ctx.sink.send(PresenterCommand::MarkCurrentStage(None));
            for highlighted in 0..count {
                ctx.sink.send(PresenterCommand::Highlight {
                    stage: highlighted,
                    visible: false,
                });
            }
            ctx.sink.send(PresenterCommand::Loading);
        }

        if stage > 0 {
            // The filler may already be gone after a cancellation.
            let _ = completed.send(CompletedStage {
                stage: stage - 1,
                ended_at: deadline,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use stage_core::model::SessionPlan;
    use tokio_util::sync::CancellationToken;

    use crate::presenter::PresenterSink;
    use crate::stage_cell::StageCell;

    #[tokio::test(start_paused = true)]
    async fn boundaries_fire_on_absolute_schedule() {
        let plan = SessionPlan::derive(3, Duration::from_millis(5000), Duration::from_millis(2000))
            .unwrap();
        let cancel = CancellationToken::new();
        let (sink, mut commands) = PresenterSink::channel(cancel.clone());
        let (cell, writer) = StageCell::new(3);
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let started_at = Instant::now();
        let ctx = WorkerContext {
            plan,
            cell: cell.clone(),
            sink,
            cancel,
            started_at,
        };

        tokio::spawn(run_stage_advancer(ctx, writer, done_tx));

        let mut ended = Vec::new();
        while let Some(done) = done_rx.recv().await {
            assert!(cell.current() > done.stage);
            ended.push((done.stage, done.ended_at - started_at));
        }

        assert_eq!(
            ended,
            vec![
                (0, Duration::from_millis(5000)),
                (1, Duration::from_millis(8000)),
                (2, Duration::from_millis(11_000)),
            ]
        );
        assert!(cell.is_terminal());

        let mut tail = Vec::new();
        while let Ok(command) = commands.try_recv() {
            tail.push(command);
        }
        assert_eq!(tail.first(), Some(&PresenterCommand::MarkCurrentStage(Some(0))));
        assert_eq!(tail.last(), Some(&PresenterCommand::Loading));
        assert!(tail.contains(&PresenterCommand::Highlight { stage: 2, visible: false }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_before_next_boundary() {
        let plan = SessionPlan::derive(3, Duration::from_millis(5000), Duration::from_millis(2000))
            .unwrap();
        let cancel = CancellationToken::new();
        let (sink, _commands) = PresenterSink::channel(cancel.clone());
        let (cell, writer) = StageCell::new(3);
        let (done_tx, _done_rx) = mpsc::unbounded_channel();
        let ctx = WorkerContext {
            plan,
            cell: cell.clone(),
            sink,
            cancel: cancel.clone(),
            started_at: Instant::now(),
        };

        let task = tokio::spawn(run_stage_advancer(ctx, writer, done_tx));
        tokio::time::sleep(Duration::from_millis(6000)).await;
        cancel.cancel();
        task.await.unwrap();
        tokio::time::sleep(Duration::from_millis(10_000)).await;

        assert_eq!(cell.current(), 1);
    }
}
