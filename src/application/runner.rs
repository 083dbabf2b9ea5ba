use std::sync::Arc;

use log::{error, info};
use tokio::sync::watch;
use tokio::task;

use super::dispatcher::{OutboxDispatcher, TickSummary};
use crate::domain::errors::OutboxError;
use crate::domain::ports::OutboxStore;

/// Drive `dispatcher` on a fixed delay until `shutdown` turns `true`.
///
/// The next tick is scheduled `interval` after the previous one returns, so
/// ticks never overlap. Each tick runs on the blocking pool together with
/// the queue-depth refresh. A failed tick is logged and its batch is
/// picked up again by the following tick. On shutdown the in-flight tick
/// completes before this returns.
pub async fn run<S: OutboxStore>(
    dispatcher: Arc<OutboxDispatcher<S>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let interval = dispatcher.config().interval;
    info!("Outbox dispatcher started interval={:?}", interval);

    loop {
        if *shutdown.borrow() {
            break;
        }

        let worker = Arc::clone(&dispatcher);
        match task::spawn_blocking(move || run_tick(&worker)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("Outbox dispatch tick failed, batch will be retried: {}", e),
            Err(e) => error!("Outbox dispatch tick aborted: {}", e),
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = shutdown.changed() => {
                // Sender dropped: treat as shutdown.
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!("Outbox dispatcher shutting down");
}

fn run_tick<S: OutboxStore>(dispatcher: &OutboxDispatcher<S>) -> Result<TickSummary, OutboxError> {
    let summary = dispatcher.tick()?;
    dispatcher.refresh_queue_depth()?;
    Ok(summary)
}
