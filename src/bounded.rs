//! Bounded-concurrent execution: one cooperative scheduler, K in flight.
//!
//! Items are submitted in order; each task waits on a counting gate
//! before it may run, so at most `concurrency` operations are in flight
//! at any instant. Nothing blocks an OS thread while suspended, and the
//! gate permit is released by RAII on every exit path: success,
//! failure, timeout, panic, and cancellation alike.

use crate::config::RunConfig;
use crate::error::Result;
use crate::outcome::{FailureReason, Outcome};
use crate::runner::{process_item, CancelToken, InFlightGauge};
use crate::workload::{UnitOfWork, WorkItem};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

pub(crate) fn execute(
    items: Arc<Vec<WorkItem>>,
    work: Arc<dyn UnitOfWork>,
    config: &RunConfig,
    token: CancelToken,
    gauge: Arc<InFlightGauge>,
) -> Result<Vec<Outcome>> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    let outcomes = rt.block_on(async {
        let gate = Arc::new(Semaphore::new(config.concurrency));
        let mut tasks = JoinSet::new();

        for (task_id, item) in items.iter().enumerate() {
            let gate = Arc::clone(&gate);
            let work = Arc::clone(&work);
            let token = token.clone();
            let gauge = Arc::clone(&gauge);
            let config = config.clone();
            let item = item.clone();

            tasks.spawn(async move {
                // The gate is never closed, so acquisition only fails on
                // shutdown; treat that like cancellation.
                let Ok(_permit) = gate.acquire_owned().await else {
                    return None;
                };
                // Items that have not started when the run is cancelled
                // are never dispatched.
                if token.is_cancelled() {
                    return None;
                }

                let processed = AssertUnwindSafe(process_item(
                    work.as_ref(),
                    &item,
                    task_id,
                    &config,
                    &token,
                    &gauge,
                ))
                .catch_unwind()
                .await;

                Some(processed.unwrap_or_else(|_| {
                    Outcome::failure(
                        item.clone(),
                        task_id,
                        Duration::ZERO,
                        FailureReason::WorkerAborted,
                    )
                }))
            });
        }

        debug!(submitted = items.len(), gate = config.concurrency, "tasks submitted");

        let mut outcomes = Vec::with_capacity(items.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(outcome)) => outcomes.push(outcome),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "task join failed"),
            }
        }
        outcomes
    });

    Ok(outcomes)
}
