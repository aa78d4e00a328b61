//! Thread-parallel execution: W OS workers, each owning one slice.
//!
//! Every worker drives its slice strictly sequentially on a private
//! current-thread runtime, so the async unit of work and its per-item
//! timeout are honored from a blocking context. Workers only share the
//! outcome collection, behind a mutex.

use crate::config::RunConfig;
use crate::error::Result;
use crate::outcome::{FailureReason, Outcome};
use crate::partition::partition;
use crate::runner::{process_item, CancelToken, InFlightGauge};
use crate::workload::{UnitOfWork, WorkItem};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, warn};

pub(crate) fn execute(
    items: Arc<Vec<WorkItem>>,
    work: Arc<dyn UnitOfWork>,
    config: &RunConfig,
    token: CancelToken,
    gauge: Arc<InFlightGauge>,
) -> Result<Vec<Outcome>> {
    let slices = partition(items.len(), config.concurrency)?;
    let outcomes = Arc::new(Mutex::new(Vec::with_capacity(items.len())));
    let mut workers = Vec::with_capacity(slices.len());

    for (worker_id, slice) in slices.into_iter().enumerate() {
        // Tracks the next unprocessed index so a dead worker's remaining
        // items can be accounted for at join time.
        let progress = Arc::new(AtomicUsize::new(slice.start));

        let handle = {
            let items = Arc::clone(&items);
            let work = Arc::clone(&work);
            let outcomes = Arc::clone(&outcomes);
            let progress = Arc::clone(&progress);
            let token = token.clone();
            let gauge = Arc::clone(&gauge);
            let config = config.clone();
            let slice = slice.clone();

            thread::Builder::new()
                .name(format!("fetchbench-worker-{}", worker_id))
                .spawn(move || {
                    let rt = match tokio::runtime::Builder::new_current_thread()
                        .enable_time()
                        .build()
                    {
                        Ok(rt) => rt,
                        Err(e) => {
                            error!(worker = worker_id, error = %e, "worker runtime build failed");
                            let mut guard =
                                outcomes.lock().unwrap_or_else(PoisonError::into_inner);
                            for idx in slice.clone() {
                                guard.push(Outcome::failure(
                                    items[idx].clone(),
                                    worker_id,
                                    Duration::ZERO,
                                    FailureReason::WorkerAborted,
                                ));
                            }
                            progress.store(slice.end, Ordering::SeqCst);
                            return;
                        }
                    };

                    debug!(worker = worker_id, items = slice.len(), "worker starting");

                    for idx in slice {
                        if token.is_cancelled() {
                            debug!(worker = worker_id, "worker observed cancellation");
                            break;
                        }
                        let outcome = rt.block_on(process_item(
                            work.as_ref(),
                            &items[idx],
                            worker_id,
                            &config,
                            &token,
                            &gauge,
                        ));
                        outcomes
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push(outcome);
                        progress.store(idx + 1, Ordering::SeqCst);
                    }
                })
        };

        match handle {
            Ok(handle) => workers.push((handle, slice, progress, worker_id)),
            Err(e) => {
                error!(worker = worker_id, error = %e, "failed to spawn worker");
                let mut guard = outcomes.lock().unwrap_or_else(PoisonError::into_inner);
                for idx in slice {
                    guard.push(Outcome::failure(
                        items[idx].clone(),
                        worker_id,
                        Duration::ZERO,
                        FailureReason::WorkerAborted,
                    ));
                }
            }
        }
    }

    for (handle, slice, progress, worker_id) in workers {
        let panicked = handle.join().is_err();
        if panicked && !token.is_cancelled() {
            // One worker dying is not fatal to the run; its unfinished
            // items become failures so every item stays accounted for.
            let resume = progress.load(Ordering::SeqCst);
            warn!(
                worker = worker_id,
                unfinished = slice.end.saturating_sub(resume),
                "worker panicked mid-slice; recording remaining items as aborted"
            );
            let mut guard = outcomes.lock().unwrap_or_else(PoisonError::into_inner);
            for idx in resume..slice.end {
                guard.push(Outcome::failure(
                    items[idx].clone(),
                    worker_id,
                    Duration::ZERO,
                    FailureReason::WorkerAborted,
                ));
            }
        }
    }

    let collected = Arc::try_unwrap(outcomes)
        .map(|m| m.into_inner().unwrap_or_else(PoisonError::into_inner))
        .unwrap_or_else(|arc| arc.lock().unwrap_or_else(PoisonError::into_inner).clone());
    Ok(collected)
}
