//! Job Manager (C6): runs checkpoints sync or async, tracks in-flight jobs, and
//! coordinates waiters on async completion. Grounded on the Go
//! `pkg/manager/{manager.go,default_manager.go}` pair: `checkpointsInProgress` here
//! is a mutex-guarded map from job id to a `watch` channel rather than a plain
//! channel, since any number of status-poll waiters may subscribe after the job
//! has already finished and still need to observe completion without blocking
//! forever (a `tokio::sync::Notify::notify_waiters` would miss late subscribers;
//! `watch` retains the last value, matching a closed Go channel always being ready).

use crate::error::Result;
use crate::model::{CheckpointEntry, CheckpointParams, Failure};
use crate::store::ResultStore;
use crate::strategy::Strategy;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Default)]
struct InFlight {
    jobs: Mutex<HashMap<String, watch::Sender<bool>>>,
}

impl InFlight {
    async fn put(&self, job_id: String) {
        let (tx, _rx) = watch::channel(false);
        self.jobs.lock().await.insert(job_id, tx);
    }

    async fn subscribe(&self, job_id: &str) -> Option<watch::Receiver<bool>> {
        self.jobs.lock().await.get(job_id).map(|tx| tx.subscribe())
    }

    async fn complete_and_remove(&self, job_id: &str) {
        if let Some(tx) = self.jobs.lock().await.remove(job_id) {
            let _ = tx.send(true);
        }
    }
}

pub struct JobManager {
    strategy: Arc<Strategy>,
    store: Arc<ResultStore>,
    in_flight: Arc<InFlight>,
}

impl JobManager {
    pub fn new(strategy: Arc<Strategy>, store: Arc<ResultStore>) -> Self {
        Self {
            strategy,
            store,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Runs a checkpoint. Synchronous calls run on `cancel` and return an entry or
    /// an error directly. Asynchronous calls register the job, spawn it on a fresh
    /// root cancellation token, and return `Ok(None)` to signal "accepted".
    pub async fn submit(
        &self,
        cancel: CancellationToken,
        is_async: bool,
        params: CheckpointParams,
    ) -> Result<Option<CheckpointEntry>> {
        if !is_async {
            let begin = now_unix();
            let target = params.target.clone();
            let outcome = self.strategy.run(cancel, params).await;
            let end = now_unix();
            return outcome.map(|image_ref| {
                Some(CheckpointEntry {
                    container_identifier: target,
                    begin_timestamp: begin,
                    end_timestamp: end,
                    container_image_name: image_ref,
                    error: None,
                })
            });
        }

        let job_id = params.job_id.clone();
        self.in_flight.put(job_id.clone()).await;

        let strategy = self.strategy.clone();
        let store = self.store.clone();
        let in_flight = self.in_flight.clone();

        // Deliberately detached from the request's cancellation token — the job
        // must complete even if the HTTP caller hangs up.
        tokio::spawn(async move {
            let root_cancel = CancellationToken::new();
            let target = params.target.clone();
            let begin = now_unix();
            let outcome = strategy.run(root_cancel, params).await;
            let end = now_unix();

            let entry = match outcome {
                Ok(image_ref) => CheckpointEntry {
                    container_identifier: target,
                    begin_timestamp: begin,
                    end_timestamp: end,
                    container_image_name: image_ref,
                    error: None,
                },
                Err(err) => {
                    error!(job_id = %job_id, error = %err, "async checkpoint run failed");
                    CheckpointEntry {
                        container_identifier: target,
                        begin_timestamp: begin,
                        end_timestamp: end,
                        container_image_name: String::new(),
                        error: Some(Failure::from(&err)),
                    }
                }
            };

            if let Err(e) = store.put(&job_id, &entry).await {
                error!(job_id = %job_id, error = %e, "failed to persist checkpoint entry");
            }

            // Completion signal raised only after the entry is durable, per the
            // "entry written before signal" invariant.
            in_flight.complete_and_remove(&job_id).await;
            info!(job_id = %job_id, "async checkpoint run complete");
        });

        Ok(None)
    }

    /// Blocks until `job_id`'s in-flight signal resolves (if any), then reads the
    /// result store. Returns `None` if the store has nothing for the id.
    pub async fn result(&self, job_id: &str) -> Result<Option<CheckpointEntry>> {
        if let Some(mut rx) = self.in_flight.subscribe(job_id).await {
            if !*rx.borrow() {
                let _ = rx.changed().await;
            }
        }
        self.store.get(job_id).await
    }
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_to_unknown_job_returns_none() {
        let in_flight = InFlight::default();
        assert!(in_flight.subscribe("nope").await.is_none());
    }

    #[tokio::test]
    async fn test_complete_and_remove_wakes_subscribers() {
        let in_flight = Arc::new(InFlight::default());
        in_flight.put("job-1".to_string()).await;
        let mut rx = in_flight.subscribe("job-1").await.unwrap();

        let waiter = {
            let mut rx = rx.clone();
            tokio::spawn(async move {
                rx.changed().await.unwrap();
                *rx.borrow()
            })
        };

        in_flight.complete_and_remove("job-1").await;
        assert!(waiter.await.unwrap());
        assert!(in_flight.subscribe("job-1").await.is_none());

        // a subscriber that showed up after completion should also observe `true`
        // immediately rather than hang, if it had subscribed before removal.
        assert!(*rx.borrow_and_update());
    }
}
