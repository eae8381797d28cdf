//! Starts the pipeline on each rising edge of the connection's
//! "should synchronize" flag.

use crate::pipeline::SyncPipeline;
use session_state::{ConnectionSnapshot, SessionLifetime};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Result of a manual resynchronization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncOutcome {
    Completed,
    Failed,
    /// A run was already in flight; the request was dropped.
    Busy,
    /// The supervisor is no longer running.
    Stopped,
}

type ResyncRequest = oneshot::Sender<ResyncOutcome>;

/// Handle to the background task that owns the pipeline.
///
/// At most one run is in flight. Edges of the trigger flag observed while a
/// run is in flight are consumed, not queued.
#[derive(Clone)]
pub struct SyncSupervisor {
    requests: mpsc::Sender<ResyncRequest>,
    runs: Arc<AtomicU64>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SyncSupervisor {
    pub fn spawn(pipeline: SyncPipeline, connection: watch::Receiver<ConnectionSnapshot>) -> Self {
        let (requests_tx, requests_rx) = mpsc::channel(8);
        let runs = Arc::new(AtomicU64::new(0));
        let task = tokio::spawn(supervise(pipeline, connection, requests_rx, runs.clone()));

        Self {
            requests: requests_tx,
            runs,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    /// Run the pipeline now and wait for it, unless a run is in flight.
    pub async fn resync(&self) -> ResyncOutcome {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.requests.send(reply_tx).await.is_err() {
            return ResyncOutcome::Stopped;
        }
        reply_rx.await.unwrap_or(ResyncOutcome::Stopped)
    }

    /// Number of runs started so far.
    pub fn runs_started(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    /// Stop the supervisor, abandoning any in-flight run.
    pub async fn shutdown(&self) {
        if let Some(task) = self.task.lock().await.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl std::fmt::Debug for SyncSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSupervisor")
            .field("runs_started", &self.runs_started())
            .finish_non_exhaustive()
    }
}

async fn supervise(
    pipeline: SyncPipeline,
    mut connection: watch::Receiver<ConnectionSnapshot>,
    mut requests: mpsc::Receiver<ResyncRequest>,
    runs: Arc<AtomicU64>,
) {
    let lifetime = pipeline.lifetime().clone();
    let mut last = false;
    let mut connection_open = true;

    loop {
        let should_sync = connection.borrow_and_update().should_sync;
        if should_sync && !last {
            info!("Connection linked, starting contact synchronization");
            run_once(&pipeline, &mut requests, &lifetime, &runs).await;
            if lifetime.is_disposed() {
                break;
            }
            last = connection.borrow_and_update().should_sync;
        } else {
            last = should_sync;
        }

        tokio::select! {
            _ = lifetime.disposed() => break,
            changed = connection.changed(), if connection_open => {
                if changed.is_err() {
                    debug!("Connection state closed; waiting for manual resync only");
                    connection_open = false;
                }
            }
            Some(reply) = requests.recv() => {
                info!("Manual contact resynchronization");
                let outcome = run_once(&pipeline, &mut requests, &lifetime, &runs).await;
                let _ = reply.send(outcome);
                last = connection.borrow_and_update().should_sync;
            }
        }
    }

    debug!("Sync supervisor stopped");
}

/// Run the pipeline once, answering concurrent resync requests with `Busy`.
async fn run_once(
    pipeline: &SyncPipeline,
    requests: &mut mpsc::Receiver<ResyncRequest>,
    lifetime: &SessionLifetime,
    runs: &AtomicU64,
) -> ResyncOutcome {
    runs.fetch_add(1, Ordering::SeqCst);
    let run = pipeline.run();
    tokio::pin!(run);

    loop {
        tokio::select! {
            _ = lifetime.disposed() => return ResyncOutcome::Stopped,
            result = &mut run => {
                return match result {
                    Ok(_) => ResyncOutcome::Completed,
                    Err(_) => ResyncOutcome::Failed,
                };
            }
            Some(reply) = requests.recv() => {
                debug!("Resync requested while a run is in flight");
                let _ = reply.send(ResyncOutcome::Busy);
            }
        }
    }
}
