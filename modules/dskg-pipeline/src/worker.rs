// Background worker: a bounded queue of tasks drained by a dispatcher that
// runs each task on its own tokio task, at most `concurrency` at a time.
//
// Callers either fire and forget (`submit`) or wait for the result
// (`submit_and_wait`). A failed task is logged and not retried.

use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, Instrument};

use dskg_common::{DskgError, TaskRequest};

use crate::tasks::{Pipeline, TaskOutput};

type Reply = oneshot::Sender<Result<TaskOutput, DskgError>>;

struct Job {
    task: TaskRequest,
    reply: Option<Reply>,
}

/// Cloneable handle for enqueueing tasks. The worker stops once every
/// handle is dropped and in-flight tasks finish.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Job>,
}

impl WorkerHandle {
    /// Enqueue without waiting for the result. Waits for queue space.
    pub async fn submit(&self, task: TaskRequest) -> Result<(), DskgError> {
        self.tx
            .send(Job { task, reply: None })
            .await
            .map_err(|_| worker_stopped())
    }

    pub async fn submit_and_wait(&self, task: TaskRequest) -> Result<TaskOutput, DskgError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Job {
                task,
                reply: Some(reply),
            })
            .await
            .map_err(|_| worker_stopped())?;
        rx.await.map_err(|_| worker_stopped())?
    }
}

fn worker_stopped() -> DskgError {
    DskgError::Anyhow(anyhow!("worker stopped"))
}

/// Start the dispatcher. The returned join handle resolves after the queue
/// closes and every running task has finished.
pub fn spawn_worker(
    pipeline: Arc<Pipeline>,
    concurrency: usize,
    queue_capacity: usize,
) -> (WorkerHandle, JoinHandle<()>) {
    let concurrency = concurrency.max(1);
    let (tx, rx) = mpsc::channel(queue_capacity.max(1));
    let handle = tokio::spawn(dispatch(pipeline, rx, concurrency));
    (WorkerHandle { tx }, handle)
}

async fn dispatch(pipeline: Arc<Pipeline>, mut rx: mpsc::Receiver<Job>, concurrency: usize) {
    let permits = Arc::new(Semaphore::new(concurrency));
    info!(concurrency, "Worker started");

    while let Some(job) = rx.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let pipeline = pipeline.clone();
        let span = info_span!("task", name = job.task.name());

        tokio::spawn(
            async move {
                let _permit = permit;
                let result = pipeline.run(job.task).await;
                match &result {
                    Ok(output) => info!(?output, "Task finished"),
                    Err(e) => error!(error = %e, "Task failed"),
                }
                if let Some(reply) = job.reply {
                    // The caller may have stopped waiting.
                    let _ = reply.send(result);
                }
            }
            .instrument(span),
        );
    }

    // Drain: every permit back means every task is done.
    let _ = permits.acquire_many(concurrency as u32).await;
    info!("Worker stopped");
}
