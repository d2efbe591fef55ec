// Task channel over Postgres LISTEN/NOTIFY.
//
// Producers (the API layer) publish a JSON TaskRequest with pg_notify. The
// worker holds a dedicated listener connection and decodes each payload.
// NOTIFY is fire-and-forget: a task published while no worker is listening
// is lost, and the producer is expected to re-trigger it.

use anyhow::Result;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tracing::{info, warn};

use dskg_common::TaskRequest;

/// Publish a task on `channel`.
pub async fn publish_task(pool: &PgPool, channel: &str, task: &TaskRequest) -> Result<()> {
    let payload = serde_json::to_string(task)?;
    sqlx::query("SELECT pg_notify($1, $2)")
        .bind(channel)
        .bind(payload)
        .execute(pool)
        .await?;
    Ok(())
}

/// Decode one notification payload. Returns `None` for anything that is not
/// a known task.
pub fn decode_task(payload: &str) -> Option<TaskRequest> {
    match serde_json::from_str(payload) {
        Ok(task) => Some(task),
        Err(e) => {
            warn!(error = %e, payload, "Skipping undecodable task payload");
            None
        }
    }
}

pub struct TaskListener {
    listener: PgListener,
    channel: String,
}

impl TaskListener {
    pub async fn connect(pool: &PgPool, channel: &str) -> Result<Self> {
        let mut listener = PgListener::connect_with(pool).await?;
        listener.listen(channel).await?;
        info!(channel, "Listening for tasks");
        Ok(Self {
            listener,
            channel: channel.to_string(),
        })
    }

    /// Wait for the next decodable task. Malformed payloads are skipped.
    pub async fn next_task(&mut self) -> Result<TaskRequest> {
        loop {
            let notification = self.listener.recv().await?;
            if let Some(task) = decode_task(notification.payload()) {
                return Ok(task);
            }
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}
