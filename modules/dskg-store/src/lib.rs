//! Postgres persistence for submissions and remedial quizzes, plus the
//! LISTEN/NOTIFY task channel.

pub mod notify;
pub mod remedial;
pub mod submissions;

pub use notify::{decode_task, publish_task, TaskListener};
pub use remedial::{QuizCompletion, RemedialQuizStore};
pub use submissions::SubmissionStore;

use sqlx::PgPool;

/// Apply the bundled schema migrations.
pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
