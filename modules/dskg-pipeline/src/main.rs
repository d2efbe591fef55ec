use std::sync::Arc;

use ai_client::Claude;
use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use dskg_common::Config;
use dskg_graph::{migrate::migrate, GraphClient, Neo4jMasteryGraph};
use dskg_pipeline::{
    spawn_worker, ClaudeQuizGenerator, ClaudeRubricGrader, Pipeline, PipelineDeps,
};
use dskg_store::notify::TaskListener;
use dskg_store::remedial::RemedialQuizStore;
use dskg_store::submissions::SubmissionStore;

const QUEUE_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dskg=info".parse()?))
        .init();

    info!("DSKG worker starting...");

    let config = Config::from_env();
    config.log_redacted();

    // Neo4j
    let client =
        GraphClient::connect(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password)
            .await?;
    migrate(&client).await?;

    // Postgres
    let pool = PgPoolOptions::new()
        .max_connections(config.worker_concurrency as u32 + 2)
        .connect(&config.database_url)
        .await?;
    dskg_store::migrate(&pool).await?;

    let claude = Claude::new(&config.anthropic_api_key, &config.llm_model);

    let deps = PipelineDeps::builder()
        .graph(Arc::new(Neo4jMasteryGraph::new(client)))
        .submissions(Arc::new(SubmissionStore::new(pool.clone())))
        .quizzes(Arc::new(RemedialQuizStore::new(pool.clone())))
        .quiz_generator(Arc::new(ClaudeQuizGenerator::new(claude.clone())))
        .rubric_grader(Arc::new(ClaudeRubricGrader::new(claude)))
        .build();

    let (handle, worker) = spawn_worker(
        Arc::new(Pipeline::new(deps)),
        config.worker_concurrency,
        QUEUE_CAPACITY,
    );

    let mut listener = TaskListener::connect(&pool, &config.task_channel).await?;

    loop {
        tokio::select! {
            task = listener.next_task() => match task {
                Ok(task) => {
                    info!(task = task.name(), "Task received");
                    if let Err(e) = handle.submit(task).await {
                        error!(error = %e, "Failed to enqueue task");
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, channel = listener.channel(), "Task listener failed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    // Let in-flight tasks finish.
    drop(handle);
    worker.await?;

    info!("DSKG worker stopped");
    Ok(())
}
