//! Runs an adaptive worker pool until interrupted.

mod jobs;
mod settings;

use actors::PoolManager;
use db::JobStore;
use pool_core::{ALL_QUEUES, EventKind};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let env = |name: &str| std::env::var(name).ok();
    let config = settings::from_env(env)?;
    let seed = settings::number(&env, "WORKER_SEED_JOBS")?.unwrap_or(0);
    let seed_queue = config
        .queues
        .iter()
        .find(|q| q.as_str() != ALL_QUEUES)
        .cloned()
        .unwrap_or_else(|| "default".to_string());

    let pool = PoolManager::connect(config, jobs::registry()).await?;
    pool.on(EventKind::MultiWorkerAction, |event| {
        tracing::info!("{}", event.description())
    });
    pool.on(EventKind::Success, |event| tracing::debug!("{}", event.description()));
    pool.on(EventKind::Failure, |event| tracing::warn!("{}", event.description()));
    pool.on(EventKind::Error, |event| tracing::warn!("{}", event.description()));
    pool.on(EventKind::InternalError, |event| {
        tracing::error!("{}", event.description())
    });

    pool.start().await?;
    tracing::info!("Worker pool started with {} processors", pool.workers().len());

    for i in 0..seed {
        pool.store()
            .enqueue(&seed_queue, "echo", vec![serde_json::json!(i)])
            .await?;
    }
    if seed > 0 {
        tracing::info!("Enqueued {} demo jobs on {}", seed, seed_queue);
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down; waiting for in-flight jobs");
    pool.close().await?;
    tracing::info!("Worker pool stopped");
    Ok(())
}
