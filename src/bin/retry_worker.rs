use anyhow::Result;
use payments_retry::config::AppConfig;
use payments_retry::pipeline::Pipeline;
use tracing_subscriber::EnvFilter;

/// Consumer and scheduler only. Run one per extra `RETRY_CONSUMER_NAME` to scale out.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();
    let pipeline = Pipeline::build(&cfg).await?;
    let workers = pipeline.spawn_workers();

    tokio::signal::ctrl_c().await?;
    tracing::info!("retry worker {} stopping", cfg.retry.consumer_name);
    for handle in workers {
        handle.abort();
    }
    Ok(())
}
