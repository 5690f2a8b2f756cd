use payments_retry::circuit::breaker::CircuitBreaker;
use payments_retry::config::AppConfig;
use payments_retry::pipeline::Pipeline;
use payments_retry::service::payment_service::PaymentService;
use payments_retry::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();
    let pipeline = Pipeline::build(&cfg).await?;

    let payment_service = PaymentService {
        gateway: pipeline.gateway.clone(),
        circuit: CircuitBreaker::new(cfg.circuit.clone()),
        retry_sink: pipeline.retry_sink.clone(),
        primary_timeout: cfg.primary_timeout,
    };

    let workers = if cfg.run_retry_workers {
        pipeline.spawn_workers()
    } else {
        tracing::info!("retry workers disabled; run retry_worker separately");
        Vec::new()
    };

    let state = AppState {
        payment_service,
        log: pipeline.log.clone(),
        counter: pipeline.counter.clone(),
    };
    let app = payments_retry::router(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    for handle in workers {
        handle.abort();
    }
    tracing::info!("shut down");
    Ok(())
}
