use crate::config::{AppConfig, RetryConfig, RetrySinkKind, StoreBackend};
use crate::gateways::{self, PaymentGateway};
use crate::repo::outbox_repo::{OutboxRepo, OutboxStore};
use crate::retry::attempts::AttemptCounter;
use crate::retry::consumer::RetryConsumer;
use crate::retry::dead_letter::DeadLetter;
use crate::retry::producer::RetryProducer;
use crate::retry::scheduler::DelayScheduler;
use crate::retry::sink::{OutboxRetrySink, RetrySink};
use crate::service::outbox_relay::OutboxRelay;
use crate::store::store_memory::MemoryStore;
use crate::store::store_redis::RedisStore;
use crate::store::{CounterStore, DelayQueue, LogStore};
use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Every retry component, built explicitly from configuration.
#[derive(Clone)]
pub struct Pipeline {
    pub log: Arc<dyn LogStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub producer: RetryProducer,
    pub consumer: RetryConsumer,
    pub scheduler: DelayScheduler,
    pub counter: AttemptCounter,
    pub retry_sink: Arc<dyn RetrySink>,
    pub relay: Option<OutboxRelay>,
    pub run_scheduler: bool,
}

impl Pipeline {
    pub async fn build(cfg: &AppConfig) -> Result<Self> {
        let gateway = gateways::from_settings(&cfg.gateway);

        let mut pipeline = match cfg.store_backend {
            StoreBackend::Redis => {
                let store = RedisStore::new(&cfg.redis_url, cfg.retry.stream_max_len)?;
                Self::from_parts(
                    &cfg.retry,
                    Arc::new(store.clone()),
                    Arc::new(store.clone()),
                    Arc::new(store),
                    gateway,
                )
            }
            StoreBackend::Memory => {
                tracing::warn!("using in-memory retry store; retries do not survive a restart");
                let store = MemoryStore::new();
                Self::from_parts(
                    &cfg.retry,
                    Arc::new(store.clone()),
                    Arc::new(store.clone()),
                    Arc::new(store),
                    gateway,
                )
            }
        };

        if cfg.retry_sink == RetrySinkKind::Outbox {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&cfg.database_url)
                .await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            pipeline = pipeline.with_outbox(Arc::new(OutboxRepo { pool }));
        }

        tracing::info!(
            "retry pipeline ready: stream {}, group {}, consumer {}, sink {}",
            cfg.retry.stream_key,
            cfg.retry.group,
            cfg.retry.consumer_name,
            pipeline.retry_sink.kind()
        );
        Ok(pipeline)
    }

    /// Stream-sink pipeline over the given stores.
    pub fn from_parts(
        retry: &RetryConfig,
        log: Arc<dyn LogStore>,
        queue: Arc<dyn DelayQueue>,
        counters: Arc<dyn CounterStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let producer = RetryProducer::new(log.clone(), retry.stream_key.clone());
        let counter = AttemptCounter::new(counters, retry.counter_prefix.clone(), retry.counter_ttl);
        let dead_letter = DeadLetter {
            log: log.clone(),
            stream_key: retry.dead_letter_key.clone(),
        };

        let consumer = RetryConsumer {
            log: log.clone(),
            queue: queue.clone(),
            counter: counter.clone(),
            gateway: gateway.clone(),
            dead_letter,
            config: retry.clone(),
        };
        let scheduler = DelayScheduler {
            producer: producer.clone(),
            queue,
            queue_key: retry.delay_queue_key.clone(),
            interval: retry.scheduler_interval,
        };

        Self {
            log,
            gateway,
            retry_sink: Arc::new(producer.clone()),
            producer,
            consumer,
            scheduler,
            counter,
            relay: None,
            run_scheduler: retry.run_scheduler,
        }
    }

    pub fn with_outbox(mut self, outbox: Arc<dyn OutboxStore>) -> Self {
        self.retry_sink = Arc::new(OutboxRetrySink { outbox: outbox.clone() });
        self.relay = Some(OutboxRelay {
            outbox,
            producer: self.producer.clone(),
        });
        self
    }

    pub fn spawn_workers(&self) -> Vec<JoinHandle<()>> {
        let mut handles = vec![tokio::spawn(self.consumer.clone().run())];
        if self.run_scheduler {
            handles.push(tokio::spawn(self.scheduler.clone().run()));
        } else {
            tracing::info!("delay scheduler disabled in this process");
        }
        if let Some(relay) = self.relay.clone() {
            handles.push(tokio::spawn(relay.run()));
        }
        handles
    }
}
