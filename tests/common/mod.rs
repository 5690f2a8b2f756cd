#![allow(dead_code)]

use anyhow::{anyhow, Result};
use payments_retry::config::RetryConfig;
use payments_retry::domain::payment::{PaymentRequest, PaymentStatus};
use payments_retry::gateways::{GatewayResponse, PaymentGateway};
use payments_retry::pipeline::Pipeline;
use payments_retry::store::store_memory::MemoryStore;
use payments_retry::store::{LogStore, StreamEntry};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub enum Step {
    Pay,
    Decline,
    Blow,
    /// Never answers within a test's lifetime.
    Hang,
}

/// Plays back a fixed script of outcomes, then keeps repeating the last one.
pub struct ScriptedGateway {
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Step>,
    pub calls: AtomicUsize,
    orders: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn new(steps: &[Step]) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.iter().copied().collect()),
            last: Mutex::new(*steps.last().unwrap_or(&Step::Pay)),
            calls: AtomicUsize::new(0),
            orders: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn orders(&self) -> Vec<String> {
        self.orders.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PaymentGateway for ScriptedGateway {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn attempt(&self, request: &PaymentRequest) -> Result<GatewayResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.orders.lock().unwrap().push(request.order_id.clone());
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(*self.last.lock().unwrap());

        match step {
            Step::Pay => Ok(GatewayResponse {
                status: PaymentStatus::Success,
                transaction_id: Some("T1".to_string()),
                error_code: None,
                error_message: None,
            }),
            Step::Decline => Ok(GatewayResponse {
                status: PaymentStatus::Failure,
                transaction_id: None,
                error_code: Some("DECLINED".to_string()),
                error_message: None,
            }),
            Step::Blow => Err(anyhow!("gateway client panicked on response")),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(anyhow!("gateway never answered"))
            }
        }
    }
}

/// Memory log that refuses appends whose value contains `needle`.
pub struct FlakyLog {
    pub inner: MemoryStore,
    pub needle: String,
}

#[async_trait::async_trait]
impl LogStore for FlakyLog {
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<()> {
        self.inner.ensure_group(stream, group).await
    }

    async fn append(&self, stream: &str, value: &str) -> Result<String> {
        if value.contains(&self.needle) {
            return Err(anyhow!("connection refused"));
        }
        self.inner.append(stream, value).await
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamEntry>> {
        self.inner.read_group(stream, group, consumer, count, block).await
    }

    async fn read_pending(&self, stream: &str, group: &str, consumer: &str, count: usize) -> Result<Vec<StreamEntry>> {
        self.inner.read_pending(stream, group, consumer, count).await
    }

    async fn acknowledge(&self, stream: &str, group: &str, id: &str) -> Result<()> {
        self.inner.acknowledge(stream, group, id).await
    }

    async fn ping(&self) -> Result<()> {
        Err(anyhow!("connection refused"))
    }
}

/// Memory log whose first few group creations and acknowledgements time out.
pub struct HiccupLog {
    pub inner: MemoryStore,
    pub group_failures: AtomicUsize,
    pub ack_failures: AtomicUsize,
}

impl HiccupLog {
    pub fn new(inner: MemoryStore, group_failures: usize, ack_failures: usize) -> Self {
        Self {
            inner,
            group_failures: AtomicUsize::new(group_failures),
            ack_failures: AtomicUsize::new(ack_failures),
        }
    }
}

fn take_failure(left: &AtomicUsize) -> bool {
    left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait::async_trait]
impl LogStore for HiccupLog {
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<()> {
        if take_failure(&self.group_failures) {
            return Err(anyhow!("timeout"));
        }
        self.inner.ensure_group(stream, group).await
    }

    async fn append(&self, stream: &str, value: &str) -> Result<String> {
        self.inner.append(stream, value).await
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamEntry>> {
        self.inner.read_group(stream, group, consumer, count, block).await
    }

    async fn read_pending(&self, stream: &str, group: &str, consumer: &str, count: usize) -> Result<Vec<StreamEntry>> {
        self.inner.read_pending(stream, group, consumer, count).await
    }

    async fn acknowledge(&self, stream: &str, group: &str, id: &str) -> Result<()> {
        if take_failure(&self.ack_failures) {
            return Err(anyhow!("timeout"));
        }
        self.inner.acknowledge(stream, group, id).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}

/// Polls `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

pub async fn wait_for_order(gateway: &ScriptedGateway, order_id: &str) -> bool {
    eventually(|| async move { gateway.orders().iter().any(|o| o == order_id) }).await
}

pub async fn wait_for_drained(store: &MemoryStore, cfg: &RetryConfig) -> bool {
    eventually(|| async move { store.pending_count(&cfg.stream_key, &cfg.group).await == 0 }).await
}

pub fn retry_config() -> RetryConfig {
    RetryConfig {
        consumer_name: "consumer-1".to_string(),
        poll_timeout: Duration::from_millis(20),
        ..RetryConfig::default()
    }
}

pub fn request(order_id: &str) -> PaymentRequest {
    PaymentRequest {
        order_id: order_id.to_string(),
        amount_minor: 1999,
        currency: "CNY".to_string(),
        subject: Some("order".to_string()),
    }
}

pub async fn memory_pipeline(gateway: Arc<dyn PaymentGateway>) -> (MemoryStore, Pipeline) {
    let store = MemoryStore::new();
    let cfg = retry_config();
    let pipeline = Pipeline::from_parts(
        &cfg,
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        gateway,
    );
    store.ensure_group(&cfg.stream_key, &cfg.group).await.unwrap();
    (store, pipeline)
}
