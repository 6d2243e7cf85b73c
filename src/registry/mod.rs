pub mod receitaws;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::error::Result;

pub use receitaws::ReceitaWsClient;

#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Shareholder names the registry holds for `tax_id`.
    async fn lookup(&self, tax_id: &str) -> Result<Vec<String>>;
}

/// Enforces a minimum wall-clock gap between registry calls.
///
/// The gap is measured from the end of the previous call (or from creation,
/// for the first one). The lock is held across the call itself, so no two
/// lookups are ever in flight together even if callers run concurrently.
pub struct ThrottledRegistry {
    inner: Arc<dyn RegistryClient>,
    min_interval: Duration,
    last_call: Mutex<Instant>,
}

impl ThrottledRegistry {
    pub fn new(inner: Arc<dyn RegistryClient>, min_interval: Duration) -> Self {
        Self {
            inner,
            min_interval,
            last_call: Mutex::new(Instant::now()),
        }
    }
}

#[async_trait]
impl RegistryClient for ThrottledRegistry {
    async fn lookup(&self, tax_id: &str) -> Result<Vec<String>> {
        let mut last_call = self.last_call.lock().await;

        let ready_at = *last_call + self.min_interval;
        let now = Instant::now();
        if ready_at > now {
            let wait = ready_at - now;
            tracing::info!(
                wait_secs = wait.as_secs_f64(),
                tax_id = tax_id,
                "Waiting for registry rate limit"
            );
            sleep(wait).await;
        }

        let result = self.inner.lookup(tax_id).await;
        *last_call = Instant::now();
        result
    }
}
