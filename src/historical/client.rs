use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::common::constants::{
    DEFAULT_PRECOMPUTE_MAX_CONNECTIONS, DEFAULT_PRECOMPUTE_TIMEOUT_SECONDS, PRECOMPUTE_PATH,
};
use crate::session::Slot;

use super::errors::TransportError;

/// Parameters of one bulk precompute call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecomputeRequest {
    pub symbol: String,
    pub lookback_days: u32,
    pub max_slot: Slot,
}

/// Body returned by the bulk endpoint. Only `success` is part of the contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecomputeResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots_written: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Trigger for the bulk precompute service
///
/// The call carries no payload back; its side effect is a batch write of every slot average for
/// the symbol into the fast store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BulkPrecomputeClient: Send + Sync {
    async fn request_precompute(&self, request: &PrecomputeRequest) -> Result<(), TransportError>;

    /// Release pooled connections. Later requests fail with `TransportError::PoolClosed`.
    async fn close(&self);
}

/// HTTP client pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecomputeClientConfig {
    /// Base URL of a remote precompute service; `None` runs the precomputer in-process
    pub base_url: Option<String>,
    /// Ceiling on concurrent in-flight calls and idle pooled connections
    pub max_connections: usize,
    pub request_timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub pool_idle_timeout_seconds: u64,
}

impl Default for PrecomputeClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            max_connections: DEFAULT_PRECOMPUTE_MAX_CONNECTIONS,
            request_timeout_seconds: DEFAULT_PRECOMPUTE_TIMEOUT_SECONDS,
            connect_timeout_seconds: 2,
            pool_idle_timeout_seconds: 90,
        }
    }
}

/// Pooled HTTP client for the bulk precompute endpoint
///
/// Built once at startup. The semaphore hard-caps in-flight calls so a session-open stampede of
/// cache misses cannot open more than `max_connections` sockets.
pub struct HttpPrecomputeClient {
    client: reqwest::Client,
    endpoint: String,
    permits: Arc<Semaphore>,
}

impl HttpPrecomputeClient {
    pub fn new(base_url: &str, config: &PrecomputeClientConfig) -> Result<Self, TransportError> {
        let max_connections = config.max_connections.max(1);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .pool_max_idle_per_host(max_connections)
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_seconds))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        let endpoint = format!("{}/{}", base_url.trim_end_matches('/'), PRECOMPUTE_PATH);
        info!("🔌 Bulk precompute client ready: {} (max {} connections)", endpoint, max_connections);

        Ok(Self {
            client,
            endpoint,
            permits: Arc::new(Semaphore::new(max_connections)),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn available_connections(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl BulkPrecomputeClient for HttpPrecomputeClient {
    async fn request_precompute(&self, request: &PrecomputeRequest) -> Result<(), TransportError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| TransportError::PoolClosed)?;

        debug!(symbol = %request.symbol, lookback_days = request.lookback_days, "Requesting bulk precompute");

        let response = self.client.post(&self.endpoint).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(symbol = %request.symbol, %status, "Bulk precompute returned error status");
            return Err(TransportError::HttpStatus(status));
        }

        let body: PrecomputeResponse = response
            .json()
            .await
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;

        if !body.success {
            return Err(TransportError::Rejected(
                body.error.unwrap_or_else(|| "unspecified failure".to_string()),
            ));
        }
        Ok(())
    }

    async fn close(&self) {
        self.permits.close();
        info!("🛑 Bulk precompute client pool closed");
    }
}
