//! Shared fakes for unit tests of the historical and calculator layers
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::common::constants::historical_average_key;
use crate::session::Slot;

use super::client::{BulkPrecomputeClient, PrecomputeRequest};
use super::errors::{StoreError, TransportError};
use super::fast_store::{FastStore, MemoryFastStore};

/// Memory store that counts reads and writes
#[derive(Default)]
pub struct CountingFastStore {
    inner: MemoryFastStore,
    hget_calls: AtomicUsize,
    hset_calls: AtomicUsize,
}

impl CountingFastStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hget_calls(&self) -> usize {
        self.hget_calls.load(Ordering::SeqCst)
    }

    pub fn hset_calls(&self) -> usize {
        self.hset_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FastStore for CountingFastStore {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.hget_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.hget(key, field).await
    }

    async fn hgetall(&self, key: &str) -> Result<Option<HashMap<String, String>>, StoreError> {
        self.inner.hgetall(key).await
    }

    async fn hset_all(&self, key: &str, fields: Vec<(String, String)>, ttl: Duration) -> Result<(), StoreError> {
        self.hset_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.hset_all(key, fields, ttl).await
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        self.inner.purge_expired().await
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.inner.close().await
    }
}

/// Bulk client that writes a fixed slot→average mapping for whatever symbol it is asked about
pub struct PopulatingClient {
    store: Arc<dyn FastStore>,
    averages: Vec<(Slot, f64)>,
    delay: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<PrecomputeRequest>>,
}

impl PopulatingClient {
    pub fn new(store: Arc<dyn FastStore>, averages: Vec<(Slot, f64)>) -> Self {
        Self {
            store,
            averages,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<PrecomputeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl BulkPrecomputeClient for PopulatingClient {
    async fn request_precompute(&self, request: &PrecomputeRequest) -> Result<(), TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let fields = self
            .averages
            .iter()
            .map(|(slot, average)| (slot.to_string(), average.to_string()))
            .collect();
        self.store
            .hset_all(
                &historical_average_key(&request.symbol, request.lookback_days),
                fields,
                Duration::from_secs(60),
            )
            .await
            .map_err(|e| TransportError::Rejected(e.to_string()))
    }

    async fn close(&self) {}
}

/// Bulk client whose calls never complete
#[derive(Default)]
pub struct HangingClient {
    calls: AtomicUsize,
}

impl HangingClient {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BulkPrecomputeClient for HangingClient {
    async fn request_precompute(&self, _request: &PrecomputeRequest) -> Result<(), TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn close(&self) {}
}

/// Bulk client that fails every call after `delay`
#[derive(Default)]
pub struct FailingClient {
    delay: Duration,
    calls: AtomicUsize,
}

impl FailingClient {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BulkPrecomputeClient for FailingClient {
    async fn request_precompute(&self, _request: &PrecomputeRequest) -> Result<(), TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Err(TransportError::HttpStatus(reqwest::StatusCode::SERVICE_UNAVAILABLE))
    }

    async fn close(&self) {}
}
