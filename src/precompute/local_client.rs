use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::historical::{BulkPrecomputeClient, PrecomputeRequest, TransportError};

use super::precomputer::HistoricalAveragePrecomputer;

/// Bulk precompute served by an in-process precomputer
pub struct LocalPrecomputeClient {
    precomputer: Arc<HistoricalAveragePrecomputer>,
}

impl LocalPrecomputeClient {
    pub fn new(precomputer: Arc<HistoricalAveragePrecomputer>) -> Self {
        Self { precomputer }
    }
}

#[async_trait]
impl BulkPrecomputeClient for LocalPrecomputeClient {
    async fn request_precompute(&self, request: &PrecomputeRequest) -> Result<(), TransportError> {
        self.precomputer
            .precompute(&request.symbol, request.lookback_days, request.max_slot)
            .await
            .map(|_| ())
            .map_err(|e| {
                warn!(symbol = %request.symbol, "Local precompute failed: {}", e);
                TransportError::Rejected(e.to_string())
            })
    }

    async fn close(&self) {}
}
