//! HTTP surface
//!
//! - POST /precompute - bulk precompute endpoint used by remote calculators on cache miss
//! - GET /health - liveness probe with lookup counters

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};
use warp::http::StatusCode;
use warp::Filter;

use crate::common::constants::PRECOMPUTE_PATH;
use crate::config::ServerConfig;
use crate::historical::{HistoricalAverageStore, PrecomputeRequest};
use crate::precompute::{HistoricalAveragePrecomputer, PrecomputeError};
use crate::today::TodayVolumeCache;

/// Shared handles the routes read from
#[derive(Clone)]
pub struct ServerState {
    pub precomputer: Option<Arc<HistoricalAveragePrecomputer>>,
    pub historical: Arc<HistoricalAverageStore>,
    pub today: Arc<TodayVolumeCache>,
}

pub fn routes(
    state: ServerState,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let state = Arc::new(state);

    let health_state = Arc::clone(&state);
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(move || {
            warp::reply::with_status(
                warp::reply::json(&json!({
                    "status": "healthy",
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                    "service": "rvol-engine",
                    "symbols_today": health_state.today.symbol_count(),
                    "historical": health_state.historical.stats(),
                    "precompute_endpoint": health_state.precomputer.is_some(),
                })),
                StatusCode::OK,
            )
        });

    let precompute_state = Arc::clone(&state);
    let precompute = warp::path(PRECOMPUTE_PATH)
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and_then(move |request: PrecomputeRequest| {
            let state = Arc::clone(&precompute_state);
            async move { Ok::<_, warp::Rejection>(handle_precompute(state, request).await) }
        });

    health.or(precompute)
}

async fn handle_precompute(
    state: Arc<ServerState>,
    request: PrecomputeRequest,
) -> warp::reply::WithStatus<warp::reply::Json> {
    let Some(precomputer) = state.precomputer.as_ref() else {
        return warp::reply::with_status(
            warp::reply::json(&json!({ "success": false, "error": "no volume source configured" })),
            StatusCode::SERVICE_UNAVAILABLE,
        );
    };

    match precomputer
        .precompute(&request.symbol, request.lookback_days, request.max_slot)
        .await
    {
        Ok(summary) => warp::reply::with_status(
            warp::reply::json(&json!({ "success": true, "slots_written": summary.slots_written })),
            StatusCode::OK,
        ),
        Err(e) => {
            warn!(symbol = %request.symbol, "Precompute request failed: {}", e);
            let status = match e {
                PrecomputeError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            warp::reply::with_status(
                warp::reply::json(&json!({ "success": false, "error": e.to_string() })),
                status,
            )
        }
    }
}

/// Serve until the process exits
pub async fn serve(config: &ServerConfig, state: ServerState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port).parse()?;
    info!("🌐 Starting HTTP server on {}", addr);
    warp::serve(routes(state)).run(addr).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::historical::client::MockBulkPrecomputeClient;
    use crate::historical::{FastStore, HistoricalStoreConfig, InstrumentFilter, MemoryFastStore};
    use crate::precompute::MemoryVolumeSource;
    use chrono::Days;
    use std::time::Duration;

    fn state(with_precomputer: bool) -> (ServerState, Arc<MemoryFastStore>, Arc<MemoryVolumeSource>) {
        let store = Arc::new(MemoryFastStore::new());
        let source = Arc::new(MemoryVolumeSource::new());
        let historical = Arc::new(HistoricalAverageStore::new(
            store.clone(),
            Arc::new(MockBulkPrecomputeClient::new()),
            InstrumentFilter::default(),
            191,
            &HistoricalStoreConfig::default(),
        ));
        let precomputer = with_precomputer.then(|| {
            Arc::new(HistoricalAveragePrecomputer::new(
                source.clone(),
                store.clone(),
                chrono_tz::America::New_York,
                191,
                Duration::from_secs(60),
            ))
        });
        let state = ServerState {
            precomputer,
            historical,
            today: Arc::new(TodayVolumeCache::new()),
        };
        (state, store, source)
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _, _) = state(false);
        let response = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&routes(state))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["historical"]["bulk_calls"], 0);
    }

    #[tokio::test]
    async fn test_precompute_populates_store() {
        let (state, store, source) = state(true);
        let yesterday = state
            .precomputer
            .as_ref()
            .unwrap()
            .today()
            .checked_sub_days(Days::new(1))
            .unwrap();
        source.record("AAPL", yesterday, 0, 1_000);

        let response = warp::test::request()
            .method("POST")
            .path("/precompute")
            .json(&PrecomputeRequest {
                symbol: "AAPL".to_string(),
                lookback_days: 10,
                max_slot: 191,
            })
            .reply(&routes(state))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["slots_written"], 192);
        assert_eq!(
            store.hget("historical-average:AAPL:10", "191").await.unwrap().as_deref(),
            Some("1000")
        );
    }

    #[tokio::test]
    async fn test_precompute_invalid_request() {
        let (state, _, _) = state(true);
        let response = warp::test::request()
            .method("POST")
            .path("/precompute")
            .json(&json!({ "symbol": "AAPL", "lookback_days": 0, "max_slot": 191 }))
            .reply(&routes(state))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_precompute_rejects_max_slot_beyond_session() {
        let (state, store, source) = state(true);
        source.record("AAPL", chrono::NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(), 0, 1_000);
        let routes = routes(state);

        for max_slot in [192usize, 1 << 34, usize::MAX] {
            let response = warp::test::request()
                .method("POST")
                .path("/precompute")
                .json(&json!({ "symbol": "AAPL", "lookback_days": 10, "max_slot": max_slot }))
                .reply(&routes)
                .await;

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
        assert_eq!(store.hgetall("historical-average:AAPL:10").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_precompute_unavailable_without_source() {
        let (state, _, _) = state(false);
        let response = warp::test::request()
            .method("POST")
            .path("/precompute")
            .json(&json!({ "symbol": "AAPL", "lookback_days": 10, "max_slot": 191 }))
            .reply(&routes(state))
            .await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
