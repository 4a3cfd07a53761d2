#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Utc};
use chrono_tz::America::New_York;
use serde_json::json;
use warp::Filter;

use rvol_engine::precompute::{DayRecordings, MemoryVolumeSource};
use rvol_engine::ServiceConfig;

/// Current date on the exchange clock
pub fn today_ny() -> NaiveDate {
    Utc::now().with_timezone(&New_York).date_naive()
}

/// Wall-clock New York time on `date` as a UTC instant
pub fn ny_time(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    New_York
        .with_ymd_and_hms(date.year(), date.month(), date.day(), hour, minute, 0)
        .single()
        .expect("unambiguous New York time")
        .with_timezone(&Utc)
}

/// Regular open (09:30, slot 66 with default 5-minute extended session) today
pub fn market_open_today() -> DateTime<Utc> {
    ny_time(today_ny(), 9, 30)
}

/// The `n` calendar days before today, oldest first
pub fn prior_days(n: u64) -> Vec<NaiveDate> {
    let today = today_ny();
    (1..=n)
        .rev()
        .map(|back| today.checked_sub_days(Days::new(back)).expect("date in range"))
        .collect()
}

/// Seed a symbol's history: one day per entry of `days`, recordings as (slot, accumulated volume)
pub fn seed_history(source: &MemoryVolumeSource, symbol: &str, days: &[(NaiveDate, Vec<(usize, u64)>)]) {
    for (date, slots) in days {
        source.record_day(symbol, DayRecordings::with_slots(*date, slots.iter().copied()));
    }
}

/// Default config that never touches the network or disk
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.server.enabled = false;
    config.scheduler.enabled = false;
    config
}

/// Stand-in remote precompute endpoint that answers success after `delay`, tracking concurrency
pub struct FakePrecomputeEndpoint {
    pub addr: SocketAddr,
    pub calls: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,
}

impl FakePrecomputeEndpoint {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

pub fn spawn_fake_precompute_endpoint(delay: Duration) -> FakePrecomputeEndpoint {
    let calls = Arc::new(AtomicUsize::new(0));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));

    let route_calls = calls.clone();
    let route_in_flight = in_flight.clone();
    let route_max = max_in_flight.clone();
    let route = warp::path("precompute")
        .and(warp::post())
        .and(warp::body::json::<serde_json::Value>())
        .and_then(move |_body: serde_json::Value| {
            let calls = route_calls.clone();
            let in_flight = route_in_flight.clone();
            let max_in_flight = route_max.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_in_flight.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, warp::Rejection>(warp::reply::json(&json!({ "success": true })))
            }
        });

    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);

    FakePrecomputeEndpoint {
        addr,
        calls,
        max_in_flight,
    }
}
