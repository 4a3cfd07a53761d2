//! Relative volume (RVOL) engine
//!
//! Buckets the trading session into fixed-width slots, tracks today's accumulated volume per
//! symbol and slot, and compares it with a cached multi-day historical average for the same
//! slot. Historical averages are precomputed in bulk per symbol, either nightly or on demand
//! when a lookup misses.

pub mod common;
pub mod config;
pub mod historical;
pub mod logging;
pub mod postgres;
pub mod precompute;
pub mod rvol;
pub mod scheduler;
pub mod server;
pub mod service;
pub mod session;
pub mod today;

pub use config::{ConfigError, ServiceConfig};
pub use historical::HistoricalAverageStore;
pub use precompute::HistoricalAveragePrecomputer;
pub use rvol::{RvolCalculator, RvolError, RvolResult, RvolSettings};
pub use service::{RvolService, ServiceError};
pub use session::{SessionConfig, SessionSlotIndexer, Slot};
pub use today::{SlotVolume, TodayVolumeCache};
