/// Historical Average Module
///
/// Two-tier lookup of average accumulated volume per (symbol, slot, lookback): a fast key-value
/// store checked first, and a bulk precompute service triggered on a miss that fills every slot
/// of the symbol in one batch.
pub mod client;
pub mod errors;
pub mod fast_store;
pub mod filter;
pub mod lmdb_store;
pub mod store;

pub use client::{BulkPrecomputeClient, HttpPrecomputeClient, PrecomputeClientConfig, PrecomputeRequest};
pub use errors::{HistoricalError, StoreError, TransportError};
pub use fast_store::{FastStore, MemoryFastStore};
pub use filter::{InstrumentFilter, InstrumentFilterConfig};
pub use lmdb_store::LmdbFastStore;
pub use store::{HistoricalAverageStore, HistoricalStoreConfig, StoreStats};

#[cfg(test)]
pub(crate) mod test_support;
