/// Storage and protocol constants
// LMDB Configuration
pub const LMDB_MAP_SIZE: usize = 1024 * 1024 * 1024; // 1GB for the average store
pub const LMDB_MAX_DBS: u32 = 10;
pub const LMDB_MAX_READERS: u32 = 256;

// Database names
pub const HISTORICAL_AVERAGES_DB_NAME: &str = "historical_averages";

// Fast store key layout: historical-average:<SYMBOL>:<lookback_days>
pub const HISTORICAL_AVERAGE_KEY_PREFIX: &str = "historical-average";

// Time constants
pub const SECONDS_PER_MINUTE: u32 = 60;
pub const SECONDS_PER_HOUR: u64 = 3600;

// Cache lifetimes
pub const DEFAULT_AVERAGE_TTL_SECONDS: u64 = 8 * SECONDS_PER_HOUR; // one session, refreshed nightly

// Bulk precompute endpoint
pub const PRECOMPUTE_PATH: &str = "precompute";
pub const DEFAULT_PRECOMPUTE_MAX_CONNECTIONS: usize = 20;
pub const DEFAULT_PRECOMPUTE_TIMEOUT_SECONDS: u64 = 10;

// Default values
pub const DEFAULT_LOOKBACK_DAYS: u32 = 10;
pub const DEFAULT_SLOT_MINUTES: u32 = 5;
pub const DEFAULT_BATCH_CONCURRENCY: usize = 64;

// Error context messages
pub const LMDB_ENV_CREATION_CONTEXT: &str = "Failed to create LMDB environment";
pub const LMDB_TRANSACTION_CONTEXT: &str = "Failed to create LMDB transaction";
pub const LMDB_DATABASE_CONTEXT: &str = "Failed to create LMDB database";

/// Build the fast store key for a symbol and lookback window.
pub fn historical_average_key(symbol: &str, lookback_days: u32) -> String {
    format!("{}:{}:{}", HISTORICAL_AVERAGE_KEY_PREFIX, symbol, lookback_days)
}
