use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts};
use serde::{Deserialize, Serialize};
use tokio_postgres::NoTls;
use tracing::{debug, info};

use crate::precompute::{DayRecordings, PrecomputeError, VolumeSource};
use crate::session::Slot;

use super::errors::PostgresError;

/// PostgreSQL configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_connections: usize,
    pub connection_timeout_seconds: u64,
    pub enabled: bool,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "market_data".to_string(),
            username: "postgres".to_string(),
            password: "password".to_string(),
            max_connections: 10,
            connection_timeout_seconds: 30,
            enabled: false,
        }
    }
}

/// Per-slot accumulated volume history stored in `accumulated_volume_slots`
pub struct PostgresVolumeSource {
    pool: Pool,
}

impl PostgresVolumeSource {
    /// Most recent prior days with data, then every in-range recording of those days
    const RECENT_DAYS_SQL: &'static str = r#"
        WITH days AS (
            SELECT DISTINCT trade_date
            FROM accumulated_volume_slots
            WHERE symbol = $1 AND trade_date < $2 AND slot <= $3
            ORDER BY trade_date DESC
            LIMIT $4
        )
        SELECT s.trade_date, s.slot, s.accumulated_volume
        FROM accumulated_volume_slots s
        JOIN days d ON d.trade_date = s.trade_date
        WHERE s.symbol = $1 AND s.slot <= $3
        ORDER BY s.trade_date, s.slot
    "#;

    const ACTIVE_SYMBOLS_SQL: &'static str = r#"
        SELECT DISTINCT symbol
        FROM accumulated_volume_slots
        WHERE trade_date >= $1
        ORDER BY symbol
    "#;

    /// Build the pool and verify connectivity
    pub async fn connect(config: &PostgresConfig) -> Result<Self, PostgresError> {
        info!("Initializing PostgreSQL connection pool...");
        info!("  host: {}:{} database: {} user: {}", config.host, config.port, config.database, config.username);

        let mut cfg = Config::new();
        cfg.host = Some(config.host.clone());
        cfg.port = Some(config.port);
        cfg.dbname = Some(config.database.clone());
        cfg.user = Some(config.username.clone());
        cfg.password = Some(config.password.clone());
        cfg.application_name = Some("rvol_engine".to_string());
        cfg.ssl_mode = Some(deadpool_postgres::SslMode::Disable);
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let timeout = Duration::from_secs(config.connection_timeout_seconds);
        let mut pool_config = PoolConfig::new(config.max_connections);
        pool_config.timeouts = Timeouts {
            wait: Some(timeout),
            create: Some(timeout),
            recycle: Some(timeout),
        };
        cfg.pool = Some(pool_config);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| PostgresError::Config(format!("Failed to create connection pool: {}", e)))?;

        let client = pool.get().await?;
        let row = client.query_one("SELECT 1 as test", &[]).await?;
        let test: i32 = row.get("test");
        if test != 1 {
            return Err(PostgresError::Config("Connection test failed".to_string()));
        }

        info!("✅ PostgreSQL connection test successful");
        Ok(Self { pool })
    }

    async fn query_recent_days(
        &self,
        symbol: &str,
        lookback_days: u32,
        before: NaiveDate,
        max_slot: Slot,
    ) -> Result<Vec<DayRecordings>, PostgresError> {
        let max_slot = i32::try_from(max_slot)
            .map_err(|_| PostgresError::Conversion(format!("slot {} out of range", max_slot)))?;
        let limit = i64::from(lookback_days);

        let client = self.pool.get().await?;
        let stmt = client.prepare_cached(Self::RECENT_DAYS_SQL).await?;
        let rows = client.query(&stmt, &[&symbol, &before, &max_slot, &limit]).await?;

        let mut days: BTreeMap<NaiveDate, BTreeMap<Slot, u64>> = BTreeMap::new();
        for row in rows {
            let date: NaiveDate = row.try_get(0)?;
            let slot: i32 = row.try_get(1)?;
            let volume: i64 = row.try_get(2)?;
            let slot = Slot::try_from(slot)
                .map_err(|_| PostgresError::Conversion(format!("negative slot {} for {}", slot, symbol)))?;
            let volume = u64::try_from(volume)
                .map_err(|_| PostgresError::Conversion(format!("negative volume {} for {}", volume, symbol)))?;
            days.entry(date).or_default().insert(slot, volume);
        }

        debug!(symbol, days = days.len(), "Loaded accumulated volume history");
        Ok(days
            .into_iter()
            .map(|(date, slots)| DayRecordings { date, slots })
            .collect())
    }

    async fn query_active_symbols(&self, since: NaiveDate) -> Result<Vec<String>, PostgresError> {
        let client = self.pool.get().await?;
        let rows = client.query(Self::ACTIVE_SYMBOLS_SQL, &[&since]).await?;
        rows.iter()
            .map(|row| row.try_get::<_, String>(0).map_err(PostgresError::from))
            .collect()
    }
}

#[async_trait]
impl VolumeSource for PostgresVolumeSource {
    async fn recent_days(
        &self,
        symbol: &str,
        lookback_days: u32,
        before: NaiveDate,
        max_slot: Slot,
    ) -> Result<Vec<DayRecordings>, PrecomputeError> {
        Ok(self.query_recent_days(symbol, lookback_days, before, max_slot).await?)
    }

    async fn active_symbols(&self, since: NaiveDate) -> Result<Vec<String>, PrecomputeError> {
        Ok(self.query_active_symbols(since).await?)
    }
}
