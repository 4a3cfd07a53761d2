use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use heed::types::{SerdeBincode, Str};
use heed::{Database, Env};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::common::constants::{HISTORICAL_AVERAGES_DB_NAME, LMDB_DATABASE_CONTEXT, LMDB_TRANSACTION_CONTEXT};
use crate::common::error_utils::ErrorContext;
use crate::common::lmdb_config::{get_lmdb_config, open_lmdb_environment};

use super::errors::StoreError;
use super::fast_store::FastStore;

/// Hash value persisted per key, with an absolute expiry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredHash {
    fields: Vec<(String, String)>,
    expires_at_ms: i64,
}

impl StoredHash {
    fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

type HashDb = Database<Str, SerdeBincode<StoredHash>>;

/// LMDB-backed fast store shared by every process on the host
///
/// LMDB calls block, so each operation runs on the blocking pool.
pub struct LmdbFastStore {
    env: Env,
    db: HashDb,
    closed: AtomicBool,
}

impl LmdbFastStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let env = open_lmdb_environment(path)?;

        let mut wtxn = env.write_txn().with_db_context(LMDB_TRANSACTION_CONTEXT)?;
        let db: HashDb = env
            .create_database(&mut wtxn, Some(HISTORICAL_AVERAGES_DB_NAME))
            .with_db_context(LMDB_DATABASE_CONTEXT)?;
        wtxn.commit().with_db_context("Failed to commit historical average database creation")?;

        let (map_size, _, max_readers) = get_lmdb_config();
        info!(
            "✅ Opened LMDB fast store at {} (map size {} MB, {} readers)",
            path.display(),
            map_size / (1024 * 1024),
            max_readers
        );
        Ok(Self {
            env,
            db,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    async fn read_hash(&self, key: &str) -> Result<Option<StoredHash>, StoreError> {
        self.ensure_open()?;
        let env = self.env.clone();
        let db = self.db;
        let key = key.to_string();

        tokio::task::spawn_blocking(move || -> Result<Option<StoredHash>, StoreError> {
            let rtxn = env.read_txn().with_db_context(LMDB_TRANSACTION_CONTEXT)?;
            let stored = db.get(&rtxn, &key)?;
            let now_ms = chrono::Utc::now().timestamp_millis();
            Ok(stored.filter(|hash| !hash.is_expired(now_ms)))
        })
        .await
        .with_db_context("LMDB read task failed")?
    }
}

#[async_trait]
impl FastStore for LmdbFastStore {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let hash = self.read_hash(key).await?;
        Ok(hash.and_then(|hash| {
            hash.fields
                .into_iter()
                .find(|(name, _)| name == field)
                .map(|(_, value)| value)
        }))
    }

    async fn hgetall(&self, key: &str) -> Result<Option<HashMap<String, String>>, StoreError> {
        let hash = self.read_hash(key).await?;
        Ok(hash.map(|hash| hash.fields.into_iter().collect()))
    }

    async fn hset_all(&self, key: &str, fields: Vec<(String, String)>, ttl: Duration) -> Result<(), StoreError> {
        self.ensure_open()?;
        let env = self.env.clone();
        let db = self.db;
        let key = key.to_string();
        let field_count = fields.len();
        let hash = StoredHash {
            fields,
            expires_at_ms: chrono::Utc::now().timestamp_millis() + ttl.as_millis() as i64,
        };

        let stored_key = key.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let mut wtxn = env.write_txn().with_db_context(LMDB_TRANSACTION_CONTEXT)?;
            db.put(&mut wtxn, &stored_key, &hash)?;
            wtxn.commit().with_db_context("Failed to commit historical average write")?;
            Ok(())
        })
        .await
        .with_db_context("LMDB write task failed")??;

        debug!(key = %key, fields = field_count, "Stored historical average hash");
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        self.ensure_open()?;
        let env = self.env.clone();
        let db = self.db;

        tokio::task::spawn_blocking(move || -> Result<usize, StoreError> {
            let now_ms = chrono::Utc::now().timestamp_millis();
            let expired: Vec<String> = {
                let rtxn = env.read_txn().with_db_context(LMDB_TRANSACTION_CONTEXT)?;
                let mut keys = Vec::new();
                for item in db.iter(&rtxn)? {
                    let (key, hash) = item?;
                    if hash.is_expired(now_ms) {
                        keys.push(key.to_string());
                    }
                }
                keys
            };

            if expired.is_empty() {
                return Ok(0);
            }

            let mut wtxn = env.write_txn().with_db_context(LMDB_TRANSACTION_CONTEXT)?;
            for key in &expired {
                db.delete(&mut wtxn, key)?;
            }
            wtxn.commit().with_db_context("Failed to commit expired entry purge")?;
            Ok(expired.len())
        })
        .await
        .with_db_context("LMDB purge task failed")?
    }

    async fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let env = self.env.clone();
        tokio::task::spawn_blocking(move || env.force_sync())
            .await
            .with_db_context("LMDB sync task failed")??;
        info!("🛑 LMDB fast store closed");
        Ok(())
    }
}
