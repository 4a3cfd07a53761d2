use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kameo::actor::ActorRef;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{ConfigError, FastStoreBackend, ServiceConfig};
use crate::historical::{
    BulkPrecomputeClient, FastStore, HistoricalAverageStore, HttpPrecomputeClient, InstrumentFilter, LmdbFastStore,
    MemoryFastStore, StoreError, TransportError,
};
use crate::postgres::{PostgresError, PostgresVolumeSource};
use crate::precompute::{HistoricalAveragePrecomputer, LocalPrecomputeClient, NightlyPrecomputeJob, VolumeSource};
use crate::rvol::RvolCalculator;
use crate::scheduler::SchedulerActor;
use crate::server::ServerState;
use crate::session::SessionSlotIndexer;
use crate::today::TodayVolumeCache;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Fast store error: {0}")]
    Store(#[from] StoreError),
    #[error("Precompute client error: {0}")]
    Transport(#[from] TransportError),
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] PostgresError),
}

/// Process-wide RVOL components, created once at startup and released once at shutdown
pub struct RvolService {
    config: ServiceConfig,
    calculator: Arc<RvolCalculator>,
    today: Arc<TodayVolumeCache>,
    historical: Arc<HistoricalAverageStore>,
    fast_store: Arc<dyn FastStore>,
    client: Arc<dyn BulkPrecomputeClient>,
    precomputer: Option<Arc<HistoricalAveragePrecomputer>>,
    nightly: Option<Arc<NightlyPrecomputeJob>>,
    closed: AtomicBool,
}

impl RvolService {
    /// Start with the volume source named by `config.database`
    pub async fn start(config: ServiceConfig) -> Result<Self, ServiceError> {
        Self::start_with_source(config, None).await
    }

    /// Start with an explicit volume source, overriding `config.database`
    pub async fn start_with_source(
        config: ServiceConfig,
        source: Option<Arc<dyn VolumeSource>>,
    ) -> Result<Self, ServiceError> {
        config.validate()?;

        let indexer = SessionSlotIndexer::new(config.session.clone())?;
        let max_slot = indexer
            .max_slot()
            .ok_or_else(|| ConfigError::InvalidSession("session window contains no slots".to_string()))?;

        let fast_store: Arc<dyn FastStore> = match config.fast_store.backend {
            FastStoreBackend::Memory => Arc::new(MemoryFastStore::new()),
            FastStoreBackend::Lmdb => Arc::new(LmdbFastStore::open(&config.fast_store.lmdb_path)?),
        };
        info!("🗄️ Fast store ready ({:?} backend)", config.fast_store.backend);

        let source = match source {
            Some(source) => Some(source),
            None if config.database.enabled => {
                let postgres: Arc<dyn VolumeSource> = Arc::new(PostgresVolumeSource::connect(&config.database).await?);
                Some(postgres)
            }
            None => None,
        };

        let precomputer = source.map(|source| {
            Arc::new(HistoricalAveragePrecomputer::new(
                source,
                fast_store.clone(),
                indexer.timezone(),
                max_slot,
                config.fast_store.ttl(),
            ))
        });

        let client: Arc<dyn BulkPrecomputeClient> = match (&config.precompute_client.base_url, &precomputer) {
            (Some(base_url), _) => {
                let client = HttpPrecomputeClient::new(base_url, &config.precompute_client)?;
                info!(
                    "🔗 Bulk precompute via {} ({} connections)",
                    client.endpoint(),
                    config.precompute_client.max_connections
                );
                Arc::new(client)
            }
            (None, Some(precomputer)) => {
                info!("🔗 Bulk precompute served in-process");
                Arc::new(LocalPrecomputeClient::new(precomputer.clone()))
            }
            (None, None) => {
                return Err(ConfigError::Invalid(
                    "either precompute_client.base_url or a volume source (database.enabled) is required".to_string(),
                )
                .into());
            }
        };

        let today = Arc::new(TodayVolumeCache::new());
        let historical = Arc::new(HistoricalAverageStore::new(
            fast_store.clone(),
            client.clone(),
            InstrumentFilter::new(&config.filter)?,
            max_slot,
            &config.fast_store.store_config(),
        ));
        let calculator = Arc::new(RvolCalculator::new(
            indexer,
            today.clone(),
            historical.clone(),
            config.rvol.clone(),
        ));

        let nightly = precomputer.as_ref().map(|precomputer| {
            Arc::new(NightlyPrecomputeJob::new(
                precomputer.clone(),
                config.universe.symbols.clone(),
                config.universe.active_within_days,
                max_slot,
                config.universe.nightly_concurrency,
            ))
        });

        info!(
            "✅ RVOL service started: {} slots, lookback {} days",
            max_slot + 1,
            config.rvol.lookback_days
        );

        Ok(Self {
            config,
            calculator,
            today,
            historical,
            fast_store,
            client,
            precomputer,
            nightly,
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn calculator(&self) -> Arc<RvolCalculator> {
        self.calculator.clone()
    }

    pub fn historical(&self) -> Arc<HistoricalAverageStore> {
        self.historical.clone()
    }

    pub fn precomputer(&self) -> Option<Arc<HistoricalAveragePrecomputer>> {
        self.precomputer.clone()
    }

    pub fn nightly_job(&self) -> Option<Arc<NightlyPrecomputeJob>> {
        self.nightly.clone()
    }

    pub fn server_state(&self) -> ServerState {
        ServerState {
            precomputer: self.precomputer.clone(),
            historical: self.historical.clone(),
            today: self.today.clone(),
        }
    }

    pub fn spawn_scheduler(&self) -> ActorRef<SchedulerActor> {
        let actor = SchedulerActor::new(
            self.calculator.clone(),
            self.nightly.clone(),
            self.fast_store.clone(),
            self.config.scheduler.clone(),
            Duration::from_secs(self.config.fast_store.purge_interval_seconds),
        );
        kameo::spawn(actor)
    }

    /// Release the precompute connection pool and the fast store. Later calls are no-ops.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            warn!("RVOL service already shut down");
            return;
        }

        info!("🛑 Shutting down RVOL service...");
        self.client.close().await;
        if let Err(e) = self.fast_store.close().await {
            error!("Failed to close fast store: {}", e);
        }
        info!("RVOL service shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
