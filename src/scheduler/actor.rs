use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use kameo::actor::{ActorRef, WeakActorRef};
use kameo::error::{ActorStopReason, BoxError};
use kameo::message::{Context, Message};
use kameo::{mailbox::unbounded::UnboundedMailbox, Actor};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::historical::FastStore;
use crate::precompute::{NightlyPrecomputeJob, NightlySummary};
use crate::rvol::RvolCalculator;

/// Scheduler messages for telling (fire-and-forget)
#[derive(Debug, Clone)]
pub enum SchedulerTell {
    /// Run whatever daily work is due at `now`
    Tick { now: DateTime<Utc> },
    /// Clear today's volumes immediately
    ResetNow,
    /// Run the nightly precompute immediately
    PrecomputeNow,
}

/// Scheduler messages for asking (request-response)
#[derive(Debug, Clone)]
pub enum SchedulerAsk {
    GetStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub last_reset: Option<NaiveDate>,
    pub last_precompute: Option<NaiveDate>,
    pub last_summary: Option<NightlySummary>,
    pub resets: u64,
    pub entries_purged: u64,
}

#[derive(Debug, Clone)]
pub enum SchedulerReply {
    Status(SchedulerStatus),
}

/// Owns the daily lifecycle: session reset, nightly precompute and expired-entry sweeps
///
/// Each action runs at most once per exchange-local date, at or after its configured time.
pub struct SchedulerActor {
    calculator: Arc<RvolCalculator>,
    nightly: Option<Arc<NightlyPrecomputeJob>>,
    fast_store: Arc<dyn FastStore>,
    timezone: Tz,
    config: SchedulerConfig,
    lookback_days: u32,
    purge_interval: Duration,
    last_purge: Option<Instant>,
    status: SchedulerStatus,
}

impl SchedulerActor {
    pub fn new(
        calculator: Arc<RvolCalculator>,
        nightly: Option<Arc<NightlyPrecomputeJob>>,
        fast_store: Arc<dyn FastStore>,
        config: SchedulerConfig,
        purge_interval: Duration,
    ) -> Self {
        let timezone = calculator.indexer().timezone();
        let lookback_days = calculator.settings().lookback_days;
        Self {
            calculator,
            nightly,
            fast_store,
            timezone,
            config,
            lookback_days,
            purge_interval,
            last_purge: None,
            status: SchedulerStatus::default(),
        }
    }

    async fn on_tick(&mut self, now: DateTime<Utc>) {
        let local = now.with_timezone(&self.timezone);
        let date = local.date_naive();
        let time = local.time();

        if time >= self.config.reset_time && self.status.last_reset != Some(date) {
            self.reset(date);
        }

        if self.nightly.is_some()
            && time >= self.config.nightly_precompute_time
            && self.status.last_precompute != Some(date)
        {
            self.precompute(date).await;
        }

        if self.purge_due() {
            self.purge().await;
        }
    }

    fn reset(&mut self, date: NaiveDate) {
        info!("🔄 Resetting today's volumes for session {}", date);
        self.calculator.reset_for_new_day();
        self.status.last_reset = Some(date);
        self.status.resets += 1;
    }

    async fn precompute(&mut self, date: NaiveDate) {
        let Some(job) = self.nightly.clone() else {
            warn!("Nightly precompute requested but no volume source is configured");
            return;
        };
        let summary = job.run_for(date, self.lookback_days).await;
        self.status.last_precompute = Some(date);
        self.status.last_summary = Some(summary);
    }

    fn purge_due(&self) -> bool {
        !self.purge_interval.is_zero()
            && self
                .last_purge
                .map_or(true, |at| at.elapsed() >= self.purge_interval)
    }

    async fn purge(&mut self) {
        self.last_purge = Some(Instant::now());
        match self.fast_store.purge_expired().await {
            Ok(removed) => self.status.entries_purged += removed as u64,
            Err(e) => warn!("Failed to purge expired historical averages: {}", e),
        }
        let pruned = self.calculator.historical().prune_triggers();
        if pruned > 0 {
            debug!(pruned, "Pruned idle precompute triggers");
        }
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }
}

impl Actor for SchedulerActor {
    type Mailbox = UnboundedMailbox<Self>;

    fn name() -> &'static str {
        "SchedulerActor"
    }

    async fn on_start(&mut self, _actor_ref: ActorRef<Self>) -> Result<(), BoxError> {
        info!(
            "⏰ SchedulerActor started (reset at {}, nightly precompute at {}, {})",
            self.config.reset_time,
            self.config.nightly_precompute_time,
            if self.nightly.is_some() { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    async fn on_stop(&mut self, _actor_ref: WeakActorRef<Self>, reason: ActorStopReason) -> Result<(), BoxError> {
        info!("SchedulerActor stopping: {:?}", reason);
        Ok(())
    }
}

impl Message<SchedulerTell> for SchedulerActor {
    type Reply = ();

    async fn handle(&mut self, msg: SchedulerTell, _ctx: Context<'_, Self, Self::Reply>) -> Self::Reply {
        match msg {
            SchedulerTell::Tick { now } => self.on_tick(now).await,
            SchedulerTell::ResetNow => {
                let today = self.today();
                self.reset(today);
            }
            SchedulerTell::PrecomputeNow => {
                let today = self.today();
                self.precompute(today).await;
            }
        }
    }
}

impl Message<SchedulerAsk> for SchedulerActor {
    type Reply = Result<SchedulerReply, String>;

    async fn handle(&mut self, msg: SchedulerAsk, _ctx: Context<'_, Self, Self::Reply>) -> Self::Reply {
        match msg {
            SchedulerAsk::GetStatus => Ok(SchedulerReply::Status(self.status.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::historical::test_support::CountingFastStore;
    use crate::historical::{HistoricalAverageStore, HistoricalStoreConfig, InstrumentFilter, MemoryFastStore};
    use crate::historical::client::MockBulkPrecomputeClient;
    use crate::precompute::{HistoricalAveragePrecomputer, MemoryVolumeSource};
    use crate::rvol::RvolSettings;
    use crate::session::{SessionConfig, SessionSlotIndexer};
    use crate::today::TodayVolumeCache;
    use chrono::TimeZone;
    use kameo::request::MessageSend;

    struct Fixture {
        calculator: Arc<RvolCalculator>,
        store: Arc<CountingFastStore>,
        source: Arc<MemoryVolumeSource>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(CountingFastStore::new());
        let mut client = MockBulkPrecomputeClient::new();
        client.expect_request_precompute().returning(|_| Ok(()));
        let historical = Arc::new(HistoricalAverageStore::new(
            store.clone(),
            Arc::new(client),
            InstrumentFilter::default(),
            191,
            &HistoricalStoreConfig::default(),
        ));
        let calculator = Arc::new(RvolCalculator::new(
            SessionSlotIndexer::new(SessionConfig::default()).unwrap(),
            Arc::new(TodayVolumeCache::new()),
            historical,
            RvolSettings::default(),
        ));
        Fixture {
            calculator,
            store,
            source: Arc::new(MemoryVolumeSource::new()),
        }
    }

    fn nightly(fixture: &Fixture) -> Arc<NightlyPrecomputeJob> {
        let precomputer = Arc::new(HistoricalAveragePrecomputer::new(
            fixture.source.clone(),
            fixture.store.clone(),
            chrono_tz::America::New_York,
            191,
            Duration::from_secs(60),
        ));
        Arc::new(NightlyPrecomputeJob::new(precomputer, vec!["AAPL".to_string()], 14, 191, 4))
    }

    /// Wall-clock New York time on 2024-03-05 as a UTC instant
    fn ny(hour: u32, minute: u32) -> DateTime<Utc> {
        chrono_tz::America::New_York
            .with_ymd_and_hms(2024, 3, 5, hour, minute, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    async fn status(actor_ref: &ActorRef<SchedulerActor>) -> SchedulerStatus {
        match actor_ref.ask(SchedulerAsk::GetStatus).await {
            Ok(SchedulerReply::Status(status)) => status,
            Err(e) => panic!("status request failed: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_reset_runs_once_per_day_after_reset_time() {
        let fixture = fixture();
        let actor = SchedulerActor::new(
            fixture.calculator.clone(),
            None,
            fixture.store.clone(),
            SchedulerConfig::default(),
            Duration::ZERO,
        );
        let actor_ref = kameo::spawn(actor);

        actor_ref.tell(SchedulerTell::Tick { now: ny(3, 0) }).send().await.unwrap();
        assert_eq!(status(&actor_ref).await.resets, 0);

        fixture.calculator.update_volume("AAPL", 1_000, ny(9, 30), 1.0);
        actor_ref.tell(SchedulerTell::Tick { now: ny(4, 0) }).send().await.unwrap();
        actor_ref.tell(SchedulerTell::Tick { now: ny(12, 0) }).send().await.unwrap();

        let status = status(&actor_ref).await;
        assert_eq!(status.resets, 1);
        assert_eq!(status.last_reset, NaiveDate::from_ymd_opt(2024, 3, 5));
        assert!(status.last_precompute.is_none());
    }

    #[tokio::test]
    async fn test_nightly_precompute_runs_once_and_records_summary() {
        let fixture = fixture();
        fixture
            .source
            .record("AAPL", NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(), 0, 500);
        let job = nightly(&fixture);
        let actor = SchedulerActor::new(
            fixture.calculator.clone(),
            Some(job),
            fixture.store.clone(),
            SchedulerConfig::default(),
            Duration::ZERO,
        );
        let actor_ref = kameo::spawn(actor);

        actor_ref.tell(SchedulerTell::Tick { now: ny(3, 45) }).send().await.unwrap();
        actor_ref.tell(SchedulerTell::Tick { now: ny(3, 50) }).send().await.unwrap();

        let status = status(&actor_ref).await;
        let summary = status.last_summary.unwrap();
        assert_eq!(summary.symbols, 1);
        assert_eq!(summary.slots_written, 192);
        assert_eq!(fixture.store.hset_calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_entries_are_purged() {
        let fixture = fixture();
        fixture
            .store
            .hset_all("historical-average:OLD:10", vec![("0".into(), "1".into())], Duration::ZERO)
            .await
            .unwrap();
        let actor = SchedulerActor::new(
            fixture.calculator.clone(),
            None,
            fixture.store.clone(),
            SchedulerConfig::default(),
            Duration::from_secs(3600),
        );
        let actor_ref = kameo::spawn(actor);

        actor_ref.tell(SchedulerTell::Tick { now: ny(1, 0) }).send().await.unwrap();
        actor_ref.tell(SchedulerTell::Tick { now: ny(1, 1) }).send().await.unwrap();

        assert_eq!(status(&actor_ref).await.entries_purged, 1);
    }

    #[tokio::test]
    async fn test_reset_now_clears_today_only() {
        let fixture = fixture();
        let memory = Arc::new(MemoryFastStore::new());
        let actor = SchedulerActor::new(
            fixture.calculator.clone(),
            None,
            memory,
            SchedulerConfig::default(),
            Duration::ZERO,
        );
        let actor_ref = kameo::spawn(actor);

        fixture.calculator.update_volume("AAPL", 1_000, ny(9, 30), 1.0);
        actor_ref.tell(SchedulerTell::ResetNow).send().await.unwrap();
        actor_ref.tell(SchedulerTell::ResetNow).send().await.unwrap();

        assert_eq!(status(&actor_ref).await.resets, 2);
        assert_eq!(fixture.calculator.calculate("AAPL", ny(9, 30)).await, None);
    }
}
