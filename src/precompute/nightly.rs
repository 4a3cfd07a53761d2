use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use crate::session::Slot;

use super::precomputer::HistoricalAveragePrecomputer;

/// Totals of one nightly run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NightlySummary {
    pub date: Option<NaiveDate>,
    pub symbols: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub slots_written: usize,
}

/// Refreshes historical averages for the whole active-symbol universe
pub struct NightlyPrecomputeJob {
    precomputer: Arc<HistoricalAveragePrecomputer>,
    extra_symbols: Vec<String>,
    active_within_days: u32,
    max_slot: Slot,
    concurrency: usize,
}

impl NightlyPrecomputeJob {
    pub fn new(
        precomputer: Arc<HistoricalAveragePrecomputer>,
        extra_symbols: Vec<String>,
        active_within_days: u32,
        max_slot: Slot,
        concurrency: usize,
    ) -> Self {
        Self {
            precomputer,
            extra_symbols,
            active_within_days,
            max_slot,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn run(&self, lookback_days: u32) -> NightlySummary {
        let today = self.precomputer.today();
        self.run_for(today, lookback_days).await
    }

    /// Precompute every active symbol from the days before `today`
    pub async fn run_for(&self, today: NaiveDate, lookback_days: u32) -> NightlySummary {
        let symbols = self.universe(today).await;
        info!("🌙 Nightly precompute starting for {} symbols (lookback {} days)", symbols.len(), lookback_days);

        let mut summary = NightlySummary {
            date: Some(today),
            symbols: symbols.len(),
            ..NightlySummary::default()
        };

        let mut results = stream::iter(symbols)
            .map(|symbol| async move {
                let result = self
                    .precomputer
                    .precompute_as_of(&symbol, lookback_days, self.max_slot, today)
                    .await;
                (symbol, result)
            })
            .buffer_unordered(self.concurrency);

        while let Some((symbol, result)) = results.next().await {
            match result {
                Ok(done) => {
                    summary.succeeded += 1;
                    summary.slots_written += done.slots_written;
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(%symbol, "Nightly precompute failed: {}", e);
                }
            }
        }

        info!(
            "✅ Nightly precompute finished: {} ok, {} failed, {} slots written",
            summary.succeeded, summary.failed, summary.slots_written
        );
        summary
    }

    async fn universe(&self, today: NaiveDate) -> BTreeSet<String> {
        let mut symbols: BTreeSet<String> = self.extra_symbols.iter().cloned().collect();
        let since = today
            .checked_sub_days(Days::new(u64::from(self.active_within_days)))
            .unwrap_or(today);

        match self.precomputer.source().active_symbols(since).await {
            Ok(active) => symbols.extend(active),
            Err(e) => warn!("Could not enumerate active symbols, using configured universe only: {}", e),
        }
        symbols
    }
}
