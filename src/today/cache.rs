use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::session::Slot;

/// Latest observation for one (symbol, slot)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SlotVolume {
    /// Cumulative volume since session open
    pub accumulated_volume: u64,
    pub vwap: f64,
}

/// Per-symbol slot map for one trading day
type SymbolVolumeState = FxHashMap<Slot, SlotVolume>;

/// One day's worth of state. Replaced wholesale on reset.
#[derive(Default)]
struct DayGeneration {
    symbols: DashMap<Arc<str>, SymbolVolumeState>,
}

/// Today's accumulated volume per (symbol, slot)
///
/// Symbols are sharded across the DashMap so writers for different symbols never contend, and an
/// update holds its shard lock for the whole overwrite. `reset()` swaps the generation pointer, so a
/// concurrent reader sees either the complete old day or the empty new one.
pub struct TodayVolumeCache {
    generation: RwLock<Arc<DayGeneration>>,
}

impl Default for TodayVolumeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TodayVolumeCache {
    pub fn new() -> Self {
        Self {
            generation: RwLock::new(Arc::new(DayGeneration::default())),
        }
    }

    fn current(&self) -> Arc<DayGeneration> {
        self.generation
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Last-write-wins set of the stored value for (symbol, slot)
    ///
    /// The generation read guard is held across the write, so `reset()` waits for in-flight
    /// updates and an update that returns after a reset is never written to the discarded day.
    pub fn update(&self, symbol: &str, slot: Slot, accumulated_volume: u64, vwap: f64) {
        let generation = self.generation.read().unwrap_or_else(PoisonError::into_inner);
        let value = SlotVolume { accumulated_volume, vwap };

        if let Some(mut state) = generation.symbols.get_mut(symbol) {
            state.insert(slot, value);
            return;
        }

        generation
            .symbols
            .entry(Arc::from(symbol))
            .or_default()
            .insert(slot, value);
        debug!(symbol, slot, "Tracking new symbol for today's volume");
    }

    /// Stored value, or `(0, 0.0)` if nothing was recorded
    pub fn get(&self, symbol: &str, slot: Slot) -> SlotVolume {
        self.current()
            .symbols
            .get(symbol)
            .and_then(|state| state.get(&slot).copied())
            .unwrap_or_default()
    }

    /// Highest slot recorded today for a symbol and its value
    pub fn latest(&self, symbol: &str) -> Option<(Slot, SlotVolume)> {
        self.current().symbols.get(symbol).and_then(|state| {
            state
                .iter()
                .max_by_key(|(slot, _)| **slot)
                .map(|(slot, volume)| (*slot, *volume))
        })
    }

    pub fn symbol_count(&self) -> usize {
        self.current().symbols.len()
    }

    /// Drop every symbol's state at once
    pub fn reset(&self) {
        let previous = {
            let mut generation = self.generation.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *generation, Arc::new(DayGeneration::default()))
        };
        info!(symbols = previous.symbols.len(), "🧹 Today's volume cache reset");
    }
}
