use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;

/// Preferred-share series tickers (`BACPM`, `JPMPD`) whose histories are not comparable to the
/// common stock.
pub const PREFERRED_SERIES_PATTERN: &str = r"^[A-Z]{3,}P[A-Z]$";

static PREFERRED_SERIES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PREFERRED_SERIES_PATTERN).expect("preferred series pattern is valid"));

/// Instruments excluded from historical-average lookups
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentFilterConfig {
    /// Regular expressions matched against the symbol; an empty list disables pattern matching
    pub patterns: Vec<String>,
    /// Explicit symbols to exclude regardless of pattern
    pub excluded_symbols: Vec<String>,
}

impl Default for InstrumentFilterConfig {
    fn default() -> Self {
        Self {
            patterns: vec![PREFERRED_SERIES_PATTERN.to_string()],
            excluded_symbols: Vec::new(),
        }
    }
}

/// Fast-path check run before any store access
#[derive(Debug, Clone)]
pub struct InstrumentFilter {
    patterns: Vec<Regex>,
    excluded: FxHashSet<String>,
}

impl InstrumentFilter {
    /// Compiles every configured pattern once
    pub fn new(config: &InstrumentFilterConfig) -> Result<Self, ConfigError> {
        let patterns = config
            .patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::Invalid(format!("filter pattern {:?}: {}", pattern, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            patterns,
            excluded: config.excluded_symbols.iter().map(|s| s.to_uppercase()).collect(),
        })
    }

    /// Filter that lets every symbol through
    pub fn allow_all() -> Self {
        Self {
            patterns: Vec::new(),
            excluded: FxHashSet::default(),
        }
    }

    pub fn is_unreliable(&self, symbol: &str) -> bool {
        let unreliable =
            self.excluded.contains(symbol) || self.patterns.iter().any(|pattern| pattern.is_match(symbol));
        if unreliable {
            debug!(symbol, "Symbol excluded from historical averages");
        }
        unreliable
    }
}

impl Default for InstrumentFilter {
    fn default() -> Self {
        Self {
            patterns: vec![PREFERRED_SERIES.clone()],
            excluded: FxHashSet::default(),
        }
    }
}
