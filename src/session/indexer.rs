use chrono::{DateTime, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::common::constants::{DEFAULT_SLOT_MINUTES, SECONDS_PER_MINUTE};
use crate::config::ConfigError;

/// Zero-based index of a fixed-width bucket within the session window.
pub type Slot = usize;

/// Portion of an extended trading day a slot belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubSession {
    PreMarket,
    Regular,
    PostMarket,
}

/// Slot counts attributable to each sub-session of an extended window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SubSessionSlots {
    pub pre_market: usize,
    pub regular: usize,
    pub post_market: usize,
}

/// Session window definition
///
/// Times are wall-clock times in `timezone`. With `extended_hours` the window runs from
/// `pre_market_open` to `post_market_close`, otherwise from `regular_open` to `regular_close`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Width of each slot in minutes
    pub slot_minutes: u32,
    /// Include pre-market and post-market sub-sessions
    pub extended_hours: bool,
    /// Exchange timezone used to convert instants into wall-clock time
    pub timezone: Tz,
    pub pre_market_open: NaiveTime,
    pub regular_open: NaiveTime,
    pub regular_close: NaiveTime,
    pub post_market_close: NaiveTime,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            slot_minutes: DEFAULT_SLOT_MINUTES,
            extended_hours: true,
            timezone: chrono_tz::America::New_York,
            pre_market_open: NaiveTime::from_hms_opt(4, 0, 0).unwrap_or_default(),
            regular_open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            regular_close: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default(),
            post_market_close: NaiveTime::from_hms_opt(20, 0, 0).unwrap_or_default(),
        }
    }
}

impl SessionConfig {
    /// Regular-hours-only variant of the default session
    pub fn regular_hours() -> Self {
        Self {
            extended_hours: false,
            ..Default::default()
        }
    }

    /// Check slot width and ordering of the session bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slot_minutes == 0 {
            return Err(ConfigError::InvalidSession("slot_minutes must be greater than zero".to_string()));
        }
        if self.regular_open >= self.regular_close {
            return Err(ConfigError::InvalidSession(format!(
                "regular_open ({}) must be before regular_close ({})",
                self.regular_open, self.regular_close
            )));
        }
        if self.extended_hours
            && (self.pre_market_open > self.regular_open || self.regular_close > self.post_market_close)
        {
            return Err(ConfigError::InvalidSession(format!(
                "extended window {}..{} must enclose regular hours {}..{}",
                self.pre_market_open, self.post_market_close, self.regular_open, self.regular_close
            )));
        }
        Ok(())
    }

    fn window(&self) -> (NaiveTime, NaiveTime) {
        if self.extended_hours {
            (self.pre_market_open, self.post_market_close)
        } else {
            (self.regular_open, self.regular_close)
        }
    }
}

/// Stateless slot resolver for a validated session
///
/// Holds only precomputed seconds-since-midnight bounds, so it is cheap to clone and safe to
/// share across any number of tasks.
#[derive(Debug, Clone)]
pub struct SessionSlotIndexer {
    config: SessionConfig,
    window_start: u32,
    window_end: u32,
    regular_start: u32,
    regular_end: u32,
    slot_seconds: u32,
    total_slots: usize,
}

impl SessionSlotIndexer {
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let (start, end) = config.window();
        let window_start = start.num_seconds_from_midnight();
        let window_end = end.num_seconds_from_midnight();
        let slot_seconds = config.slot_minutes * SECONDS_PER_MINUTE;
        let total_slots = (window_end - window_start).div_ceil(slot_seconds) as usize;

        Ok(Self {
            window_start,
            window_end,
            regular_start: config.regular_open.num_seconds_from_midnight(),
            regular_end: config.regular_close.num_seconds_from_midnight(),
            slot_seconds,
            total_slots,
            config,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn timezone(&self) -> Tz {
        self.config.timezone
    }

    /// Slot containing a wall-clock time, or `None` before the window opens or at/after it closes
    pub fn slot_for(&self, time: NaiveTime) -> Option<Slot> {
        let seconds = time.num_seconds_from_midnight();
        if seconds < self.window_start || seconds >= self.window_end {
            return None;
        }
        Some(((seconds - self.window_start) / self.slot_seconds) as Slot)
    }

    /// Slot for an instant, converted to exchange wall-clock time first
    pub fn slot_for_instant(&self, timestamp: DateTime<Utc>) -> Option<Slot> {
        self.slot_for(timestamp.with_timezone(&self.config.timezone).time())
    }

    pub fn total_slots(&self) -> usize {
        self.total_slots
    }

    /// Highest valid slot index
    pub fn max_slot(&self) -> Option<Slot> {
        self.total_slots.checked_sub(1)
    }

    /// Wall-clock start of a slot
    pub fn slot_start(&self, slot: Slot) -> Option<NaiveTime> {
        if slot >= self.total_slots {
            return None;
        }
        let seconds = self.window_start + slot as u32 * self.slot_seconds;
        NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0)
    }

    /// Sub-session a slot starts in. Regular-hours sessions report every slot as `Regular`.
    pub fn sub_session_of(&self, slot: Slot) -> Option<SubSession> {
        if slot >= self.total_slots {
            return None;
        }
        let start = self.window_start + slot as u32 * self.slot_seconds;
        let sub_session = if start < self.regular_start {
            SubSession::PreMarket
        } else if start < self.regular_end {
            SubSession::Regular
        } else {
            SubSession::PostMarket
        };
        Some(sub_session)
    }

    /// Per-sub-session slot counts, only meaningful for extended windows
    pub fn sub_session_slots(&self) -> Option<SubSessionSlots> {
        if !self.config.extended_hours {
            return None;
        }

        let mut counts = SubSessionSlots::default();
        for slot in 0..self.total_slots {
            match self.sub_session_of(slot) {
                Some(SubSession::PreMarket) => counts.pre_market += 1,
                Some(SubSession::Regular) => counts.regular += 1,
                Some(SubSession::PostMarket) => counts.post_market += 1,
                None => {}
            }
        }
        Some(counts)
    }
}
