/// Session Module
///
/// Maps wall-clock timestamps onto fixed-width time slots within the trading session so that
/// "the same point in the day" can be compared across sessions.
pub mod indexer;

pub use indexer::{SessionConfig, SessionSlotIndexer, Slot, SubSession, SubSessionSlots};
