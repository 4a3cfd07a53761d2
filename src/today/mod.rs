/// Today's Volume Module
///
/// In-memory, per-symbol, per-slot store of the latest accumulated volume and VWAP seen during
/// the current session. Cleared only by an explicit daily reset.
pub mod cache;

pub use cache::{SlotVolume, TodayVolumeCache};
