/// RVOL Module
///
/// Relative volume: today's accumulated volume at a slot divided by the historical average
/// accumulated volume at the same slot.
pub mod calculator;
pub mod errors;
pub mod structs;

pub use calculator::RvolCalculator;
pub use errors::RvolError;
pub use structs::{RvolResult, RvolSettings};
