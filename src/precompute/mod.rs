pub mod calculator;
pub mod errors;
pub mod local_client;
pub mod nightly;
pub mod precomputer;
pub mod source;

pub use calculator::{compute_slot_averages, DayRecordings};
pub use errors::PrecomputeError;
pub use local_client::LocalPrecomputeClient;
pub use nightly::{NightlyPrecomputeJob, NightlySummary};
pub use precomputer::{HistoricalAveragePrecomputer, PrecomputeSummary};
pub use source::{MemoryVolumeSource, VolumeSource};
