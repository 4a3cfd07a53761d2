pub mod errors;
pub mod source;

pub use errors::PostgresError;
pub use source::{PostgresConfig, PostgresVolumeSource};
