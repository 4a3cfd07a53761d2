/// Shared LMDB configuration so every store opened by the service uses identical environment options
use heed::{Env, EnvOpenOptions};
use std::path::Path;
use crate::common::constants::{LMDB_ENV_CREATION_CONTEXT, LMDB_MAP_SIZE, LMDB_MAX_DBS, LMDB_MAX_READERS};
use crate::common::error_utils::{map_dir_creation_error, ErrorContext};
use crate::historical::errors::StoreError;

/// Open an LMDB environment with consistent configuration.
/// Reopening an environment with different options fails inside heed, so all callers go through here.
pub fn open_lmdb_environment(path: &Path) -> Result<Env, StoreError> {
    std::fs::create_dir_all(path).map_err(map_dir_creation_error(path))?;
    unsafe {
        EnvOpenOptions::new()
            .map_size(LMDB_MAP_SIZE)
            .max_dbs(LMDB_MAX_DBS)
            .max_readers(LMDB_MAX_READERS)
            .open(path)
            .with_db_context(&format!("{} at: {}", LMDB_ENV_CREATION_CONTEXT, path.display()))
    }
}

/// Get the shared LMDB configuration values for validation or logging
pub fn get_lmdb_config() -> (usize, u32, u32) {
    (LMDB_MAP_SIZE, LMDB_MAX_DBS, LMDB_MAX_READERS)
}
