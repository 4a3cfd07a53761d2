use crate::historical::errors::StoreError;

/// Common error mapping utilities to reduce repetitive .map_err() patterns
/// Map directory creation errors with context
pub fn map_dir_creation_error(path: &std::path::Path) -> impl Fn(std::io::Error) -> StoreError + '_ {
    let path_str = path.display().to_string();
    move |e| StoreError::DirectoryCreation(format!("Failed to create directory '{}': {}", path_str, e))
}

/// Helper trait for chaining error conversions
pub trait ErrorContext<T> {
    fn with_db_context(self, context: &str) -> Result<T, StoreError>;
}

impl<T> ErrorContext<T> for Result<T, heed::Error> {
    fn with_db_context(self, context: &str) -> Result<T, StoreError> {
        self.map_err(|e| StoreError::Database(format!("{}: {}", context, e)))
    }
}

impl<T> ErrorContext<T> for Result<T, tokio::task::JoinError> {
    fn with_db_context(self, context: &str) -> Result<T, StoreError> {
        self.map_err(|e| StoreError::TaskJoin(format!("{}: {}", context, e)))
    }
}
