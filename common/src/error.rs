//! Error handling for the taskgrade-common crate.

use thiserror::Error;

/// Common error type that abstracts over underlying library errors.
///
/// Every variant carries a human-readable message and, optionally, the
/// library error it was raised from so the full chain survives to the
/// operator's console.
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Invalid configuration: {message}")]
    ConfigurationError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Table store operation failed: {message}")]
    StorageError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("IO operation failed: {message}")]
    IoError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Table encoding failed: {message}")]
    SerializationError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Query failed: {message}")]
    QueryError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Table not found: {message}")]
    NotFoundError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Internal error: {message}")]
    InternalError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

/// Result type alias for common operations.
pub type Result<T> = std::result::Result<T, CommonError>;

/// Error severity levels for categorizing errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// The current fixture or query is lost, the run can continue
    Low,
    /// The current command must be aborted
    High,
    /// The harness itself is in an unexpected state
    Critical,
}

/// Error category for grouping related error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Table store and filesystem errors
    Infrastructure,
    /// Encoding and decoding of stored tables
    DataProcessing,
    /// Resource files and generator settings
    Configuration,
    /// Learner submissions (queries and functions)
    Submission,
    /// Internal logic errors
    Internal,
}

/// Trait for rich error diagnostics with operator-facing suggestions.
pub trait Diagnose {
    /// Get the error severity level.
    fn severity(&self) -> ErrorSeverity;

    /// Get the error category.
    fn category(&self) -> ErrorCategory;

    /// Get suggestions for resolving the error.
    fn suggestions(&self) -> Vec<String>;
}

impl CommonError {
    /// Create a configuration error with a custom message.
    pub fn configuration_error<S: Into<String>>(message: S) -> Self {
        Self::ConfigurationError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with a custom message and source error.
    pub fn configuration_error_with_source<S: Into<String>, E: Into<anyhow::Error>>(
        message: S,
        source: E,
    ) -> Self {
        Self::ConfigurationError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a storage error with a custom message.
    pub fn storage_error<S: Into<String>>(message: S) -> Self {
        Self::StorageError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a storage error with a custom message and source error.
    pub fn storage_error_with_source<S: Into<String>, E: Into<anyhow::Error>>(
        message: S,
        source: E,
    ) -> Self {
        Self::StorageError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create an IO error with a custom message.
    pub fn io_error<S: Into<String>>(message: S) -> Self {
        Self::IoError {
            message: message.into(),
            source: None,
        }
    }

    /// Create an IO error with a custom message and source error.
    pub fn io_error_with_source<S: Into<String>, E: Into<anyhow::Error>>(
        message: S,
        source: E,
    ) -> Self {
        Self::IoError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a serialization error with a custom message.
    pub fn serialization_error<S: Into<String>>(message: S) -> Self {
        Self::SerializationError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a serialization error with a custom message and source error.
    pub fn serialization_error_with_source<S: Into<String>, E: Into<anyhow::Error>>(
        message: S,
        source: E,
    ) -> Self {
        Self::SerializationError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a query error with a custom message.
    pub fn query_error<S: Into<String>>(message: S) -> Self {
        Self::QueryError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a query error with a custom message and source error.
    pub fn query_error_with_source<S: Into<String>, E: Into<anyhow::Error>>(
        message: S,
        source: E,
    ) -> Self {
        Self::QueryError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a not found error with a custom message.
    pub fn not_found_error<S: Into<String>>(message: S) -> Self {
        Self::NotFoundError {
            message: message.into(),
            source: None,
        }
    }

    /// Create an internal error with a custom message.
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::InternalError {
            message: message.into(),
            source: None,
        }
    }

    /// Create an internal error with a custom message and source error.
    pub fn internal_error_with_source<S: Into<String>, E: Into<anyhow::Error>>(
        message: S,
        source: E,
    ) -> Self {
        Self::InternalError {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl Diagnose for CommonError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            CommonError::ConfigurationError { .. } => ErrorSeverity::High,
            CommonError::StorageError { .. } => ErrorSeverity::High,
            CommonError::IoError { .. } => ErrorSeverity::High,
            CommonError::SerializationError { .. } => ErrorSeverity::High,
            CommonError::QueryError { .. } => ErrorSeverity::Low,
            CommonError::NotFoundError { .. } => ErrorSeverity::High,
            CommonError::InternalError { .. } => ErrorSeverity::Critical,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            CommonError::ConfigurationError { .. } => ErrorCategory::Configuration,
            CommonError::StorageError { .. } => ErrorCategory::Infrastructure,
            CommonError::IoError { .. } => ErrorCategory::Infrastructure,
            CommonError::SerializationError { .. } => ErrorCategory::DataProcessing,
            CommonError::QueryError { .. } => ErrorCategory::Submission,
            CommonError::NotFoundError { .. } => ErrorCategory::Infrastructure,
            CommonError::InternalError { .. } => ErrorCategory::Internal,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            CommonError::ConfigurationError { .. } => vec![
                "Check that data/task_names.json exists and is an array of string arrays"
                    .to_string(),
                "Review generator settings (ranges must be non-empty, probabilities in [0, 1])"
                    .to_string(),
            ],
            CommonError::StorageError { .. } => vec![
                "Check that the store directory exists and is writable".to_string(),
                "Regenerate the fixtures if the store was modified by hand".to_string(),
            ],
            CommonError::IoError { .. } => vec![
                "Check file system permissions and disk space".to_string(),
                "Verify file paths and accessibility".to_string(),
            ],
            CommonError::SerializationError { .. } => vec![
                "Regenerate the fixtures; a stored table could not be decoded".to_string(),
            ],
            CommonError::QueryError { .. } => vec![
                "Run the query by hand against a single dataset to see the full error"
                    .to_string(),
                "Make sure the query reads from the placeholder table `tasks`".to_string(),
            ],
            CommonError::NotFoundError { .. } => vec![
                "Run `taskgrade generate` (or `seed-orders`) to create the fixtures".to_string(),
            ],
            CommonError::InternalError { .. } => vec![
                "Report this issue with the command line that triggered it".to_string(),
            ],
        }
    }
}

/// Context helpers for attaching a categorized message to foreign errors.
pub mod context {
    use super::*;

    /// Extension trait for adding context to Results.
    pub trait ErrorContext<T> {
        /// Wrap the error as a storage error.
        fn with_storage_context<F>(self, f: F) -> Result<T>
        where
            F: FnOnce() -> String;

        /// Wrap the error as an IO error.
        fn with_io_context<F>(self, f: F) -> Result<T>
        where
            F: FnOnce() -> String;

        /// Wrap the error as a configuration error.
        fn with_config_context<F>(self, f: F) -> Result<T>
        where
            F: FnOnce() -> String;

        /// Wrap the error as a serialization error.
        fn with_serialization_context<F>(self, f: F) -> Result<T>
        where
            F: FnOnce() -> String;

        /// Wrap the error as a query error.
        fn with_query_context<F>(self, f: F) -> Result<T>
        where
            F: FnOnce() -> String;
    }

    impl<T, E> ErrorContext<T> for std::result::Result<T, E>
    where
        E: Into<anyhow::Error>,
    {
        fn with_storage_context<F>(self, f: F) -> Result<T>
        where
            F: FnOnce() -> String,
        {
            self.map_err(|e| CommonError::storage_error_with_source(f(), e.into()))
        }

        fn with_io_context<F>(self, f: F) -> Result<T>
        where
            F: FnOnce() -> String,
        {
            self.map_err(|e| CommonError::io_error_with_source(f(), e.into()))
        }

        fn with_config_context<F>(self, f: F) -> Result<T>
        where
            F: FnOnce() -> String,
        {
            self.map_err(|e| CommonError::configuration_error_with_source(f(), e.into()))
        }

        fn with_serialization_context<F>(self, f: F) -> Result<T>
        where
            F: FnOnce() -> String,
        {
            self.map_err(|e| CommonError::serialization_error_with_source(f(), e.into()))
        }

        fn with_query_context<F>(self, f: F) -> Result<T>
        where
            F: FnOnce() -> String,
        {
            self.map_err(|e| CommonError::query_error_with_source(f(), e.into()))
        }
    }
}

pub use context::ErrorContext;
