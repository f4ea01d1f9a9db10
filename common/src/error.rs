//! Error handling for the engine-verify crates.

use datafusion::arrow::error::ArrowError;
use datafusion::error::DataFusionError;
use std::backtrace::{Backtrace, BacktraceStatus};
use thiserror::Error;

/// Error type shared by the session layer and the verifier.
///
/// Every variant carries a human readable message and, where one exists, the
/// underlying library error so the full cause chain can be reported.
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Invalid configuration: {message}")]
    ConfigurationError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Session startup failed: {message}")]
    SessionStartupError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Session '{app_name}' has already been stopped")]
    SessionStoppedError { app_name: String },

    #[error("Query execution failed: {message}")]
    ExecutionError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Schema mismatch: {message}")]
    SchemaError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Session teardown failed: {message}")]
    TeardownError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

/// Result type alias for verifier operations.
pub type VerifyResult<T> = std::result::Result<T, VerifyError>;

/// Coarse grouping of errors, used as a structured field in log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad or unsupported settings
    Configuration,
    /// The engine could not be started or stopped
    Lifecycle,
    /// Planning or execution inside the engine
    Execution,
    /// Data did not have the expected shape
    Data,
}

impl VerifyError {
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

    /// Create a session startup error with a custom message.
    pub fn startup_error<S: Into<String>>(message: S) -> Self {
        Self::SessionStartupError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a session startup error with a custom message and source error.
    pub fn startup_error_with_source<S: Into<String>, E: Into<anyhow::Error>>(
        message: S,
        source: E,
    ) -> Self {
        Self::SessionStartupError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create an error for an operation issued against a stopped session.
    pub fn session_stopped<S: Into<String>>(app_name: S) -> Self {
        Self::SessionStoppedError {
            app_name: app_name.into(),
        }
    }

    /// Create an execution error with a custom message.
    pub fn execution_error<S: Into<String>>(message: S) -> Self {
        Self::ExecutionError {
            message: message.into(),
            source: None,
        }
    }

    /// Create an execution error with a custom message and source error.
    pub fn execution_error_with_source<S: Into<String>, E: Into<anyhow::Error>>(
        message: S,
        source: E,
    ) -> Self {
        Self::ExecutionError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a schema error with a custom message.
    pub fn schema_error<S: Into<String>>(message: S) -> Self {
        Self::SchemaError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a schema error with a custom message and source error.
    pub fn schema_error_with_source<S: Into<String>, E: Into<anyhow::Error>>(
        message: S,
        source: E,
    ) -> Self {
        Self::SchemaError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a teardown error with a custom message.
    pub fn teardown_error<S: Into<String>>(message: S) -> Self {
        Self::TeardownError {
            message: message.into(),
            source: None,
        }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigurationError { .. } => ErrorCategory::Configuration,
            Self::SessionStartupError { .. }
            | Self::SessionStoppedError { .. }
            | Self::TeardownError { .. } => ErrorCategory::Lifecycle,
            Self::ExecutionError { .. } => ErrorCategory::Execution,
            Self::SchemaError { .. } => ErrorCategory::Data,
        }
    }

    /// Backtrace captured when the underlying error was wrapped.
    ///
    /// `None` when there is no underlying error or `RUST_BACKTRACE` was not
    /// enabled at capture time.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        let source = match self {
            Self::ConfigurationError { source, .. }
            | Self::SessionStartupError { source, .. }
            | Self::ExecutionError { source, .. }
            | Self::SchemaError { source, .. }
            | Self::TeardownError { source, .. } => source.as_ref()?,
            Self::SessionStoppedError { .. } => return None,
        };
        let backtrace = source.backtrace();
        (backtrace.status() == BacktraceStatus::Captured).then_some(backtrace)
    }
}

impl From<DataFusionError> for VerifyError {
    fn from(err: DataFusionError) -> Self {
        match err {
            DataFusionError::SchemaError(..) => {
                VerifyError::schema_error_with_source("DataFusion schema error", err)
            }
            DataFusionError::Configuration(..) => VerifyError::configuration_error_with_source(
                "DataFusion rejected the configuration",
                err,
            ),
            DataFusionError::ResourcesExhausted(..) => VerifyError::execution_error_with_source(
                "DataFusion memory pool exhausted",
                err,
            ),
            other => VerifyError::execution_error_with_source("DataFusion error", other),
        }
    }
}

impl From<ArrowError> for VerifyError {
    fn from(err: ArrowError) -> Self {
        match err {
            ArrowError::SchemaError(..) | ArrowError::InvalidArgumentError(..) => {
                VerifyError::schema_error_with_source("Arrow rejected the record batch", err)
            }
            other => VerifyError::execution_error_with_source("Arrow error", other),
        }
    }
}

/// Context helpers for attaching a specific error kind to foreign results.
pub mod context {
    use super::*;

    /// Extension trait for adding context to Results.
    pub trait ErrorContext<T> {
        /// Wrap the error as a configuration error.
        fn with_config_context<F>(self, f: F) -> VerifyResult<T>
        where
            F: FnOnce() -> String;

        /// Wrap the error as a session startup error.
        fn with_startup_context<F>(self, f: F) -> VerifyResult<T>
        where
            F: FnOnce() -> String;

        /// Wrap the error as an execution error.
        fn with_execution_context<F>(self, f: F) -> VerifyResult<T>
        where
            F: FnOnce() -> String;
    }

    impl<T, E> ErrorContext<T> for std::result::Result<T, E>
    where
        E: Into<anyhow::Error>,
    {
        fn with_config_context<F>(self, f: F) -> VerifyResult<T>
        where
            F: FnOnce() -> String,
        {
            self.map_err(|e| VerifyError::configuration_error_with_source(f(), e.into()))
        }

        fn with_startup_context<F>(self, f: F) -> VerifyResult<T>
        where
            F: FnOnce() -> String,
        {
            self.map_err(|e| VerifyError::startup_error_with_source(f(), e.into()))
        }

        fn with_execution_context<F>(self, f: F) -> VerifyResult<T>
        where
            F: FnOnce() -> String,
        {
            self.map_err(|e| VerifyError::execution_error_with_source(f(), e.into()))
        }
    }
}

pub use context::ErrorContext;
