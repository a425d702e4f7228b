//! Error types for the log trace bridge.
//!
//! This module defines the centralized error type [`BridgeError`] and a type alias
//! [`Result`] for convenient error handling throughout the bridge. All errors are
//! implemented using the `thiserror` crate for automatic `Error` trait implementation.
//!
//! None of these errors ever reach the instrumented application through a logging
//! call. They are produced and consumed inside the bridge: the interceptor boundary
//! converts every one of them into a diagnostic counter increment.

use thiserror::Error;

/// The main error type for bridge operations.
///
/// The first five variants mirror the fault taxonomy the bridge reports on:
/// configuration, conflicts with co-resident modules, translation, backpressure
/// and context-scope misuse. The remaining variants wrap errors from the crates
/// the bridge builds on.
///
/// # Examples
///
/// ```
/// use log_trace_bridge::BridgeError;
///
/// fn validate_prefix(prefix: &str) -> Result<(), BridgeError> {
///     if prefix.is_empty() {
///         return Err(BridgeError::Configuration(
///             "diagnostic_context_key_prefix must not be empty".to_string(),
///         ));
///     }
///     Ok(())
/// }
///
/// assert!(validate_prefix("").is_err());
/// ```
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A configuration value was rejected at install time.
    ///
    /// Reported once when the module installs; the offending value is replaced
    /// with its default.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Another instrumentation module already claims the diagnostic-context keys.
    ///
    /// Non-fatal: the losing module stays installed but passes every call through.
    #[error("Conflict: key prefix `{prefix}` is already claimed by `{owner}`")]
    Conflict {
        /// The contested diagnostic-context key prefix.
        prefix: String,
        /// Module name of the current claim holder.
        owner: String,
    },

    /// An intercepted legacy event had a shape the translator cannot map.
    #[error("Translation error: {0}")]
    Translation(String),

    /// The telemetry pipeline did not accept a record within the timeout.
    #[error("Backpressure: {0}")]
    Backpressure(String),

    /// A context scope was released out of LIFO order.
    ///
    /// `expected_depth` is the stack depth the released guard was created at;
    /// `actual_depth` is the depth of the stack at release time.
    #[error("Context scope released out of order (expected depth {expected_depth}, found {actual_depth})")]
    ScopeOrder {
        /// Depth the released guard was pushed at.
        expected_depth: usize,
        /// Depth of the thread's context stack when release happened.
        actual_depth: usize,
    },

    /// The diagnostic context refused a read or write.
    #[error("Diagnostic context error: {0}")]
    DiagnosticContext(String),

    /// Filesystem or I/O operation failed.
    ///
    /// Wraps errors from standard library I/O operations. Automatically converts
    /// from `std::io::Error` using the `#[from]` attribute.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A TOML configuration document could not be parsed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The wrapped logger could not be installed into the `log` facade.
    ///
    /// The facade accepts exactly one logger per process; this fires when the
    /// application installed its own logger before the bridge.
    #[error("Logger install error: {0}")]
    LoggerInstall(String),
}

impl From<log::SetLoggerError> for BridgeError {
    fn from(e: log::SetLoggerError) -> Self {
        Self::LoggerInstall(e.to_string())
    }
}

/// A specialized `Result` type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
