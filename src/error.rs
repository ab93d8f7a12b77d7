//! Error types for flakebench.
//!
//! Three classes of failure flow through the bench: configuration errors
//! (rejected at construction, never at request time), expected trial faults
//! (raised by the flow driver, caught per trial and classified — see
//! [`crate::driver::DriverError`]), and infrastructure errors that abort a
//! run before any trial executes.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for flakebench operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for flakebench.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Delay injector rejected its configuration.
    #[error("Invalid delay configuration: {0}")]
    InvalidDelayConfig(String),

    /// An environment variable failed to parse or validate.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidConfig {
        /// Configuration key (environment variable name)
        key: String,
        /// Error message
        message: String,
    },

    /// Generic configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // Infrastructure Errors
    // ========================================================================
    /// Target instance failed its pre-flight health check.
    #[error("Health check failed for '{url}': {message}")]
    HealthCheck {
        /// Health endpoint that was probed
        url: String,
        /// Error message
        message: String,
    },

    /// The mock service failed to bind or serve.
    #[error("Mock service error: {0}")]
    Service(String),

    // ========================================================================
    // IO / Serialization Errors
    // ========================================================================
    /// Artifact or log file not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new invalid-config error.
    pub fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a new health-check error.
    pub fn health_check(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HealthCheck {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Returns the error code for CLI exit status.
    ///
    /// Trial failures are data, not process errors; only configuration and
    /// infrastructure failures surface here.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidDelayConfig(_) | Error::InvalidConfig { .. } | Error::Config(_) => 2,
            Error::HealthCheck { .. } => 3,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_by_class() {
        assert_eq!(Error::Config("bad".into()).exit_code(), 2);
        assert_eq!(
            Error::invalid_config("DELAY_PROB", "must be within [0.0, 1.0]").exit_code(),
            2
        );
        assert_eq!(
            Error::health_check("http://127.0.0.1:8004/health", "connection refused").exit_code(),
            3
        );
        assert_eq!(Error::Internal("oops".into()).exit_code(), 1);
    }

    #[test]
    fn display_includes_key() {
        let err = Error::invalid_config("DELAY_MIN_MS", "not an integer");
        assert!(err.to_string().contains("DELAY_MIN_MS"));
    }
}
