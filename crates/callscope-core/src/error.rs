//! Error types for the CallScope dashboard

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the CallScope dashboard
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// A value failed validation
    #[error("Validation error: {field} - {message}")]
    Validation {
        /// Field that failed validation
        field: String,
        /// Validation error message
        message: String,
    },

    /// The request never produced a response (connection, timeout, DNS)
    #[error("Transport error: {message}")]
    Transport {
        /// Error message
        message: String,
    },

    /// The backend answered with a non-success status
    #[error("API returned {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message
        message: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create an API status error
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Whether a later attempt could plausibly succeed.
    ///
    /// Nothing in the dashboard retries on its own; callers use this to
    /// decide whether to surface a "try again" affordance.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::error::Error as StdError;

    #[test]
    fn test_configuration_error() {
        let error = Error::configuration("missing api.base_url");
        assert_eq!(
            error.to_string(),
            "Configuration error: missing api.base_url"
        );
    }

    #[test]
    fn test_validation_error() {
        let error = Error::validation("dashboard.transcripts_page_size", "must be at least 1");
        assert_eq!(
            error.to_string(),
            "Validation error: dashboard.transcripts_page_size - must be at least 1"
        );
    }

    #[test]
    fn test_api_error_display() {
        let error = Error::api(503, "Service Unavailable");
        assert_eq!(error.to_string(), "API returned 503: Service Unavailable");
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::transport("connection reset").is_transient());
        assert!(Error::api(502, "Bad Gateway").is_transient());
        assert!(Error::api(429, "Too Many Requests").is_transient());
        assert!(!Error::api(404, "Not Found").is_transient());
        assert!(!Error::configuration("bad").is_transient());
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{not json}").unwrap_err();
        let error = Error::from(json_error);

        assert!(matches!(error, Error::Serialization(_)));
        assert!(error.source().is_some());
    }

    #[test]
    fn test_io_error_conversion() {
        let error = Error::from(io::Error::new(io::ErrorKind::NotFound, "config.toml"));
        assert!(error.to_string().starts_with("I/O error"));
        assert!(error.source().is_some());
    }

    #[test]
    fn test_error_source_for_message_variants() {
        assert!(Error::transport("timeout").source().is_none());
        assert!(Error::Other("anything".to_string()).source().is_none());
    }
}
