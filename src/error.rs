//! Error types and handling for the charging controller
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting. Only
//! [`ChargerError::ConfigInvalid`] is fatal; the control loop absorbs every
//! other kind and turns it into a fail-safe cycle.

use thiserror::Error;

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, ChargerError>;

/// Main error type for the controller
#[derive(Debug, Error)]
pub enum ChargerError {
    /// Configuration could not be loaded
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Configuration loaded but is not usable
    #[error("Invalid configuration: {field} - {message}")]
    ConfigInvalid { field: String, message: String },

    /// A telemetry read failed or returned an unknown value
    #[error("Telemetry unavailable: {field} - {message}")]
    TelemetryUnavailable { field: String, message: String },

    /// A write to the external system was rejected or timed out
    #[error("Actuation failed: {entity} - {message}")]
    ActuationFailed { entity: String, message: String },

    /// Network-related errors
    #[error("Network error: {message}")]
    Network { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// HTTP/Web server errors
    #[error("Web server error: {message}")]
    Web { message: String },
}

impl ChargerError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        ChargerError::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error for a configuration field
    pub fn validation<F: Into<String>, S: Into<String>>(field: F, message: S) -> Self {
        ChargerError::ConfigInvalid {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new telemetry error for a named field
    pub fn telemetry<F: Into<String>, S: Into<String>>(field: F, message: S) -> Self {
        ChargerError::TelemetryUnavailable {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new actuation error for an entity
    pub fn actuation<E: Into<String>, S: Into<String>>(entity: E, message: S) -> Self {
        ChargerError::ActuationFailed {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        ChargerError::Network {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        ChargerError::Io {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        ChargerError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new web error
    pub fn web<S: Into<String>>(message: S) -> Self {
        ChargerError::Web {
            message: message.into(),
        }
    }

    /// Whether this error must stop the process before the loop starts
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ChargerError::Config { .. } | ChargerError::ConfigInvalid { .. }
        )
    }
}

impl From<std::io::Error> for ChargerError {
    fn from(err: std::io::Error) -> Self {
        ChargerError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for ChargerError {
    fn from(err: serde_yaml::Error) -> Self {
        ChargerError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ChargerError {
    fn from(err: serde_json::Error) -> Self {
        ChargerError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "home-assistant")]
impl From<reqwest::Error> for ChargerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChargerError::timeout(err.to_string())
        } else {
            ChargerError::network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ChargerError::config("test config error");
        assert!(matches!(err, ChargerError::Config { .. }));

        let err = ChargerError::telemetry("vehicle_soc", "unknown");
        assert!(matches!(err, ChargerError::TelemetryUnavailable { .. }));

        let err = ChargerError::validation("charger.min_amps", "too large");
        assert!(matches!(err, ChargerError::ConfigInvalid { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = ChargerError::config("test error");
        assert_eq!(format!("{}", err), "Configuration error: test error");

        let err = ChargerError::validation("charger.min_amps", "must not exceed max_amps");
        assert_eq!(
            format!("{}", err),
            "Invalid configuration: charger.min_amps - must not exceed max_amps"
        );
    }

    #[test]
    fn only_config_errors_are_fatal() {
        assert!(ChargerError::validation("x", "y").is_fatal());
        assert!(ChargerError::config("x").is_fatal());
        assert!(!ChargerError::telemetry("x", "y").is_fatal());
        assert!(!ChargerError::actuation("x", "y").is_fatal());
        assert!(!ChargerError::timeout("x").is_fatal());
    }
}
