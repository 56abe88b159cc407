//! Error types for the Scaleway provider.

use crate::config::ConfigError;
use crate::provider::RequestError;
use thiserror::Error;

/// Errors raised by the Scaleway provider.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ScalewayProviderError {
    /// Raised when the configuration cannot support the requested call.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when a request is missing a required field.
    #[error("invalid request: {0}")]
    Validation(String),
    /// Raised when the HTTP exchange itself fails.
    #[error("provider error: {message}")]
    Provider {
        /// Message returned by the HTTP client.
        message: String,
    },
    /// Raised when the API answers with a non-success status.
    #[error("{operation} failed with HTTP {status}: {message}")]
    Api {
        /// Operation being performed (for example `list volumes`).
        operation: String,
        /// HTTP status code.
        status: u16,
        /// Response body returned by the API.
        message: String,
    },
    /// Raised when a response body cannot be parsed.
    #[error("failed to decode {operation} response: {message}")]
    Decode {
        /// Operation whose response was malformed.
        operation: String,
        /// Parser error message.
        message: String,
    },
    /// Raised when the instance does not exist in the configured zone.
    #[error("instance {instance_id} not found in zone {zone}")]
    InstanceNotFound {
        /// Instance identifier that was not found.
        instance_id: String,
        /// Zone where lookup was attempted.
        zone: String,
    },
    /// Raised when a device slot cannot receive a volume.
    #[error("cannot attach to device {device} on instance {instance_id}: {reason}")]
    InvalidDevice {
        /// Requested device slot.
        device: String,
        /// Target instance.
        instance_id: String,
        /// Why the slot was rejected.
        reason: String,
    },
}

impl From<reqwest::Error> for ScalewayProviderError {
    fn from(value: reqwest::Error) -> Self {
        Self::Provider {
            message: value.to_string(),
        }
    }
}

impl From<RequestError> for ScalewayProviderError {
    fn from(value: RequestError) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<ConfigError> for ScalewayProviderError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}
