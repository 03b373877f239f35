// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error type shared by every layer of the router.
//!
//! Store errors are classified once, in [`From<RedisError>`], and then
//! surfaced unchanged. Nothing in this crate retries or rolls back an
//! operation after it has been issued.

use redis::{ErrorKind, RedisError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KvError {
    /// No store handle is live: `initialize` was never called, or the
    /// client has been shut down.
    #[error("Client is not initialized")]
    UninitializedClient,

    /// The store rejected a key, field, value or TTL.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Network or topology failure talking to the store.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration could not be turned into a connection.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The store answered with a reply of an unexpected shape.
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),
}

impl KvError {
    /// True for failures of the transport rather than of the request.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<RedisError> for KvError {
    fn from(err: RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_timeout()
            || err.is_cluster_error()
        {
            return Self::Connection(err.to_string());
        }

        match err.kind() {
            ErrorKind::InvalidClientConfig => Self::Config(err.to_string()),
            ErrorKind::TypeError => Self::UnexpectedReply(err.to_string()),
            ErrorKind::ClusterDown
            | ErrorKind::MasterDown
            | ErrorKind::TryAgain
            | ErrorKind::BusyLoadingError
            | ErrorKind::AuthenticationFailed => Self::Connection(err.to_string()),
            _ => Self::InvalidArgument(err.to_string()),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, KvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_error_is_invalid_argument() {
        let err = RedisError::from((ErrorKind::ResponseError, "ERR value is not an integer"));
        assert!(matches!(KvError::from(err), KvError::InvalidArgument(_)));
    }

    #[test]
    fn test_io_error_is_connection() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = KvError::from(RedisError::from(io));
        assert!(err.is_connection());
    }

    #[test]
    fn test_type_error_is_unexpected_reply() {
        let err = RedisError::from((ErrorKind::TypeError, "Response was of incompatible type"));
        assert!(matches!(KvError::from(err), KvError::UnexpectedReply(_)));
    }

    #[test]
    fn test_invalid_client_config_is_config() {
        let err = RedisError::from((ErrorKind::InvalidClientConfig, "bad url"));
        assert!(matches!(KvError::from(err), KvError::Config(_)));
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(KvError::UninitializedClient.to_string(), "Client is not initialized");
        assert_eq!(
            KvError::Connection("refused".into()).to_string(),
            "Connection error: refused"
        );
    }
}
