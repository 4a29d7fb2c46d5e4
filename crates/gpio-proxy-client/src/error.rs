//! Error types for the client runtime.

use std::time::Duration;

use gpio_proxy_protocol::{DaemonErrorCode, Operation, ProtocolError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors returned by [`ProxyClient`](crate::ProxyClient) and
/// [`PinManager`](crate::PinManager).
#[derive(Debug, Error)]
pub enum ClientError {
    /// Socket failure.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// The reply could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Connection settings could not be used.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The daemon answered with a non-zero error code.
    #[error("daemon rejected {op} on pin {pin}: {code}")]
    RemoteError {
        /// Operation that failed.
        op: Operation,
        /// Pin it was addressed to.
        pin: u32,
        /// Code from the reply.
        code: DaemonErrorCode,
    },

    /// The pin is owned by someone else or does not exist.
    #[error("pin {0} not available")]
    PinUnavailable(u32),

    /// The pin's direction could not be changed.
    #[error("pin {0} cannot be configured")]
    PinConfigError(u32),

    /// The pin was used without being claimed by this process.
    #[error("pin {0} is not claimed")]
    NotClaimed(u32),

    /// The pin is already claimed by this process.
    #[error("pin {0} is already claimed")]
    AlreadyClaimed(u32),

    /// No matching reply arrived before the deadline.
    #[error("no reply to {op} on pin {pin} within {after:?}")]
    Timeout {
        /// Operation that was abandoned.
        op: Operation,
        /// Pin it was addressed to.
        pin: u32,
        /// How long the client waited.
        after: Duration,
    },
}

impl ClientError {
    /// Whether the reply was shorter than the fixed header.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            ClientError::Protocol(ProtocolError::MalformedFrame { .. })
        )
    }

    /// Raw daemon error code, for [`ClientError::RemoteError`].
    pub fn remote_code(&self) -> Option<u8> {
        match self {
            ClientError::RemoteError { code, .. } => Some((*code).into()),
            _ => None,
        }
    }

    /// Whether the error was raised locally without contacting the daemon.
    pub fn is_local_guard(&self) -> bool {
        matches!(
            self,
            ClientError::NotClaimed(_) | ClientError::AlreadyClaimed(_)
        )
    }
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClientError::RemoteError {
            op: Operation::Set,
            pin: 3,
            code: DaemonErrorCode::from(4),
        };
        assert_eq!(err.to_string(), "daemon rejected set on pin 3: ioctl failed");
        assert_eq!(err.remote_code(), Some(4));

        let err = ClientError::PinUnavailable(5);
        assert_eq!(err.to_string(), "pin 5 not available");
        assert_eq!(err.remote_code(), None);
    }

    #[test]
    fn test_classification() {
        let err = ClientError::from(ProtocolError::MalformedFrame {
            expected: 4,
            actual: 1,
        });
        assert!(err.is_malformed());
        assert!(!err.is_local_guard());
        assert!(ClientError::NotClaimed(1).is_local_guard());
    }
}
