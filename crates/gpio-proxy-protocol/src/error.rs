//! Protocol error types.

use thiserror::Error;

use crate::constants::ERR_IOCTL_FAILED;

/// Errors that can occur when working with the GPIO proxy protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Response is shorter than the fixed reply header.
    #[error("malformed frame: expected at least {expected} bytes, got {actual}")]
    MalformedFrame {
        /// Expected minimum length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Request is shorter than the fixed request header.
    #[error("truncated request: expected at least {expected} bytes, got {actual}")]
    Truncated {
        /// Expected minimum length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Operation byte is not one of the known codes.
    #[error("unknown operation code: 0x{0:02X}")]
    UnknownOperation(u8),
}

/// Error codes returned by the daemon.
///
/// The protocol only defines zero as success. The reference daemon uses a
/// single failure code; anything else is passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DaemonErrorCode {
    /// The kernel module refused the operation.
    IoctlFailed,
    /// Daemon-defined code with no documented meaning.
    Unknown(u8),
}

impl std::fmt::Display for DaemonErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonErrorCode::IoctlFailed => write!(f, "ioctl failed"),
            DaemonErrorCode::Unknown(code) => write!(f, "unknown error ({})", code),
        }
    }
}

impl From<u8> for DaemonErrorCode {
    fn from(code: u8) -> Self {
        match code {
            ERR_IOCTL_FAILED => DaemonErrorCode::IoctlFailed,
            _ => DaemonErrorCode::Unknown(code),
        }
    }
}

impl From<DaemonErrorCode> for u8 {
    fn from(code: DaemonErrorCode) -> Self {
        match code {
            DaemonErrorCode::IoctlFailed => ERR_IOCTL_FAILED,
            DaemonErrorCode::Unknown(code) => code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::MalformedFrame {
            expected: 4,
            actual: 2,
        };
        assert!(err.to_string().contains("got 2"));

        let err = ProtocolError::UnknownOperation(b'X');
        assert_eq!(err.to_string(), "unknown operation code: 0x58");
    }

    #[test]
    fn test_daemon_error_code_mapping() {
        assert_eq!(DaemonErrorCode::from(4), DaemonErrorCode::IoctlFailed);
        assert_eq!(DaemonErrorCode::from(7), DaemonErrorCode::Unknown(7));
        assert_eq!(u8::from(DaemonErrorCode::IoctlFailed), 4);
        assert_eq!(u8::from(DaemonErrorCode::Unknown(9)), 9);
    }
}
