//! Driver error types.

use gpio_proxy_client::ClientError;
use thiserror::Error;

/// Errors returned by drivers.
#[derive(Debug, Error)]
pub enum DriverError {
    /// A pin operation failed.
    #[error("pin operation failed: {0}")]
    Pin(#[from] ClientError),

    /// Cursor position outside the display.
    #[error("position row {row}, column {col} is outside the display")]
    InvalidPosition {
        /// Requested row.
        row: u8,
        /// Requested column.
        col: u8,
    },

    /// The device was used before `init`.
    #[error("device not initialized")]
    NotInitialized,
}

/// Result type alias for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;
