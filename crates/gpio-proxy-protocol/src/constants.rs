//! Protocol constants
//!
//! Sizes, markers and well-known values shared by the client and the
//! daemon side of the GPIO proxy protocol.

// ============================================================================
// Transport
// ============================================================================

/// UDP port the daemon listens on.
pub const DEFAULT_PORT: u16 = 5122;

// ============================================================================
// Frame Layout
// ============================================================================

/// Length of the fixed request header (op, marker, pad, write value, pin).
pub const REQUEST_HEADER_LEN: usize = 8;

/// Length of the reply the daemon sends back.
pub const RESPONSE_LEN: usize = 4;

/// Size of the owner label field in the daemon's packet struct.
pub const NAME_FIELD_LEN: usize = 16;

/// Longest owner label the daemon keeps. The last byte of the field is
/// always overwritten with a terminator.
pub const MAX_NAME_LEN: usize = NAME_FIELD_LEN - 1;

/// Largest datagram the daemon's packet struct can describe. Receive
/// buffers are sized to this.
pub const MAX_RESPONSE_LEN: usize = REQUEST_HEADER_LEN + NAME_FIELD_LEN;

/// Marker placed in the error slot of every request. The daemon ignores
/// datagrams that do not carry it.
pub const REQUEST_MARKER: u8 = 0xFF;

// ============================================================================
// Values
// ============================================================================

/// Value returned by `Request`, `ConfigureInput` and `ConfigureOutput` on
/// success.
pub const VALUE_OK: u8 = 1;

/// Error code meaning success.
pub const ERR_NONE: u8 = 0;

/// Error code the reference daemon returns when the kernel module rejects
/// the operation.
pub const ERR_IOCTL_FAILED: u8 = 4;

/// Highest pin id found on the boards the protocol was written for.
pub const HISTORICAL_MAX_PIN: u32 = 49;
