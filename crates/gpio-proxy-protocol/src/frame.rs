//! Frame encoding/decoding.
//!
//! Requests and responses share the layout of the daemon's packet struct.
//! A request fills the whole header; the daemon answers with the first four
//! bytes of the same struct after filling in the error and value slots.
//!
//! ```text
//! request:
//! +----+------+-----+------+---------------+----------------------+
//! | op | 0xFF | pad | wval | pin (u32 LE)  | name + NUL (R only)  |
//! +----+------+-----+------+---------------+----------------------+
//!
//! response:
//! +---------+-------+-------+----------+
//! | op echo | error | value | reserved |
//! +---------+-------+-------+----------+
//! ```

use bytes::{Buf, BufMut};

use crate::constants::{REQUEST_HEADER_LEN, REQUEST_MARKER, RESPONSE_LEN};
use crate::error::ProtocolError;
use crate::operation::Operation;

// ============================================================================
// Request
// ============================================================================

/// A request sent from the host to the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    /// Operation to perform.
    pub operation: Operation,
    /// Value to write (`Set`) or initial level (`ConfigureOutput`).
    pub write_value: u8,
    /// Pin id.
    pub pin: u32,
    /// Owner label, only carried by `Request`.
    pub name: Option<String>,
}

impl RequestFrame {
    /// Build a request frame.
    pub fn new(operation: Operation, write_value: u8, pin: u32) -> Self {
        RequestFrame {
            operation,
            write_value,
            pin,
            name: None,
        }
    }

    /// Read the value of `pin`.
    pub fn get(pin: u32) -> Self {
        Self::new(Operation::Get, 0, pin)
    }

    /// Drive `pin` to `value`.
    pub fn set(pin: u32, value: u8) -> Self {
        Self::new(Operation::Set, value, pin)
    }

    /// Claim `pin` under `name`.
    pub fn request(pin: u32, name: impl Into<String>) -> Self {
        RequestFrame {
            name: Some(name.into()),
            ..Self::new(Operation::Request, 0, pin)
        }
    }

    /// Release `pin`.
    pub fn free(pin: u32) -> Self {
        Self::new(Operation::Free, 0, pin)
    }

    /// Make `pin` an input.
    pub fn configure_input(pin: u32) -> Self {
        Self::new(Operation::ConfigureInput, 0, pin)
    }

    /// Make `pin` an output starting at `initial`.
    pub fn configure_output(pin: u32, initial: u8) -> Self {
        Self::new(Operation::ConfigureOutput, initial, pin)
    }

    /// Encode the frame into a datagram.
    ///
    /// The owner label is written for `Request` frames only and always ends
    /// in exactly one NUL: one is appended unless the label already ends
    /// with it.
    pub fn encode(&self) -> Vec<u8> {
        let name = match (self.operation, &self.name) {
            (Operation::Request, Some(name)) => name.as_bytes(),
            (Operation::Request, None) => &[][..],
            _ => {
                if self.name.is_some() {
                    log::debug!("ignoring owner label on {} frame", self.operation);
                }
                return self.encode_header();
            }
        };

        let mut buf = Vec::with_capacity(REQUEST_HEADER_LEN + name.len() + 1);
        buf.extend_from_slice(&self.encode_header());
        buf.extend_from_slice(name);
        if name.last() != Some(&0) {
            buf.push(0);
        }
        buf
    }

    fn encode_header(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(REQUEST_HEADER_LEN);
        buf.put_u8(self.operation.code());
        buf.put_u8(REQUEST_MARKER);
        buf.put_u8(0);
        buf.put_u8(self.write_value);
        buf.put_u32_le(self.pin);
        buf
    }

    /// Decode a request datagram, as the daemon would.
    ///
    /// The label stops at the first NUL; invalid UTF-8 is replaced.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < REQUEST_HEADER_LEN {
            return Err(ProtocolError::Truncated {
                expected: REQUEST_HEADER_LEN,
                actual: data.len(),
            });
        }

        let mut buf = data;
        let operation = Operation::try_from(buf.get_u8())?;
        let _marker = buf.get_u8();
        let _pad = buf.get_u8();
        let write_value = buf.get_u8();
        let pin = buf.get_u32_le();

        let name = if operation == Operation::Request {
            let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
            Some(String::from_utf8_lossy(&buf[..end]).into_owned())
        } else {
            None
        };

        Ok(RequestFrame {
            operation,
            write_value,
            pin,
            name,
        })
    }

    /// Whether `data` carries the request marker the daemon checks for.
    pub fn has_marker(data: &[u8]) -> bool {
        data.len() >= REQUEST_HEADER_LEN && data[1] == REQUEST_MARKER
    }
}

/// Encode a request datagram from its parts.
pub fn encode_request(
    operation: Operation,
    write_value: u8,
    pin: u32,
    name: Option<&str>,
) -> Vec<u8> {
    RequestFrame {
        operation,
        write_value,
        pin,
        name: name.map(str::to_string),
    }
    .encode()
}

// ============================================================================
// Response
// ============================================================================

/// A reply sent from the daemon back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseFrame {
    /// Echo of the request operation.
    pub operation: Operation,
    /// Zero on success, daemon-defined otherwise.
    pub error: u8,
    /// Value read back, or the success flag for request/configure.
    pub value: u8,
}

impl ResponseFrame {
    /// Build a response frame.
    pub fn new(operation: Operation, error: u8, value: u8) -> Self {
        ResponseFrame {
            operation,
            error,
            value,
        }
    }

    /// Decode a response datagram.
    ///
    /// Only the first four bytes are read; anything after them is ignored.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < RESPONSE_LEN {
            return Err(ProtocolError::MalformedFrame {
                expected: RESPONSE_LEN,
                actual: data.len(),
            });
        }
        if data.len() > RESPONSE_LEN {
            log::trace!("ignoring {} trailing response bytes", data.len() - RESPONSE_LEN);
        }

        let mut buf = &data[..RESPONSE_LEN];
        let operation = Operation::try_from(buf.get_u8())?;
        let error = buf.get_u8();
        let value = buf.get_u8();

        Ok(ResponseFrame {
            operation,
            error,
            value,
        })
    }

    /// Encode the reply, as the daemon would.
    pub fn encode(&self) -> [u8; RESPONSE_LEN] {
        [self.operation.code(), self.error, self.value, 0]
    }

    /// Whether the daemon reported success.
    pub fn is_ok(&self) -> bool {
        self.error == 0
    }
}

/// Decode a response datagram into `(operation, error code, value)`.
pub fn decode_response(data: &[u8]) -> Result<(Operation, u8, u8), ProtocolError> {
    let frame = ResponseFrame::decode(data)?;
    Ok((frame.operation, frame.error, frame.value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_RESPONSE_LEN;

    #[test]
    fn test_encode_header_layout() {
        let encoded = RequestFrame::set(0x0102_0304, 1).encode();
        assert_eq!(encoded, vec![b'S', 0xFF, 0, 1, 0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_encode_request_appends_single_nul() {
        let encoded = RequestFrame::request(12, "HD_RS").encode();
        assert_eq!(&encoded[..8], &[b'R', 0xFF, 0, 0, 12, 0, 0, 0]);
        assert_eq!(&encoded[8..], b"HD_RS\0");
    }

    #[test]
    fn test_encode_request_keeps_existing_nul() {
        let encoded = encode_request(Operation::Request, 0, 3, Some("LED\0"));
        assert_eq!(&encoded[8..], b"LED\0");

        let nuls = encoded.iter().rev().take_while(|&&b| b == 0).count();
        assert_eq!(nuls, 1);
    }

    #[test]
    fn test_names_always_end_in_exactly_one_nul() {
        for name in ["", "\0", "X", "TEMP_PIN", "TEMP_PIN\0", "a-rather-long-owner-label"] {
            let encoded = RequestFrame::request(5, name).encode();
            assert_eq!(encoded.last(), Some(&0), "name {:?}", name);
            let body = &encoded[REQUEST_HEADER_LEN..];
            assert_eq!(body.iter().filter(|&&b| b == 0).count(), 1, "name {:?}", name);
        }
    }

    #[test]
    fn test_name_only_on_request() {
        let mut frame = RequestFrame::get(7);
        frame.name = Some("ignored".to_string());
        assert_eq!(frame.encode().len(), REQUEST_HEADER_LEN);
    }

    #[test]
    fn test_request_decode() {
        let encoded = RequestFrame::request(21, "HD_DB7").encode();
        assert!(RequestFrame::has_marker(&encoded));

        let decoded = RequestFrame::decode(&encoded).unwrap();
        assert_eq!(decoded.operation, Operation::Request);
        assert_eq!(decoded.pin, 21);
        assert_eq!(decoded.name.as_deref(), Some("HD_DB7"));

        let decoded = RequestFrame::decode(&RequestFrame::configure_output(9, 1).encode()).unwrap();
        assert_eq!(decoded, RequestFrame::configure_output(9, 1));
    }

    #[test]
    fn test_request_decode_truncated() {
        let err = RequestFrame::decode(&[b'G', 0xFF, 0]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Truncated {
                expected: 8,
                actual: 3
            }
        );
        assert!(!RequestFrame::has_marker(&[b'G', 0xFF, 0]));
    }

    #[test]
    fn test_echo_recovers_operation_and_value() {
        for op in Operation::ALL {
            for value in [0u8, 1, 0x7F, 0xFF] {
                for pin in [0u32, 12, 49, u32::MAX] {
                    let request = RequestFrame::decode(
                        &encode_request(op, value, pin, Some("P")),
                    )
                    .unwrap();
                    let echo = ResponseFrame::new(request.operation, 0, request.write_value);
                    let (decoded_op, err, decoded_value) = decode_response(&echo.encode()).unwrap();
                    assert_eq!(decoded_op, op);
                    assert_eq!(err, 0);
                    assert_eq!(decoded_value, value);
                }
            }
        }
    }

    #[test]
    fn test_response_decode_short() {
        for len in 0..RESPONSE_LEN {
            let data = vec![b'G'; len];
            assert_eq!(
                ResponseFrame::decode(&data),
                Err(ProtocolError::MalformedFrame {
                    expected: RESPONSE_LEN,
                    actual: len
                })
            );
        }
    }

    #[test]
    fn test_response_decode_ignores_trailing() {
        let mut data = vec![b'G', 0, 1, 0];
        data.resize(MAX_RESPONSE_LEN, 0xAA);
        let frame = ResponseFrame::decode(&data).unwrap();
        assert_eq!(frame, ResponseFrame::new(Operation::Get, 0, 1));
        assert!(frame.is_ok());
    }

    #[test]
    fn test_response_decode_unknown_operation() {
        assert_eq!(
            ResponseFrame::decode(&[b'Z', 0, 0, 0]),
            Err(ProtocolError::UnknownOperation(b'Z'))
        );
    }
}
