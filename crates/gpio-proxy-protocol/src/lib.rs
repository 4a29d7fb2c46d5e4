//! GPIO Proxy Datagram Protocol
//!
//! This crate provides the wire types for talking to a `gpio-proxyd` daemon.
//! The daemon runs on a small embedded Linux device and relays single-pin
//! operations (read, write, request, free, set direction) into the kernel
//! GPIO layer on behalf of a host on the network.
//!
//! # Protocol Overview
//!
//! Every exchange is one UDP datagram each way:
//!
//! - **Requests** (host → daemon): an 8-byte header followed, for
//!   [`Operation::Request`] only, by a NUL-terminated owner label.
//! - **Responses** (daemon → host): a 4-byte reply echoing the operation code
//!   with an error byte and a value byte.
//!
//! There is no sequence number, no checksum and no authentication. Anyone who
//! can reach the daemon's port can drive its pins.
//!
//! # Example
//!
//! ```rust
//! use gpio_proxy_protocol::{Operation, RequestFrame, ResponseFrame};
//!
//! let frame = RequestFrame::request(12, "HD_RS");
//! let datagram = frame.encode();
//! assert_eq!(datagram[0], b'R');
//! assert_eq!(datagram.last(), Some(&0));
//!
//! let reply = ResponseFrame::decode(&[b'R', 0, 1, 0]).unwrap();
//! assert_eq!(reply.operation, Operation::Request);
//! assert_eq!(reply.value, 1);
//! ```

mod constants;
mod error;
mod frame;
mod operation;

pub use constants::*;
pub use error::*;
pub use frame::*;
pub use operation::*;
