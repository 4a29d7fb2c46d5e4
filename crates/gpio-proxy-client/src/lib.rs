//! GPIO Proxy client runtime.
//!
//! This crate drives the pins of a remote `gpio-proxyd` daemon over UDP.
//!
//! - [`ProxyClient`] performs one blocking round trip per pin operation and
//!   maps the daemon's reply to typed errors.
//! - [`PinManager`] wraps a client and refuses to touch pins this process
//!   has not claimed, before any datagram is sent.
//! - [`Transport`] is the seam between the client and the network;
//!   [`UdpTransport`] is the real one, [`testing::MockTransport`] records
//!   traffic for tests.
//! - [`sim`] models the daemon's wire behaviour for loopback use.
//!
//! # Concurrency
//!
//! The wire format has no request id, so a reply can only be matched to a
//! request by being the next datagram on the socket. A client therefore
//! keeps exactly one request in flight: calls from several threads are
//! serialized on an internal mutex. Open one client per caller if that
//! serialization is a bottleneck.
//!
//! # Example
//!
//! ```rust,ignore
//! use gpio_proxy_client::{PinManager, ProxyClient, ProxyConfig};
//!
//! let config = ProxyConfig::load("proxy.yaml")?;
//! let pins = PinManager::new(ProxyClient::connect(&config)?);
//!
//! pins.acquire(12, "LED")?;
//! pins.configure_output(12, 0)?;
//! pins.set(12, 1)?;
//! pins.release(12)?;
//! ```

mod client;
mod config;
mod error;
mod pins;
pub mod sim;
pub mod testing;
mod transport;

pub use client::*;
pub use config::*;
pub use error::*;
pub use pins::*;
pub use transport::*;

pub use gpio_proxy_protocol::{Operation, DEFAULT_PORT};
