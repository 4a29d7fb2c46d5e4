//! Device drivers for GPIO Proxy.
//!
//! Drivers here emulate wider buses by sequencing single-pin writes. They
//! only see the [`PinIo`] trait, so the same driver runs against a
//! [`PinManager`](gpio_proxy_client::PinManager) talking to a real daemon
//! or against a recording fake in tests.
//!
//! Every multi-pin sequence stops at the first failing pin operation and
//! returns that error. The device may be left half-programmed; the pins
//! stay claimed so the caller can retry `init` or release them.

mod bus;
mod error;
#[cfg(test)]
mod fake;
mod hd44780;
mod led;
mod pin_io;

pub use bus::*;
pub use error::*;
pub use hd44780::*;
pub use led::*;
pub use pin_io::*;
