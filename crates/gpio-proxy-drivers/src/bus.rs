//! A 4-bit parallel bus built from single-pin writes.
//!
//! Four data lines carry a nibble, a mode line selects command or data,
//! and a pulse on the enable line tells the device to latch. Bytes go out
//! high nibble first.

use gpio_proxy_client::ClientResult;
use tracing::trace;

use crate::pin_io::PinIo;

/// What the mode line announces for the next transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusMode {
    /// Mode line low.
    Command,
    /// Mode line high.
    Data,
}

/// Pin assignment for a [`FourBitBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FourBitPins {
    /// Data lines, least significant bit first.
    pub data: [u32; 4],
    /// Latch line.
    pub enable: u32,
    /// Command/data select line.
    pub mode: u32,
}

/// Drives a [`FourBitPins`] assignment through a [`PinIo`].
///
/// The pins must already be claimed and configured as outputs.
#[derive(Debug)]
pub struct FourBitBus<P> {
    io: P,
    pins: FourBitPins,
}

impl<P: PinIo> FourBitBus<P> {
    /// Wrap `io` with the given pin assignment.
    pub fn new(io: P, pins: FourBitPins) -> Self {
        FourBitBus { io, pins }
    }

    /// The pin assignment.
    pub fn pins(&self) -> &FourBitPins {
        &self.pins
    }

    /// The underlying pin operations.
    pub fn io(&self) -> &P {
        &self.io
    }

    /// Put the low four bits of `nibble` on the data lines, then pulse
    /// enable low and back high.
    pub fn write_nibble(&self, nibble: u8) -> ClientResult<()> {
        trace!(nibble = nibble & 0x0F, "bus nibble");
        for (bit, &pin) in self.pins.data.iter().enumerate() {
            self.io.set(pin, nibble & (1 << bit) != 0)?;
        }
        self.pulse_enable()
    }

    /// Select `mode`, then send `byte` as two nibbles, high first.
    pub fn write_byte(&self, mode: BusMode, byte: u8) -> ClientResult<()> {
        self.set_mode(mode)?;
        self.write_nibble(byte >> 4)?;
        self.write_nibble(byte & 0x0F)
    }

    /// Select `mode` once, then send every byte of `bytes`.
    pub fn write_bytes(&self, mode: BusMode, bytes: &[u8]) -> ClientResult<()> {
        self.set_mode(mode)?;
        for &byte in bytes {
            self.write_nibble(byte >> 4)?;
            self.write_nibble(byte & 0x0F)?;
        }
        Ok(())
    }

    /// Drive the mode line.
    pub fn set_mode(&self, mode: BusMode) -> ClientResult<()> {
        self.io.set(self.pins.mode, mode == BusMode::Data)
    }

    /// Drive the enable line.
    pub fn set_enable(&self, high: bool) -> ClientResult<()> {
        self.io.set(self.pins.enable, high)
    }

    fn pulse_enable(&self) -> ClientResult<()> {
        self.set_enable(false)?;
        self.set_enable(true)
    }
}
