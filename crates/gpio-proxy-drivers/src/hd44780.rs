//! HD44780 character LCD in 4-bit mode.
//!
//! The controller is wired with RS as the bus mode line, E as the enable
//! line and DB4..DB7 as the data lines. RW is held low; the driver never
//! reads the busy flag and waits fixed delays instead.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bus::{BusMode, FourBitBus, FourBitPins};
use crate::error::{DriverError, DriverResult};
use crate::pin_io::{acquire_all, release_all, PinIo};

// ============================================================================
// Instruction Set
// ============================================================================

/// Clear display and return home.
pub const CMD_CLEAR: u8 = 0x01;
/// Return home.
pub const CMD_HOME: u8 = 0x02;
/// Entry mode set.
pub const CMD_ENTRY_MODE: u8 = 0x04;
/// Entry mode flag: move the cursor right after each write.
pub const ENTRY_INCREMENT: u8 = 0x02;
/// Display on/off control.
pub const CMD_DISPLAY_CONTROL: u8 = 0x08;
/// Display control flag: display on.
pub const DISPLAY_ON: u8 = 0x04;
/// Display control flag: underline cursor.
pub const CURSOR_ON: u8 = 0x02;
/// Display control flag: blinking block cursor.
pub const BLINK_ON: u8 = 0x01;
/// Function set.
pub const CMD_FUNCTION_SET: u8 = 0x20;
/// Function set flag: two display lines.
pub const FUNCTION_TWO_LINES: u8 = 0x08;
/// Set DDRAM address.
pub const CMD_SET_DDRAM: u8 = 0x80;

/// DDRAM address of the first column of each row.
const ROW_OFFSETS: [u8; 4] = [0x00, 0x40, 0x14, 0x54];

/// Nibble sent three times to force 8-bit mode from any state.
const WAKE_NIBBLE: u8 = 0x03;
/// Nibble that switches the controller to 4-bit mode.
const FOUR_BIT_NIBBLE: u8 = 0x02;

// ============================================================================
// Configuration
// ============================================================================

/// Which remote pins the display is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hd44780Pins {
    /// Register select.
    pub rs: u32,
    /// Read/write, held low.
    pub rw: u32,
    /// Enable.
    pub e: u32,
    /// Data bit 4.
    pub db4: u32,
    /// Data bit 5.
    pub db5: u32,
    /// Data bit 6.
    pub db6: u32,
    /// Data bit 7.
    pub db7: u32,
}

impl Default for Hd44780Pins {
    /// Wiring of the Omnima LED header on ADM5120 routers.
    fn default() -> Self {
        Hd44780Pins {
            rs: 12,
            rw: 14,
            e: 15,
            db4: 17,
            db5: 18,
            db6: 20,
            db7: 21,
        }
    }
}

impl Hd44780Pins {
    /// Pins with their owner labels, in acquisition order.
    pub fn labelled(&self) -> [(u32, &'static str); 7] {
        [
            (self.rs, "HD_RS"),
            (self.rw, "HD_RW"),
            (self.e, "HD_E"),
            (self.db4, "HD_DB4"),
            (self.db5, "HD_DB5"),
            (self.db6, "HD_DB6"),
            (self.db7, "HD_DB7"),
        ]
    }

    /// Pins in acquisition order.
    pub fn all(&self) -> [u32; 7] {
        self.labelled().map(|(pin, _)| pin)
    }

    fn bus(&self) -> FourBitPins {
        FourBitPins {
            data: [self.db4, self.db5, self.db6, self.db7],
            enable: self.e,
            mode: self.rs,
        }
    }
}

/// Delays the controller needs between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hd44780Timing {
    /// Wait after power-on before the first nibble.
    pub power_on: Duration,
    /// Wait after the first wake nibble.
    pub first_wake: Duration,
    /// Wait after the remaining init nibbles.
    pub wake: Duration,
    /// Wait after clear and home.
    pub clear: Duration,
}

impl Default for Hd44780Timing {
    fn default() -> Self {
        Hd44780Timing {
            power_on: Duration::from_millis(15),
            first_wake: Duration::from_micros(4100),
            wake: Duration::from_micros(100),
            clear: Duration::from_micros(1520),
        }
    }
}

impl Hd44780Timing {
    /// No waiting. Every pin write is already a network round trip, which
    /// is slower than any of the controller's delays.
    pub fn none() -> Self {
        Hd44780Timing {
            power_on: Duration::ZERO,
            first_wake: Duration::ZERO,
            wake: Duration::ZERO,
            clear: Duration::ZERO,
        }
    }
}

/// Visible characters per row and number of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Characters per row.
    pub columns: u8,
    /// Rows, at most four.
    pub rows: u8,
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry {
            columns: 16,
            rows: 2,
        }
    }
}

// ============================================================================
// Driver
// ============================================================================

/// An HD44780 display driven through remote pins.
#[derive(Debug)]
pub struct Hd44780<P: PinIo> {
    bus: FourBitBus<P>,
    pins: Hd44780Pins,
    timing: Hd44780Timing,
    geometry: Geometry,
    initialized: bool,
}

impl<P: PinIo> Hd44780<P> {
    /// Claim the display's pins.
    ///
    /// If any pin cannot be claimed, the ones already claimed by this call
    /// are released and the error is returned.
    pub fn attach(io: P, pins: Hd44780Pins) -> DriverResult<Self> {
        let labelled = pins.labelled();
        acquire_all(&io, &pins.all(), |i| labelled[i].1.to_string())?;
        debug!(?pins, "hd44780 pins claimed");

        Ok(Hd44780 {
            bus: FourBitBus::new(io, pins.bus()),
            pins,
            timing: Hd44780Timing::default(),
            geometry: Geometry::default(),
            initialized: false,
        })
    }

    /// Use different delays.
    pub fn with_timing(mut self, timing: Hd44780Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Use a different display size.
    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// The pin assignment.
    pub fn pins(&self) -> &Hd44780Pins {
        &self.pins
    }

    /// Whether `init` has completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Run the power-on sequence.
    ///
    /// All pins become outputs driven low, the controller is forced into
    /// 8-bit mode and then switched to 4-bit, two-line mode with the display
    /// on, the cursor hidden, the screen cleared and the cursor advancing.
    pub fn init(&mut self) -> DriverResult<()> {
        self.initialized = false;
        let io = self.bus.io();
        for pin in self.pins.all() {
            io.configure_output(pin, false)?;
        }

        self.bus.set_enable(false)?;
        self.bus.set_mode(BusMode::Command)?;
        pause(self.timing.power_on);

        self.bus.write_nibble(WAKE_NIBBLE)?;
        pause(self.timing.first_wake);
        self.bus.write_nibble(WAKE_NIBBLE)?;
        pause(self.timing.wake);
        self.bus.write_nibble(WAKE_NIBBLE)?;
        pause(self.timing.wake);
        self.bus.write_nibble(FOUR_BIT_NIBBLE)?;
        pause(self.timing.wake);

        self.send_command(CMD_FUNCTION_SET | FUNCTION_TWO_LINES)?;
        self.send_command(CMD_DISPLAY_CONTROL | DISPLAY_ON)?;
        self.send_command(CMD_CLEAR)?;
        pause(self.timing.clear);
        self.send_command(CMD_ENTRY_MODE | ENTRY_INCREMENT)?;

        self.initialized = true;
        info!("hd44780 initialized");
        Ok(())
    }

    /// Send a raw instruction byte.
    pub fn command(&self, command: u8) -> DriverResult<()> {
        self.ensure_initialized()?;
        self.send_command(command)
    }

    /// Write raw character codes at the cursor.
    pub fn write_bytes(&self, bytes: &[u8]) -> DriverResult<()> {
        self.ensure_initialized()?;
        self.bus.write_bytes(BusMode::Data, bytes)?;
        Ok(())
    }

    /// Write text at the cursor. Characters outside ASCII become `?`.
    pub fn write_str(&self, text: &str) -> DriverResult<()> {
        let bytes: Vec<u8> = text
            .chars()
            .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
            .collect();
        self.write_bytes(&bytes)
    }

    /// Clear the display and home the cursor.
    pub fn clear(&self) -> DriverResult<()> {
        self.command(CMD_CLEAR)?;
        pause(self.timing.clear);
        Ok(())
    }

    /// Home the cursor.
    pub fn home(&self) -> DriverResult<()> {
        self.command(CMD_HOME)?;
        pause(self.timing.clear);
        Ok(())
    }

    /// Move the cursor.
    pub fn set_cursor(&self, row: u8, col: u8) -> DriverResult<()> {
        let rows = self.geometry.rows.min(ROW_OFFSETS.len() as u8);
        if row >= rows || col >= self.geometry.columns {
            return Err(DriverError::InvalidPosition { row, col });
        }
        self.command(CMD_SET_DDRAM | ROW_OFFSETS[row as usize].wrapping_add(col))
    }

    /// Switch the display, cursor and blinking on or off.
    pub fn display(&self, on: bool, cursor: bool, blink: bool) -> DriverResult<()> {
        let mut flags = 0;
        if on {
            flags |= DISPLAY_ON;
        }
        if cursor {
            flags |= CURSOR_ON;
        }
        if blink {
            flags |= BLINK_ON;
        }
        self.command(CMD_DISPLAY_CONTROL | flags)
    }

    /// Release every pin. Continues past failures and returns the first.
    pub fn release(self) -> DriverResult<()> {
        release_all(self.bus.io(), &self.pins.all())?;
        debug!("hd44780 pins released");
        Ok(())
    }

    fn send_command(&self, command: u8) -> DriverResult<()> {
        self.bus.write_byte(BusMode::Command, command)?;
        Ok(())
    }

    fn ensure_initialized(&self) -> DriverResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(DriverError::NotInitialized)
        }
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{PinEvent, RecordingPins};

    fn attached(io: &RecordingPins) -> Hd44780<&RecordingPins> {
        Hd44780::attach(io, Hd44780Pins::default())
            .unwrap()
            .with_timing(Hd44780Timing::none())
    }

    /// Decode the nibbles latched on the bus, pairing each with the RS level.
    fn latched(events: &[PinEvent], pins: &Hd44780Pins) -> Vec<(bool, u8)> {
        let mut rs = false;
        let mut data = [false; 4];
        let mut enable_low = false;
        let mut out = Vec::new();
        let data_pins = [pins.db4, pins.db5, pins.db6, pins.db7];
        for event in events {
            if let PinEvent::Set(pin, high) = *event {
                if pin == pins.rs {
                    rs = high;
                } else if let Some(bit) = data_pins.iter().position(|&p| p == pin) {
                    data[bit] = high;
                } else if pin == pins.e {
                    if !high {
                        enable_low = true;
                    } else if enable_low {
                        enable_low = false;
                        let nibble = data
                            .iter()
                            .enumerate()
                            .fold(0u8, |acc, (bit, &on)| acc | (u8::from(on) << bit));
                        out.push((rs, nibble));
                    }
                }
            }
        }
        out
    }

    #[test]
    fn test_attach_claims_in_order() {
        let io = RecordingPins::new();
        let _lcd = attached(&io);
        let acquired: Vec<_> = io
            .events()
            .into_iter()
            .filter_map(|e| match e {
                PinEvent::Acquire(pin, owner) => Some((pin, owner)),
                _ => None,
            })
            .collect();
        assert_eq!(acquired.len(), 7);
        assert_eq!(acquired[0], (12, "HD_RS".to_string()));
        assert_eq!(acquired[6], (21, "HD_DB7".to_string()));
    }

    #[test]
    fn test_attach_rolls_back_on_failure() {
        let pins = Hd44780Pins::default();
        let io = RecordingPins::with_unavailable([pins.db4]);
        let err = Hd44780::attach(&io, pins).unwrap_err();

        assert!(matches!(err, DriverError::Pin(_)));
        assert!(io.claimed().is_empty());
        let released: Vec<_> = io
            .events()
            .into_iter()
            .filter_map(|e| match e {
                PinEvent::Release(pin) => Some(pin),
                _ => None,
            })
            .collect();
        assert_eq!(released, vec![pins.e, pins.rw, pins.rs]);
    }

    #[test]
    fn test_init_sequence() {
        let io = RecordingPins::new();
        let mut lcd = attached(&io);
        io.clear_events();
        lcd.init().unwrap();
        assert!(lcd.is_initialized());

        let events = io.events();
        let pins = Hd44780Pins::default();
        for (i, pin) in pins.all().into_iter().enumerate() {
            assert_eq!(events[i], PinEvent::Output(pin, false));
        }

        let nibbles = latched(&events, &pins);
        assert_eq!(
            nibbles,
            vec![
                (false, 0x3),
                (false, 0x3),
                (false, 0x3),
                (false, 0x2),
                (false, 0x2),
                (false, 0x8),
                (false, 0x0),
                (false, 0xC),
                (false, 0x0),
                (false, 0x1),
                (false, 0x0),
                (false, 0x6),
            ]
        );
        // RW is never driven high.
        assert!(!events.contains(&PinEvent::Set(pins.rw, true)));
    }

    #[test]
    fn test_write_text() {
        let io = RecordingPins::new();
        let mut lcd = attached(&io);
        lcd.init().unwrap();
        io.clear_events();

        lcd.write_str("Hello").unwrap();
        let nibbles = latched(&io.events(), &Hd44780Pins::default());
        let bytes: Vec<u8> = nibbles
            .chunks(2)
            .map(|pair| {
                assert!(pair[0].0 && pair[1].0, "data written with RS high");
                (pair[0].1 << 4) | pair[1].1
            })
            .collect();
        assert_eq!(bytes, b"Hello");
    }

    #[test]
    fn test_non_ascii_replaced() {
        let io = RecordingPins::new();
        let mut lcd = attached(&io);
        lcd.init().unwrap();
        io.clear_events();

        lcd.write_str("é").unwrap();
        let nibbles = latched(&io.events(), &Hd44780Pins::default());
        assert_eq!(nibbles, vec![(true, 0x3), (true, 0xF)]);
    }

    #[test]
    fn test_requires_init() {
        let io = RecordingPins::new();
        let lcd = attached(&io);
        assert!(matches!(lcd.write_str("x"), Err(DriverError::NotInitialized)));
        assert!(matches!(lcd.clear(), Err(DriverError::NotInitialized)));
    }

    #[test]
    fn test_set_cursor() {
        let io = RecordingPins::new();
        let mut lcd = attached(&io);
        lcd.init().unwrap();
        io.clear_events();

        lcd.set_cursor(1, 3).unwrap();
        let nibbles = latched(&io.events(), &Hd44780Pins::default());
        assert_eq!(nibbles, vec![(false, 0xC), (false, 0x3)]);

        assert!(matches!(
            lcd.set_cursor(2, 0),
            Err(DriverError::InvalidPosition { row: 2, col: 0 })
        ));
        assert!(matches!(
            lcd.set_cursor(0, 16),
            Err(DriverError::InvalidPosition { .. })
        ));
    }

    #[test]
    fn test_init_aborts_on_failure() {
        let io = RecordingPins::new();
        let mut lcd = attached(&io);
        io.clear_events();
        io.fail_after(10);

        assert!(lcd.init().is_err());
        assert!(!lcd.is_initialized());
        assert_eq!(io.events().len(), 10);
        assert_eq!(io.claimed().len(), 7);
    }

    #[test]
    fn test_pins_from_partial_yaml() {
        let pins: Hd44780Pins = serde_yaml::from_str("rs: 3\ne: 4\n").unwrap();
        assert_eq!(pins.rs, 3);
        assert_eq!(pins.e, 4);
        assert_eq!(pins.db7, Hd44780Pins::default().db7);
    }

    #[test]
    fn test_release_frees_all() {
        let io = RecordingPins::new();
        let lcd = attached(&io);
        lcd.release().unwrap();
        assert!(io.claimed().is_empty());
    }
}
