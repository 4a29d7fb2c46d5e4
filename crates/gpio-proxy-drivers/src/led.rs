//! A single LED on an output pin.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::error::DriverResult;
use crate::pin_io::PinIo;

/// An LED driven high for on.
#[derive(Debug)]
pub struct Led<P: PinIo> {
    io: P,
    pin: u32,
    lit: bool,
}

impl<P: PinIo> Led<P> {
    /// Claim `pin` and make it an output, starting off.
    ///
    /// The claim is released again if the pin cannot be configured.
    pub fn attach(io: P, pin: u32, owner: &str) -> DriverResult<Self> {
        io.acquire(pin, owner)?;
        if let Err(e) = io.configure_output(pin, false) {
            if let Err(release_err) = io.release(pin) {
                tracing::warn!(pin, error = %release_err, "failed to roll back claim");
            }
            return Err(e.into());
        }
        debug!(pin, owner, "led attached");
        Ok(Led {
            io,
            pin,
            lit: false,
        })
    }

    /// The pin driving the LED.
    pub fn pin(&self) -> u32 {
        self.pin
    }

    /// Whether the last write turned the LED on.
    pub fn is_on(&self) -> bool {
        self.lit
    }

    /// Drive the pin high.
    pub fn on(&mut self) -> DriverResult<()> {
        self.write(true)
    }

    /// Drive the pin low.
    pub fn off(&mut self) -> DriverResult<()> {
        self.write(false)
    }

    /// Invert the last written level.
    pub fn toggle(&mut self) -> DriverResult<()> {
        self.write(!self.lit)
    }

    /// Flash `cycles` times: on for `interval`, then off for `interval`.
    pub fn blink(&mut self, cycles: u32, interval: Duration) -> DriverResult<()> {
        for _ in 0..cycles {
            self.on()?;
            thread::sleep(interval);
            self.off()?;
            thread::sleep(interval);
        }
        Ok(())
    }

    /// Flash until `stop` is set, then leave the LED off. Returns the number
    /// of completed cycles.
    pub fn blink_until(&mut self, interval: Duration, stop: &AtomicBool) -> DriverResult<u64> {
        let mut cycles = 0;
        while !stop.load(Ordering::Relaxed) {
            self.on()?;
            thread::sleep(interval);
            self.off()?;
            thread::sleep(interval);
            cycles += 1;
        }
        if self.lit {
            self.off()?;
        }
        Ok(cycles)
    }

    /// Turn the LED off and release the pin.
    pub fn release(mut self) -> DriverResult<()> {
        let off = self.off();
        self.io.release(self.pin)?;
        off
    }

    fn write(&mut self, high: bool) -> DriverResult<()> {
        self.io.set(self.pin, high)?;
        self.lit = high;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{PinEvent, RecordingPins};
    use crate::error::DriverError;

    #[test]
    fn test_attach_configures_output_low() {
        let io = RecordingPins::new();
        let led = Led::attach(&io, 5, "LED").unwrap();
        assert_eq!(
            io.events(),
            vec![PinEvent::Acquire(5, "LED".into()), PinEvent::Output(5, false)]
        );
        assert!(!led.is_on());
    }

    #[test]
    fn test_attach_releases_on_configure_failure() {
        let io = RecordingPins::new();
        io.fail_after(1);
        let err = Led::attach(&io, 5, "LED").unwrap_err();
        assert!(matches!(err, DriverError::Pin(_)));
        assert!(io.claimed().is_empty());
    }

    #[test]
    fn test_toggle() {
        let io = RecordingPins::new();
        let mut led = Led::attach(&io, 5, "LED").unwrap();
        io.clear_events();

        led.toggle().unwrap();
        assert!(led.is_on());
        led.toggle().unwrap();
        assert!(!led.is_on());
        assert_eq!(io.events(), vec![PinEvent::Set(5, true), PinEvent::Set(5, false)]);
    }

    #[test]
    fn test_blink_cycles() {
        let io = RecordingPins::new();
        let mut led = Led::attach(&io, 5, "LED").unwrap();
        io.clear_events();

        led.blink(3, Duration::ZERO).unwrap();
        let events = io.events();
        assert_eq!(events.len(), 6);
        assert_eq!(events.iter().filter(|e| **e == PinEvent::Set(5, true)).count(), 3);
        assert_eq!(events.last(), Some(&PinEvent::Set(5, false)));
    }

    #[test]
    fn test_blink_until_stopped() {
        let io = RecordingPins::new();
        let mut led = Led::attach(&io, 5, "LED").unwrap();
        let stop = AtomicBool::new(true);
        assert_eq!(led.blink_until(Duration::ZERO, &stop).unwrap(), 0);
        assert!(!led.is_on());
    }

    #[test]
    fn test_release_turns_off() {
        let io = RecordingPins::new();
        let mut led = Led::attach(&io, 5, "LED").unwrap();
        led.on().unwrap();
        io.clear_events();

        led.release().unwrap();
        assert_eq!(io.events(), vec![PinEvent::Set(5, false), PinEvent::Release(5)]);
        assert!(io.claimed().is_empty());
    }
}
