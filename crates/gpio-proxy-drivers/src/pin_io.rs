//! The pin operations a driver is given.

use gpio_proxy_client::{ClientResult, PinManager, Transport};

/// Single-pin operations with claim bookkeeping.
///
/// Implementations are expected to reject operations on pins that were not
/// acquired first.
pub trait PinIo {
    /// Claim `pin` under the label `owner`.
    fn acquire(&self, pin: u32, owner: &str) -> ClientResult<()>;

    /// Release a claimed pin.
    fn release(&self, pin: u32) -> ClientResult<()>;

    /// Make `pin` an input.
    fn configure_input(&self, pin: u32) -> ClientResult<()>;

    /// Make `pin` an output starting at `initial`.
    fn configure_output(&self, pin: u32, initial: bool) -> ClientResult<()>;

    /// Drive `pin`.
    fn set(&self, pin: u32, high: bool) -> ClientResult<()>;

    /// Read `pin`.
    fn get(&self, pin: u32) -> ClientResult<u32>;
}

impl<T: Transport> PinIo for PinManager<T> {
    fn acquire(&self, pin: u32, owner: &str) -> ClientResult<()> {
        PinManager::acquire(self, pin, owner)
    }

    fn release(&self, pin: u32) -> ClientResult<()> {
        PinManager::release(self, pin)
    }

    fn configure_input(&self, pin: u32) -> ClientResult<()> {
        PinManager::configure_input(self, pin)
    }

    fn configure_output(&self, pin: u32, initial: bool) -> ClientResult<()> {
        PinManager::configure_output(self, pin, u8::from(initial))
    }

    fn set(&self, pin: u32, high: bool) -> ClientResult<()> {
        PinManager::set(self, pin, u8::from(high))
    }

    fn get(&self, pin: u32) -> ClientResult<u32> {
        PinManager::get(self, pin)
    }
}

impl<P: PinIo + ?Sized> PinIo for &P {
    fn acquire(&self, pin: u32, owner: &str) -> ClientResult<()> {
        (**self).acquire(pin, owner)
    }

    fn release(&self, pin: u32) -> ClientResult<()> {
        (**self).release(pin)
    }

    fn configure_input(&self, pin: u32) -> ClientResult<()> {
        (**self).configure_input(pin)
    }

    fn configure_output(&self, pin: u32, initial: bool) -> ClientResult<()> {
        (**self).configure_output(pin, initial)
    }

    fn set(&self, pin: u32, high: bool) -> ClientResult<()> {
        (**self).set(pin, high)
    }

    fn get(&self, pin: u32) -> ClientResult<u32> {
        (**self).get(pin)
    }
}

/// Acquire `pins` in order, labelled by `owner_of`.
///
/// If one fails, the pins acquired by this call are released again before
/// the error is returned.
pub fn acquire_all<P: PinIo + ?Sized>(
    io: &P,
    pins: &[u32],
    owner_of: impl Fn(usize) -> String,
) -> ClientResult<()> {
    for (i, &pin) in pins.iter().enumerate() {
        if let Err(e) = io.acquire(pin, &owner_of(i)) {
            for &taken in pins[..i].iter().rev() {
                if let Err(release_err) = io.release(taken) {
                    tracing::warn!(pin = taken, error = %release_err, "failed to roll back claim");
                }
            }
            return Err(e);
        }
    }
    Ok(())
}

/// Release `pins`, continuing past failures. Returns the first error.
pub fn release_all<P: PinIo + ?Sized>(io: &P, pins: &[u32]) -> ClientResult<()> {
    let mut first_error = None;
    for &pin in pins {
        if let Err(e) = io.release(pin) {
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}
