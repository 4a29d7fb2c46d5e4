//! Recording [`PinIo`] for driver unit tests.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::time::Duration;

use gpio_proxy_client::{ClientError, ClientResult, Operation};

use crate::pin_io::PinIo;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinEvent {
    Acquire(u32, String),
    Release(u32),
    Input(u32),
    Output(u32, bool),
    Set(u32, bool),
    Get(u32),
}

#[derive(Debug, Default)]
pub struct RecordingPins {
    events: RefCell<Vec<PinEvent>>,
    claimed: RefCell<BTreeSet<u32>>,
    unavailable: BTreeSet<u32>,
    fail_at: Cell<Option<usize>>,
    operations: Cell<usize>,
}

impl RecordingPins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins whose acquisition is refused.
    pub fn with_unavailable(pins: impl IntoIterator<Item = u32>) -> Self {
        RecordingPins {
            unavailable: pins.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Make the operation with zero-based index `n` (counted from now) fail.
    pub fn fail_after(&self, n: usize) {
        self.fail_at.set(Some(self.operations.get() + n));
    }

    pub fn events(&self) -> Vec<PinEvent> {
        self.events.borrow().clone()
    }

    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn claimed(&self) -> Vec<u32> {
        self.claimed.borrow().iter().copied().collect()
    }

    fn record(&self, event: PinEvent, op: Operation, pin: u32) -> ClientResult<()> {
        let index = self.operations.get();
        self.operations.set(index + 1);
        if self.fail_at.get() == Some(index) {
            return Err(ClientError::Timeout {
                op,
                pin,
                after: Duration::ZERO,
            });
        }
        self.events.borrow_mut().push(event);
        Ok(())
    }
}

impl PinIo for RecordingPins {
    fn acquire(&self, pin: u32, owner: &str) -> ClientResult<()> {
        if self.unavailable.contains(&pin) {
            return Err(ClientError::PinUnavailable(pin));
        }
        self.record(PinEvent::Acquire(pin, owner.to_string()), Operation::Request, pin)?;
        self.claimed.borrow_mut().insert(pin);
        Ok(())
    }

    fn release(&self, pin: u32) -> ClientResult<()> {
        if !self.claimed.borrow_mut().remove(&pin) {
            return Err(ClientError::NotClaimed(pin));
        }
        self.record(PinEvent::Release(pin), Operation::Free, pin)
    }

    fn configure_input(&self, pin: u32) -> ClientResult<()> {
        self.record(PinEvent::Input(pin), Operation::ConfigureInput, pin)
    }

    fn configure_output(&self, pin: u32, initial: bool) -> ClientResult<()> {
        self.record(PinEvent::Output(pin, initial), Operation::ConfigureOutput, pin)
    }

    fn set(&self, pin: u32, high: bool) -> ClientResult<()> {
        self.record(PinEvent::Set(pin, high), Operation::Set, pin)
    }

    fn get(&self, pin: u32) -> ClientResult<u32> {
        self.record(PinEvent::Get(pin), Operation::Get, pin)?;
        Ok(0)
    }
}
