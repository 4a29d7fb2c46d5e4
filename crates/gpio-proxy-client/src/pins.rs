//! Client-side pin bookkeeping.
//!
//! The daemon enforces ownership between processes, but it will happily
//! read, write or free a pin nobody claimed. [`PinManager`] adds the local
//! half: a pin must be acquired through it before it can be used, and a
//! misuse is rejected before any datagram is sent.

use std::collections::BTreeMap;
use std::time::Duration;

use gpio_proxy_metrics::{metric_defs, metrics, MetricLabels};
use gpio_proxy_protocol::MAX_NAME_LEN;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::client::ProxyClient;
use crate::error::{ClientError, ClientResult};
use crate::transport::{Transport, UdpTransport};

/// Longest wait for each free sent while a [`PinManager`] is dropped.
pub const DROP_RELEASE_TIMEOUT: Duration = Duration::from_secs(1);

/// Tracks which pins this process has claimed and guards every operation
/// on them.
///
/// Remaining claims are freed when the manager is dropped. Each of those
/// frees waits at most [`DROP_RELEASE_TIMEOUT`] for its reply, whatever the
/// client's own deadline, so dropping a manager whose daemon has gone away
/// does not block forever.
pub struct PinManager<T: Transport = UdpTransport> {
    client: ProxyClient<T>,
    claimed: Mutex<BTreeMap<u32, String>>,
    labels: MetricLabels,
}

impl<T: Transport> PinManager<T> {
    /// Manage pins through `client`.
    pub fn new(client: ProxyClient<T>) -> Self {
        let labels = MetricLabels::new(client.peer());
        PinManager {
            client,
            claimed: Mutex::new(BTreeMap::new()),
            labels,
        }
    }

    /// The underlying client.
    ///
    /// Calls made directly on it bypass the claim checks.
    pub fn client(&self) -> &ProxyClient<T> {
        &self.client
    }

    /// Claim `pin` under the label `owner`.
    ///
    /// On failure nothing is recorded and the error is returned as is.
    pub fn acquire(&self, pin: u32, owner: &str) -> ClientResult<()> {
        if self.is_claimed(pin) {
            return Err(ClientError::AlreadyClaimed(pin));
        }
        if owner.len() > MAX_NAME_LEN {
            debug!(pin, owner, "owner label will be truncated by the daemon");
        }

        self.client.request_pin(pin, owner)?;

        let mut claimed = self.claimed.lock();
        claimed.insert(pin, owner.to_string());
        self.record_claimed(claimed.len());
        debug!(pin, owner, "pin acquired");
        Ok(())
    }

    /// Release `pin`.
    ///
    /// The pin leaves the claimed set whatever the daemon answers; the
    /// daemon's answer is still returned.
    pub fn release(&self, pin: u32) -> ClientResult<()> {
        self.release_within(pin, None)
    }

    fn release_within(&self, pin: u32, limit: Option<Duration>) -> ClientResult<()> {
        let owner = {
            let mut claimed = self.claimed.lock();
            let owner = claimed.remove(&pin).ok_or(ClientError::NotClaimed(pin))?;
            self.record_claimed(claimed.len());
            owner
        };

        let result = match limit {
            Some(limit) => self.client.free_pin_within(pin, limit),
            None => self.client.free_pin(pin),
        };
        match &result {
            Ok(()) => debug!(pin, owner = %owner, "pin released"),
            Err(e) => warn!(pin, owner = %owner, error = %e, "free failed, pin dropped from claimed set"),
        }
        result
    }

    /// Release every claimed pin, continuing past failures.
    ///
    /// Returns the first error.
    pub fn release_all(&self) -> ClientResult<()> {
        self.release_all_within(None)
    }

    fn release_all_within(&self, limit: Option<Duration>) -> ClientResult<()> {
        let pins: Vec<u32> = self.claimed.lock().keys().copied().collect();
        let mut first_error = None;
        for pin in pins {
            if let Err(e) = self.release_within(pin, limit) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Whether `pin` is claimed by this manager.
    pub fn is_claimed(&self, pin: u32) -> bool {
        self.claimed.lock().contains_key(&pin)
    }

    /// Claimed pins and their labels, in pin order.
    pub fn claimed(&self) -> Vec<(u32, String)> {
        self.claimed
            .lock()
            .iter()
            .map(|(pin, owner)| (*pin, owner.clone()))
            .collect()
    }

    /// Read a claimed pin.
    pub fn get(&self, pin: u32) -> ClientResult<u32> {
        self.ensure_claimed(pin)?;
        self.client.get(pin)
    }

    /// Drive a claimed pin.
    pub fn set(&self, pin: u32, value: u8) -> ClientResult<()> {
        self.ensure_claimed(pin)?;
        self.client.set(pin, value)
    }

    /// Make a claimed pin an input.
    pub fn configure_input(&self, pin: u32) -> ClientResult<()> {
        self.ensure_claimed(pin)?;
        self.client.configure_input(pin)
    }

    /// Make a claimed pin an output.
    pub fn configure_output(&self, pin: u32, initial: u8) -> ClientResult<()> {
        self.ensure_claimed(pin)?;
        self.client.configure_output(pin, initial)
    }

    /// Find which of `pins` can be claimed right now.
    ///
    /// Each pin is acquired and immediately released. Pins held elsewhere
    /// are skipped and never freed; any other failure stops the probe.
    pub fn probe(&self, pins: impl IntoIterator<Item = u32>, owner: &str) -> ClientResult<Vec<u32>> {
        let mut available = Vec::new();
        for pin in pins {
            match self.acquire(pin, owner) {
                Ok(()) => {
                    self.release(pin)?;
                    available.push(pin);
                }
                Err(ClientError::PinUnavailable(_)) | Err(ClientError::AlreadyClaimed(_)) => {
                    debug!(pin, "pin not available");
                }
                Err(e) => return Err(e),
            }
        }
        info!(count = available.len(), "probe complete");
        Ok(available)
    }

    fn ensure_claimed(&self, pin: u32) -> ClientResult<()> {
        if self.is_claimed(pin) {
            Ok(())
        } else {
            Err(ClientError::NotClaimed(pin))
        }
    }

    fn record_claimed(&self, count: usize) {
        metrics::gauge!(metric_defs::CLAIMED_PINS.name, self.labels.to_labels().as_slice())
            .set(count as f64);
    }
}

impl<T: Transport> Drop for PinManager<T> {
    fn drop(&mut self) {
        if self.claimed.lock().is_empty() {
            return;
        }
        if let Err(e) = self.release_all_within(Some(DROP_RELEASE_TIMEOUT)) {
            warn!(error = %e, "failed to release pins on drop");
        }
    }
}

impl<T: Transport> std::fmt::Debug for PinManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinManager")
            .field("client", &self.client)
            .field("claimed", &*self.claimed.lock())
            .finish()
    }
}
