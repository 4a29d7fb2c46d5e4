//! The proxy client: one blocking round trip per pin operation.

use std::time::{Duration, Instant};

use gpio_proxy_metrics::{metric_defs, metrics, MetricLabels};
use gpio_proxy_protocol::{
    DaemonErrorCode, Operation, ProtocolError, RequestFrame, ResponseFrame, MAX_RESPONSE_LEN,
    VALUE_OK,
};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::config::ProxyConfig;
use crate::error::{ClientError, ClientResult};
use crate::transport::{Transport, UdpTransport};

/// A connection to one `gpio-proxyd` daemon.
///
/// Every method sends one request datagram and blocks until the matching
/// reply arrives or the deadline passes. Calls are serialized: the protocol
/// has no request id, so only one request may be in flight per connection.
/// Nothing is retried; a `Request` whose reply was lost may still have
/// claimed the pin.
pub struct ProxyClient<T: Transport = UdpTransport> {
    transport: Mutex<T>,
    timeout: Option<Duration>,
    labels: MetricLabels,
}

impl ProxyClient<UdpTransport> {
    /// Open a UDP connection described by `config`.
    pub fn connect(config: &ProxyConfig) -> ClientResult<Self> {
        let remote = config.remote_addr()?;
        let transport = UdpTransport::connect(remote, config.local_port)?;
        Ok(ProxyClient::new(transport).with_timeout(config.timeout()))
    }
}

impl<T: Transport> ProxyClient<T> {
    /// Wrap a transport. No deadline is set.
    pub fn new(transport: T) -> Self {
        let labels = MetricLabels::new(transport.peer());
        ProxyClient {
            transport: Mutex::new(transport),
            timeout: None,
            labels,
        }
    }

    /// Set the per-call reply deadline. `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The per-call reply deadline.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Address of the daemon.
    pub fn peer(&self) -> &str {
        &self.labels.peer
    }

    /// Read `pin`.
    pub fn get(&self, pin: u32) -> ClientResult<u32> {
        let response = self.transact(&RequestFrame::get(pin))?;
        Ok(u32::from(response.value))
    }

    /// Drive `pin` to `value`.
    pub fn set(&self, pin: u32, value: u8) -> ClientResult<()> {
        self.transact(&RequestFrame::set(pin, value))?;
        Ok(())
    }

    /// Claim `pin` under the owner label `name`.
    ///
    /// Fails with [`ClientError::PinUnavailable`] unless the daemon reports
    /// the claim succeeded.
    pub fn request_pin(&self, pin: u32, name: &str) -> ClientResult<()> {
        let response = self.transact(&RequestFrame::request(pin, name))?;
        if response.value != VALUE_OK {
            return Err(ClientError::PinUnavailable(pin));
        }
        Ok(())
    }

    /// Release `pin`.
    ///
    /// The reference daemon accepts frees of pins nobody claimed; whether
    /// another daemon does is up to it.
    pub fn free_pin(&self, pin: u32) -> ClientResult<()> {
        self.transact(&RequestFrame::free(pin))?;
        Ok(())
    }

    /// Release `pin`, waiting at most `limit` even if the client has a
    /// longer deadline or none.
    pub(crate) fn free_pin_within(&self, pin: u32, limit: Duration) -> ClientResult<()> {
        let timeout = Some(self.timeout.map_or(limit, |t| t.min(limit)));
        self.transact_within(&RequestFrame::free(pin), timeout)?;
        Ok(())
    }

    /// Make `pin` an input.
    pub fn configure_input(&self, pin: u32) -> ClientResult<()> {
        let response = self.transact(&RequestFrame::configure_input(pin))?;
        if response.value != VALUE_OK {
            return Err(ClientError::PinConfigError(pin));
        }
        Ok(())
    }

    /// Make `pin` an output, starting at `initial`.
    pub fn configure_output(&self, pin: u32, initial: u8) -> ClientResult<()> {
        let response = self.transact(&RequestFrame::configure_output(pin, initial))?;
        if response.value != VALUE_OK {
            return Err(ClientError::PinConfigError(pin));
        }
        Ok(())
    }

    /// Perform one round trip.
    ///
    /// Datagrams already queued on the transport are answers to requests
    /// that timed out earlier and are dropped before sending. While waiting,
    /// replies echoing a different operation are dropped too. A reply with a
    /// non-zero error code becomes [`ClientError::RemoteError`]; the value
    /// slot is not interpreted.
    pub fn transact(&self, request: &RequestFrame) -> ClientResult<ResponseFrame> {
        self.transact_within(request, self.timeout)
    }

    fn transact_within(
        &self,
        request: &RequestFrame,
        timeout: Option<Duration>,
    ) -> ClientResult<ResponseFrame> {
        let op = request.operation;
        let pin = request.pin;
        let labels = self.labels.with_operation(op.as_str()).to_labels();
        let datagram = request.encode();

        let mut transport = self.transport.lock();

        let stale = transport.discard_pending()?;
        if stale > 0 {
            warn!(peer = %self.labels.peer, stale, "dropped late datagrams before {}", op);
            self.count_discarded(stale as u64);
        }

        trace!(peer = %self.labels.peer, %op, pin, len = datagram.len(), "sending request");
        transport.send(&datagram)?;
        metrics::counter!(metric_defs::REQUESTS.name, labels.as_slice()).increment(1);

        let started = Instant::now();
        // A deadline past what `Instant` can represent means no deadline.
        let deadline = timeout.and_then(|t| started.checked_add(t));
        let mut buf = [0u8; MAX_RESPONSE_LEN];

        let response = loop {
            let remaining = match deadline {
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(left) if !left.is_zero() => Some(left),
                    _ => return Err(self.timed_out(op, pin, timeout, started, &labels)),
                },
                None => None,
            };

            let Some(len) = transport.recv(&mut buf, remaining)? else {
                return Err(self.timed_out(op, pin, timeout, started, &labels));
            };

            match ResponseFrame::decode(&buf[..len]) {
                Ok(response) if response.operation == op => break response,
                Ok(response) => {
                    warn!(
                        peer = %self.labels.peer,
                        expected = %op,
                        got = %response.operation,
                        "dropping reply for a different operation"
                    );
                    self.count_discarded(1);
                }
                Err(ProtocolError::UnknownOperation(code)) => {
                    warn!(peer = %self.labels.peer, code, "dropping reply with unknown operation");
                    self.count_discarded(1);
                }
                Err(e) => return Err(e.into()),
            }
        };

        let elapsed = started.elapsed();
        metrics::histogram!(metric_defs::ROUND_TRIP_TIME.name, labels.as_slice())
            .record(elapsed.as_micros() as f64);
        trace!(
            peer = %self.labels.peer,
            %op,
            pin,
            error = response.error,
            value = response.value,
            elapsed_us = elapsed.as_micros() as u64,
            "reply received"
        );

        if !response.is_ok() {
            metrics::counter!(metric_defs::REMOTE_ERRORS.name, labels.as_slice()).increment(1);
            debug!(peer = %self.labels.peer, %op, pin, code = response.error, "daemon reported error");
            return Err(ClientError::RemoteError {
                op,
                pin,
                code: DaemonErrorCode::from(response.error),
            });
        }

        Ok(response)
    }

    fn timed_out(
        &self,
        op: Operation,
        pin: u32,
        timeout: Option<Duration>,
        started: Instant,
        labels: &[(&'static str, String)],
    ) -> ClientError {
        let after = timeout.unwrap_or_else(|| started.elapsed());
        metrics::counter!(metric_defs::TIMEOUTS.name, labels).increment(1);
        warn!(peer = %self.labels.peer, %op, pin, ?after, "no reply before deadline");
        ClientError::Timeout { op, pin, after }
    }

    fn count_discarded(&self, count: u64) {
        metrics::counter!(metric_defs::DISCARDED_DATAGRAMS.name, self.labels.to_labels().as_slice())
            .increment(count);
    }
}

impl<T: Transport> std::fmt::Debug for ProxyClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyClient")
            .field("peer", &self.labels.peer)
            .field("timeout", &self.timeout)
            .finish()
    }
}
