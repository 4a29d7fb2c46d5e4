//! A simulated daemon.
//!
//! [`SimDaemon`] answers request datagrams the way `gpio-proxyd` does on
//! the wire, backed by an in-memory pin table with ownership bookkeeping.
//! [`SimServer`] puts it on a UDP socket so the client and the CLI can be
//! exercised over loopback.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use gpio_proxy_protocol::{
    Operation, ProtocolError, RequestFrame, ResponseFrame, ERR_IOCTL_FAILED, ERR_NONE,
    MAX_NAME_LEN, MAX_RESPONSE_LEN, VALUE_OK,
};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

/// How often a server checks its stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Direction of a simulated pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Never configured.
    #[default]
    Unconfigured,
    /// Configured as input.
    Input,
    /// Configured as output.
    Output,
}

/// State of one simulated pin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimPin {
    /// Current level.
    pub value: u8,
    /// Current direction.
    pub direction: Direction,
    /// Owner label, if claimed.
    pub owner: Option<String>,
}

/// In-memory model of the daemon.
#[derive(Debug, Clone)]
pub struct SimDaemon {
    pins: Vec<SimPin>,
    handled: u64,
}

impl SimDaemon {
    /// A daemon exposing pins `0..pin_count`.
    pub fn new(pin_count: usize) -> Self {
        SimDaemon {
            pins: vec![SimPin::default(); pin_count],
            handled: 0,
        }
    }

    /// Number of pins.
    pub fn pin_count(&self) -> usize {
        self.pins.len()
    }

    /// State of `pin`.
    pub fn pin(&self, pin: u32) -> Option<&SimPin> {
        self.pins.get(pin as usize)
    }

    /// Number of valid requests answered.
    pub fn handled(&self) -> u64 {
        self.handled
    }

    /// Claim `pin` on behalf of another process. Returns false if it is
    /// out of range or already owned.
    pub fn claim(&mut self, pin: u32, owner: &str) -> bool {
        match self.pins.get_mut(pin as usize) {
            Some(state) if state.owner.is_none() => {
                state.owner = Some(truncate_label(owner));
                true
            }
            _ => false,
        }
    }

    /// Drive an input level from outside.
    pub fn set_level(&mut self, pin: u32, value: u8) {
        if let Some(state) = self.pins.get_mut(pin as usize) {
            state.value = value;
        }
    }

    /// Pins currently owned, with their labels.
    pub fn owners(&self) -> Vec<(u32, String)> {
        self.pins
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.owner.clone().map(|o| (i as u32, o)))
            .collect()
    }

    /// Answer one datagram.
    ///
    /// Returns `None` for datagrams the daemon would silently drop: shorter
    /// than the request header or missing the request marker.
    pub fn handle(&mut self, datagram: &[u8]) -> Option<Vec<u8>> {
        if !RequestFrame::has_marker(datagram) {
            debug!(len = datagram.len(), "discarding invalid request datagram");
            return None;
        }

        let request = match RequestFrame::decode(datagram) {
            Ok(request) => request,
            Err(ProtocolError::UnknownOperation(code)) => {
                warn!(code, "unrecognised operation");
                self.handled += 1;
                return Some(vec![code, ERR_IOCTL_FAILED, 0, datagram[3]]);
            }
            Err(e) => {
                debug!(error = %e, "discarding undecodable request");
                return None;
            }
        };

        self.handled += 1;
        let (error, value) = self.apply(&request);
        trace!(op = %request.operation, pin = request.pin, error, value, "handled request");
        let mut reply = ResponseFrame::new(request.operation, error, value).encode();
        reply[3] = request.write_value;
        Some(reply.to_vec())
    }

    fn apply(&mut self, request: &RequestFrame) -> (u8, u8) {
        let Some(pin) = self.pins.get_mut(request.pin as usize) else {
            return match request.operation {
                Operation::Request | Operation::ConfigureInput | Operation::ConfigureOutput => {
                    (ERR_NONE, 0)
                }
                Operation::Get | Operation::Set | Operation::Free => (ERR_IOCTL_FAILED, 0),
            };
        };

        match request.operation {
            Operation::Get => (ERR_NONE, pin.value),
            Operation::Set => {
                pin.value = request.write_value;
                (ERR_NONE, 0)
            }
            Operation::Request => {
                if pin.owner.is_some() {
                    return (ERR_NONE, 0);
                }
                let label = request.name.as_deref().unwrap_or_default();
                pin.owner = Some(truncate_label(label));
                (ERR_NONE, VALUE_OK)
            }
            Operation::Free => {
                pin.owner = None;
                (ERR_NONE, 0)
            }
            Operation::ConfigureInput => {
                pin.direction = Direction::Input;
                (ERR_NONE, VALUE_OK)
            }
            Operation::ConfigureOutput => {
                pin.direction = Direction::Output;
                pin.value = request.write_value;
                (ERR_NONE, VALUE_OK)
            }
        }
    }
}

fn truncate_label(label: &str) -> String {
    let mut end = label.len().min(MAX_NAME_LEN);
    while !label.is_char_boundary(end) {
        end -= 1;
    }
    label[..end].to_string()
}

/// A [`SimDaemon`] listening on a UDP socket.
pub struct SimServer {
    socket: UdpSocket,
    daemon: Arc<Mutex<SimDaemon>>,
}

impl SimServer {
    /// Bind `addr` and serve `daemon` from it.
    pub fn bind(addr: impl ToSocketAddrs, daemon: SimDaemon) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;
        Ok(SimServer {
            socket,
            daemon: Arc::new(Mutex::new(daemon)),
        })
    }

    /// Address the server listens on.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Shared handle to the daemon state.
    pub fn daemon(&self) -> Arc<Mutex<SimDaemon>> {
        self.daemon.clone()
    }

    /// Serve until `stop` is set.
    pub fn run(&self, stop: &AtomicBool) -> io::Result<()> {
        info!(addr = %self.local_addr()?, "simulated daemon waiting for requests");
        let mut buf = [0u8; MAX_RESPONSE_LEN];

        while !stop.load(Ordering::Relaxed) {
            let (len, peer) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    continue
                }
                Err(e) if e.kind() == io::ErrorKind::ConnectionReset => continue,
                Err(e) => return Err(e),
            };

            let reply = self.daemon.lock().handle(&buf[..len]);
            if let Some(reply) = reply {
                if let Err(e) = self.socket.send_to(&reply, peer) {
                    warn!(%peer, error = %e, "failed to send reply");
                }
            }
        }

        info!("simulated daemon stopped");
        Ok(())
    }

    /// Serve on a background thread.
    pub fn spawn(self) -> io::Result<SimServerHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let addr = self.socket.local_addr()?;
        let daemon = self.daemon.clone();
        let thread_stop = stop.clone();
        let thread = thread::Builder::new()
            .name("gpio-proxy-sim".to_string())
            .spawn(move || self.run(&thread_stop))?;

        Ok(SimServerHandle {
            addr,
            daemon,
            stop,
            thread: Some(thread),
        })
    }
}

/// Handle to a [`SimServer`] running on a background thread.
///
/// Dropping the handle stops the server.
pub struct SimServerHandle {
    addr: SocketAddr,
    daemon: Arc<Mutex<SimDaemon>>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<io::Result<()>>>,
}

impl SimServerHandle {
    /// Address the server listens on.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared handle to the daemon state.
    pub fn daemon(&self) -> Arc<Mutex<SimDaemon>> {
        self.daemon.clone()
    }

    /// Stop the server and wait for its thread.
    pub fn shutdown(mut self) -> io::Result<()> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> io::Result<()> {
        self.stop.store(true, Ordering::Relaxed);
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "server thread panicked"))),
            None => Ok(()),
        }
    }
}

impl Drop for SimServerHandle {
    fn drop(&mut self) {
        let _ = self.stop_and_join();
    }
}
