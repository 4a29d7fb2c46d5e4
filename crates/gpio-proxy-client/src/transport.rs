//! Datagram transports.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use tracing::debug;

/// A datagram pipe to one daemon.
///
/// Implementations must preserve datagram boundaries and only deliver
/// datagrams that came from the configured peer.
pub trait Transport: Send {
    /// Send one datagram.
    fn send(&mut self, datagram: &[u8]) -> io::Result<()>;

    /// Receive one datagram into `buf`.
    ///
    /// Returns `Ok(None)` if nothing arrived within `timeout`. `None` as the
    /// timeout blocks until a datagram arrives.
    fn recv(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> io::Result<Option<usize>>;

    /// Drop every datagram already queued, returning how many were dropped.
    fn discard_pending(&mut self) -> io::Result<usize>;

    /// Human-readable peer address.
    fn peer(&self) -> String;
}

/// A UDP socket connected to the daemon.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpTransport {
    /// Bind a socket and connect it to `remote`.
    ///
    /// `local_port` of `None` binds an ephemeral port.
    pub fn connect(remote: SocketAddr, local_port: Option<u16>) -> io::Result<Self> {
        let port = local_port.unwrap_or(0);
        let local: SocketAddr = if remote.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, port).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, port).into()
        };

        let socket = UdpSocket::bind(local)?;
        socket.connect(remote)?;
        debug!(local = %socket.local_addr()?, %remote, "udp transport ready");

        Ok(UdpTransport {
            socket,
            peer: remote,
        })
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Address of the daemon.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        let sent = self.socket.send(datagram)?;
        if sent != datagram.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short send: {} of {} bytes", sent, datagram.len()),
            ));
        }
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> io::Result<Option<usize>> {
        // A zero read timeout is rejected by the socket API.
        if timeout.is_some_and(|t| t.is_zero()) {
            return Ok(None);
        }
        self.socket.set_read_timeout(timeout)?;

        match self.socket.recv(buf) {
            Ok(n) => Ok(Some(n)),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn discard_pending(&mut self) -> io::Result<usize> {
        let mut scratch = [0u8; 64];
        let mut dropped = 0;

        self.socket.set_nonblocking(true)?;
        let result = loop {
            match self.socket.recv(&mut scratch) {
                Ok(_) => dropped += 1,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(dropped),
                // ICMP unreachable from an earlier send surfaces here.
                Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => continue,
                Err(e) => break Err(e),
            }
        };
        self.socket.set_nonblocking(false)?;
        result
    }

    fn peer(&self) -> String {
        self.peer.to_string()
    }
}
