//! In-memory transport for tests.
//!
//! [`MockTransport`] records every datagram the client sends and feeds back
//! replies produced by a responder. Clones share state, so a test can hand
//! one clone to the client and inspect another.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::sim::SimDaemon;
use crate::transport::Transport;

type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

struct MockState {
    sent: Vec<Vec<u8>>,
    inbound: VecDeque<Vec<u8>>,
    responder: Responder,
}

/// A transport that never touches the network.
///
/// `recv` returns `Ok(None)` as soon as no reply is queued, so a missing
/// reply shows up as a timeout without waiting.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Answer each sent datagram with the datagrams `responder` returns.
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Vec<Vec<u8>> + Send + 'static,
    {
        MockTransport {
            state: Arc::new(Mutex::new(MockState {
                sent: Vec::new(),
                inbound: VecDeque::new(),
                responder: Box::new(responder),
            })),
        }
    }

    /// Answer the n-th sent datagram with the n-th reply. An empty reply
    /// means the datagram is lost; once the script runs out nothing is
    /// answered.
    pub fn scripted(replies: impl IntoIterator<Item = Vec<u8>>) -> Self {
        let mut replies: VecDeque<Vec<u8>> = replies.into_iter().collect();
        Self::from_fn(move |_| match replies.pop_front() {
            Some(reply) if !reply.is_empty() => vec![reply],
            _ => Vec::new(),
        })
    }

    /// Never answer.
    pub fn silent() -> Self {
        Self::from_fn(|_| Vec::new())
    }

    /// Answer like a daemon with the given pin table.
    pub fn with_daemon(daemon: SimDaemon) -> Self {
        Self::with_shared_daemon(Arc::new(Mutex::new(daemon)))
    }

    /// Answer like a daemon whose state the test keeps a handle to.
    pub fn with_shared_daemon(daemon: Arc<Mutex<SimDaemon>>) -> Self {
        Self::from_fn(move |datagram| daemon.lock().handle(datagram).into_iter().collect())
    }

    /// Queue a datagram as if it had arrived late.
    pub fn push_inbound(&self, datagram: Vec<u8>) {
        self.state.lock().inbound.push_back(datagram);
    }

    /// Everything sent so far.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state.lock().sent.clone()
    }

    /// Number of datagrams sent so far.
    pub fn sent_count(&self) -> usize {
        self.state.lock().sent.len()
    }

    /// Operation bytes of everything sent so far.
    pub fn sent_operations(&self) -> Vec<u8> {
        self.state.lock().sent.iter().filter_map(|d| d.first().copied()).collect()
    }
}

impl Transport for MockTransport {
    fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock();
        state.sent.push(datagram.to_vec());
        let replies = (state.responder)(datagram);
        state.inbound.extend(replies);
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8], _timeout: Option<Duration>) -> io::Result<Option<usize>> {
        let Some(datagram) = self.state.lock().inbound.pop_front() else {
            return Ok(None);
        };
        let len = datagram.len().min(buf.len());
        buf[..len].copy_from_slice(&datagram[..len]);
        Ok(Some(len))
    }

    fn discard_pending(&mut self) -> io::Result<usize> {
        let mut state = self.state.lock();
        let dropped = state.inbound.len();
        state.inbound.clear();
        Ok(dropped)
    }

    fn peer(&self) -> String {
        "mock".to_string()
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockTransport")
            .field("sent", &state.sent.len())
            .field("inbound", &state.inbound.len())
            .finish()
    }
}
