use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use fsmock_core::{Error, MockControl, Result};
use parking_lot::{Condvar, Mutex};
use tokio::sync::mpsc;

/// Message history and connected peers shared by the TCP side and the control side.
#[derive(Debug, Clone, Default)]
pub struct MockState {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    history: Mutex<Vec<Bytes>>,
    observed: Condvar,
    peers: Mutex<Vec<mpsc::UnboundedSender<Bytes>>>,
}

impl MockState {
    pub(crate) fn record(&self, message: Bytes) {
        let mut history = self.inner.history.lock();
        history.push(message);
        self.inner.observed.notify_all();
    }

    pub(crate) fn add_peer(&self, tx: mpsc::UnboundedSender<Bytes>) {
        self.inner.peers.lock().push(tx);
    }

    pub fn history(&self) -> Vec<Bytes> {
        self.inner.history.lock().clone()
    }

    pub fn message_count(&self) -> usize {
        self.inner.history.lock().len()
    }

    pub fn reset(&self) {
        self.inner.history.lock().clear();
    }

    /// Blocks until the history is non-empty. `None` once `timeout` elapses first.
    pub fn wait_for_any(&self, timeout: Option<Duration>) -> Option<Vec<Bytes>> {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut history = self.inner.history.lock();
        while history.is_empty() {
            match deadline {
                Some(deadline) => {
                    if self.inner.observed.wait_until(&mut history, deadline).timed_out()
                        && history.is_empty()
                    {
                        return None;
                    }
                }
                None => self.inner.observed.wait(&mut history),
            }
        }
        Some(history.clone())
    }

    /// Queues `message` for every open connection; returns how many received it.
    pub fn broadcast(&self, message: Bytes) -> usize {
        let mut peers = self.inner.peers.lock();
        peers.retain(|tx| tx.send(message.clone()).is_ok());
        peers.len()
    }

    pub fn peer_count(&self) -> usize {
        let mut peers = self.inner.peers.lock();
        peers.retain(|tx| !tx.is_closed());
        peers.len()
    }
}

impl MockControl for MockState {
    fn wait_for_any_messages(&self, timeout: Option<Duration>) -> Result<Vec<Bytes>> {
        self.wait_for_any(timeout)
            .ok_or_else(|| Error::Timeout(timeout.unwrap_or_default()))
    }

    fn reset_history(&self) -> Result<()> {
        self.reset();
        Ok(())
    }

    fn send(&self, message: Bytes) -> Result<()> {
        match self.broadcast(message) {
            0 => Err(Error::NoPeers),
            _ => Ok(()),
        }
    }

    fn all_messages_count(&self) -> Result<usize> {
        Ok(self.message_count())
    }
}
