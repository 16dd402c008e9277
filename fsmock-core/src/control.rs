use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// Control surface of a mock TCP server that records what clients send and lets a test push
/// frames back to them.
///
/// Implementations are shared between the thread running the client call and the reply worker,
/// so they must be `Sync`.
pub trait MockControl: Send + Sync {
    /// Blocks until at least one message was observed since the last reset and returns the
    /// whole history. `None` waits without a bound.
    fn wait_for_any_messages(&self, timeout: Option<Duration>) -> Result<Vec<Bytes>>;

    fn reset_history(&self) -> Result<()>;

    /// Delivers one message to the connected client(s).
    fn send(&self, message: Bytes) -> Result<()>;

    fn all_messages_count(&self) -> Result<usize>;
}

impl<T: MockControl + ?Sized> MockControl for &T {
    fn wait_for_any_messages(&self, timeout: Option<Duration>) -> Result<Vec<Bytes>> {
        (**self).wait_for_any_messages(timeout)
    }

    fn reset_history(&self) -> Result<()> {
        (**self).reset_history()
    }

    fn send(&self, message: Bytes) -> Result<()> {
        (**self).send(message)
    }

    fn all_messages_count(&self) -> Result<usize> {
        (**self).all_messages_count()
    }
}

impl<T: MockControl + ?Sized> MockControl for std::sync::Arc<T> {
    fn wait_for_any_messages(&self, timeout: Option<Duration>) -> Result<Vec<Bytes>> {
        (**self).wait_for_any_messages(timeout)
    }

    fn reset_history(&self) -> Result<()> {
        (**self).reset_history()
    }

    fn send(&self, message: Bytes) -> Result<()> {
        (**self).send(message)
    }

    fn all_messages_count(&self) -> Result<usize> {
        (**self).all_messages_count()
    }
}
