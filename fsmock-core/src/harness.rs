//! Scripted request/response exchanges against a mock server.
//!
//! A client call runs on the calling thread while one scoped worker answers each request the
//! mock server observes with the next scripted [`FuseResponse`], stamped with the request's
//! `message_id`. The raw request bytes are handed back in reply order.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use fsmock_proto::{FuseResponse, ServerMessage, decode_client_message};

use crate::control::MockControl;
use crate::error::{Error, Result};

pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeOptions {
    /// Bound on each wait for the next client message. `None` waits forever.
    pub wait_timeout: Option<Duration>,
}

impl Default for ExchangeOptions {
    fn default() -> Self {
        Self {
            wait_timeout: Some(DEFAULT_WAIT_TIMEOUT),
        }
    }
}

impl ExchangeOptions {
    pub fn unbounded() -> Self {
        Self { wait_timeout: None }
    }

    pub fn with_wait_timeout(timeout: Duration) -> Self {
        Self {
            wait_timeout: Some(timeout),
        }
    }
}

/// Ordered replies, one per client request expected during the exchange.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptedReplies(Vec<FuseResponse>);

impl ScriptedReplies {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<FuseResponse> for ScriptedReplies {
    fn from(reply: FuseResponse) -> Self {
        Self(vec![reply])
    }
}

impl From<Vec<FuseResponse>> for ScriptedReplies {
    fn from(replies: Vec<FuseResponse>) -> Self {
        Self(replies)
    }
}

impl<const N: usize> From<[FuseResponse; N]> for ScriptedReplies {
    fn from(replies: [FuseResponse; N]) -> Self {
        Self(replies.into())
    }
}

impl IntoIterator for ScriptedReplies {
    type Item = FuseResponse;
    type IntoIter = std::vec::IntoIter<FuseResponse>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError<E> {
    /// The client operation's own error, returned untouched.
    #[error("{0}")]
    Client(E),

    #[error(transparent)]
    Harness(Error),
}

impl<E> ExchangeError<E> {
    pub fn client(&self) -> Option<&E> {
        match self {
            ExchangeError::Client(e) => Some(e),
            ExchangeError::Harness(_) => None,
        }
    }

    pub fn into_client(self) -> Option<E> {
        match self {
            ExchangeError::Client(e) => Some(e),
            ExchangeError::Harness(_) => None,
        }
    }

    pub fn harness(&self) -> Option<&Error> {
        match self {
            ExchangeError::Client(_) => None,
            ExchangeError::Harness(e) => Some(e),
        }
    }
}

/// Runs `client_operation` while answering its requests with `replies`, using
/// [`ExchangeOptions::default`].
pub fn run_with_scripted_replies<C, F, T, E>(
    control: &C,
    replies: impl Into<ScriptedReplies>,
    client_operation: F,
) -> std::result::Result<(T, Vec<Bytes>), ExchangeError<E>>
where
    C: MockControl + ?Sized,
    F: FnOnce() -> std::result::Result<T, E>,
{
    run_with_scripted_replies_opts(
        control,
        replies,
        ExchangeOptions::default(),
        client_operation,
    )
}

/// Runs `client_operation` on the calling thread while a scoped worker relays `replies`.
///
/// On success returns the operation's value and exactly `replies.len()` intercepted requests in
/// reply order. The worker is joined on every path, including a failing or panicking operation.
pub fn run_with_scripted_replies_opts<C, F, T, E>(
    control: &C,
    replies: impl Into<ScriptedReplies>,
    options: ExchangeOptions,
    client_operation: F,
) -> std::result::Result<(T, Vec<Bytes>), ExchangeError<E>>
where
    C: MockControl + ?Sized,
    F: FnOnce() -> std::result::Result<T, E>,
{
    let replies = replies.into();
    let expected = replies.len();
    let (tx, rx) = mpsc::channel::<Result<Bytes>>();

    tracing::debug!(replies = expected, "starting scripted exchange");

    thread::scope(|scope| {
        let worker =
            scope.spawn(move || relay_replies(control, replies, options.wait_timeout, tx));

        let outcome = match client_operation() {
            Ok(value) => collect_intercepted(&rx, expected)
                .map(|received| (value, received))
                .map_err(ExchangeError::Harness),
            Err(err) => Err(ExchangeError::Client(err)),
        };

        if let Err(panic) = worker.join() {
            std::panic::resume_unwind(panic);
        }

        outcome
    })
}

fn collect_intercepted(rx: &mpsc::Receiver<Result<Bytes>>, expected: usize) -> Result<Vec<Bytes>> {
    let mut received = Vec::with_capacity(expected);
    for _ in 0..expected {
        match rx.recv() {
            Ok(Ok(msg)) => received.push(msg),
            Ok(Err(err)) => return Err(err),
            Err(_) => return Err(Error::WorkerDisconnected),
        }
    }
    Ok(received)
}

fn relay_replies<C>(
    control: &C,
    replies: ScriptedReplies,
    wait_timeout: Option<Duration>,
    tx: mpsc::Sender<Result<Bytes>>,
) where
    C: MockControl + ?Sized,
{
    for (idx, reply) in replies.into_iter().enumerate() {
        let step = relay_reply(control, reply, wait_timeout);
        let failed = step.is_err();
        if let Err(err) = &step {
            tracing::debug!(reply = idx, error = %err, "reply worker stopping");
        }

        if tx.send(step).is_err() || failed {
            return;
        }
    }
}

fn relay_reply<C>(control: &C, reply: FuseResponse, wait_timeout: Option<Duration>) -> Result<Bytes>
where
    C: MockControl + ?Sized,
{
    let history = control.wait_for_any_messages(wait_timeout)?;
    control.reset_history()?;

    let observed = history.len();
    let Some(received) = history.into_iter().next() else {
        return Err(Error::EmptyHistory);
    };
    if observed > 1 {
        tracing::debug!(
            observed,
            "more than one message observed in one wait; replying to the first"
        );
    }

    let request = decode_client_message(received.clone())?;
    tracing::debug!(message_id = %request.message_id, "relaying scripted reply");

    let response = ServerMessage::fuse_response(request.message_id, reply);
    control.send(response.to_bytes())?;

    Ok(received)
}
