//! Mock framed-TCP server for exercising protocol clients.
//!
//! Clients connect over plain TCP and exchange length-prefixed protobuf frames. Every frame a
//! client sends lands in a history; a test (in-process through [`MockControl`], or remotely
//! through the HTTP control API) waits for it, clears it and pushes replies back.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use fsmock_core::MockControl;
use fsmock_proto::{FrameDecoder, encode_frame};
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};

mod control;
mod state;

pub use control::router;
pub use state::MockState;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);
const READ_CHUNK: usize = 8 * 1024;

pub struct MockServer {
    tcp_addr: SocketAddr,
    control_addr: SocketAddr,
    state: MockState,
    shutdown_tx: Option<watch::Sender<bool>>,
    tasks: Vec<JoinHandle<()>>,
}

impl MockServer {
    pub async fn start() -> std::io::Result<Self> {
        let loopback = SocketAddr::from(([127, 0, 0, 1], 0));
        Self::start_on(loopback, loopback).await
    }

    pub async fn start_on(tcp_bind: SocketAddr, control_bind: SocketAddr) -> std::io::Result<Self> {
        let tcp = TcpListener::bind(tcp_bind).await?;
        let tcp_addr = tcp.local_addr()?;
        let control = TcpListener::bind(control_bind).await?;
        let control_addr = control.local_addr()?;

        let state = MockState::default();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let tcp_task = tokio::spawn(accept_loop(tcp, state.clone(), shutdown_rx.clone()));

        let app = router(state.clone());
        let mut control_shutdown = shutdown_rx;
        let control_task = tokio::spawn(async move {
            let serve = axum::serve(control, app).with_graceful_shutdown(async move {
                let _ = control_shutdown.changed().await;
            });
            if let Err(err) = serve.await {
                tracing::warn!(error = %err, "control server stopped");
            }
        });

        tracing::debug!(%tcp_addr, %control_addr, "mock server started");

        Ok(Self {
            tcp_addr,
            control_addr,
            state,
            shutdown_tx: Some(shutdown_tx),
            tasks: vec![tcp_task, control_task],
        })
    }

    pub fn tcp_addr(&self) -> SocketAddr {
        self.tcp_addr
    }

    pub fn control_addr(&self) -> SocketAddr {
        self.control_addr
    }

    pub fn control_url(&self) -> String {
        format!("http://{}", self.control_addr)
    }

    pub fn state(&self) -> &MockState {
        &self.state
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }

        for mut task in std::mem::take(&mut self.tasks) {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                task.abort();
            }
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some() {
            for task in &self.tasks {
                task.abort();
            }
        }
    }
}

impl MockControl for MockServer {
    fn wait_for_any_messages(&self, timeout: Option<Duration>) -> fsmock_core::Result<Vec<Bytes>> {
        self.state.wait_for_any_messages(timeout)
    }

    fn reset_history(&self) -> fsmock_core::Result<()> {
        self.state.reset_history()
    }

    fn send(&self, message: Bytes) -> fsmock_core::Result<()> {
        MockControl::send(&self.state, message)
    }

    fn all_messages_count(&self) -> fsmock_core::Result<usize> {
        self.state.all_messages_count()
    }
}

async fn accept_loop(listener: TcpListener, state: MockState, mut shutdown: watch::Receiver<bool>) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    connections.spawn(serve_connection(stream, peer, state.clone()));
                }
                Err(err) => tracing::warn!(error = %err, "accept failed"),
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            _ = shutdown.changed() => break,
        }
    }
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, state: MockState) {
    let (mut reader, mut writer) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
    state.add_peer(tx);
    tracing::debug!(%peer, "client connected");

    let mut decoder = FrameDecoder::default();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        tokio::select! {
            read = reader.read(&mut buf) => {
                let n = match read {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(err) => {
                        tracing::debug!(%peer, error = %err, "read from client failed");
                        break;
                    }
                };
                decoder.extend_from_slice(&buf[..n]);
                if let Err(err) = drain_frames(&mut decoder, &state) {
                    tracing::warn!(%peer, error = %err, "dropping client with a malformed frame");
                    break;
                }
            }
            Some(message) = rx.recv() => {
                let frame = match encode_frame(&message) {
                    Ok(frame) => frame,
                    Err(err) => {
                        tracing::warn!(%peer, error = %err, "not delivering oversized message");
                        continue;
                    }
                };
                if let Err(err) = writer.write_all(&frame).await {
                    tracing::debug!(%peer, error = %err, "write to client failed");
                    break;
                }
            }
        }
    }

    tracing::debug!(%peer, "client disconnected");
}

fn drain_frames(decoder: &mut FrameDecoder, state: &MockState) -> fsmock_proto::Result<()> {
    while let Some(frame) = decoder.next_frame()? {
        state.record(frame);
    }
    Ok(())
}
