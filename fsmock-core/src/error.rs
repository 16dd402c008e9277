use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("timed out after {0:?} waiting for the mock server to observe a message")]
    Timeout(Duration),

    #[error("mock server reported an empty message history")]
    EmptyHistory,

    #[error("intercepted message is not a client message: {0}")]
    Decode(#[from] fsmock_proto::Error),

    #[error("reply worker stopped before delivering all intercepted messages")]
    WorkerDisconnected,

    #[error("mock server has no connected clients to deliver to")]
    NoPeers,

    #[error("mock control request failed: {0}")]
    Control(String),

    #[error("mock control returned {status}: {body}")]
    ControlStatus { status: u16, body: String },

    #[error("invalid control url: {0}")]
    InvalidUrl(String),

    #[error("http request build failed: {0}")]
    RequestBuild(#[from] http::Error),

    #[error("http request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("failed to read response body: {0}")]
    BodyRead(#[from] hyper::Error),

    #[error("invalid control response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
