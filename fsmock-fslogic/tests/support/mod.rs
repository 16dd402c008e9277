#![allow(dead_code)]

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context as _;
use fsmock_core::{ExchangeError, ScriptedReplies, run_with_scripted_replies};
use fsmock_fslogic::{FsError, FsLogicClient};
use fsmock_proto::{
    Code, FileAttr, FileType, FuseRequest, FuseResponse, decode_client_message,
};
use fsmock_testserver::MockServer;
use rand::Rng as _;

pub type Exchange<T> = Result<(T, Vec<FuseRequest>), ExchangeError<FsError>>;

/// A mock server on a private runtime plus a client connected to it.
///
/// Field order matters: the client disconnects before the server stops and the runtime goes
/// away last.
pub struct Fixture {
    pub fl: FsLogicClient,
    pub server: MockServer,
    rt: tokio::runtime::Runtime,
}

impl Fixture {
    pub fn start() -> anyhow::Result<Self> {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .context("build server runtime")?;
        let server = rt
            .block_on(MockServer::start())
            .context("start mock server")?;
        let fl = FsLogicClient::connect_with_timeout(server.tcp_addr(), Duration::from_secs(10))
            .context("connect fslogic client")?;
        Ok(Self { fl, server, rt })
    }

    /// Runs `op` against the client while the mock server answers with `replies`.
    pub fn with_reply<T>(
        &self,
        replies: impl Into<ScriptedReplies>,
        op: impl FnOnce(&FsLogicClient) -> fsmock_fslogic::Result<T>,
    ) -> Exchange<T> {
        let (value, received) = run_with_scripted_replies(&self.server, replies, || op(&self.fl))?;
        let requests = received
            .iter()
            .map(|msg| decode_request(msg))
            .collect::<anyhow::Result<Vec<_>>>();
        match requests {
            Ok(requests) => Ok((value, requests)),
            Err(err) => panic!("intercepted an undecodable request: {err:#}"),
        }
    }
}

pub fn decode_request(msg: &[u8]) -> anyhow::Result<FuseRequest> {
    decode_client_message(msg)
        .context("decode client message")?
        .as_fuse_request()
        .cloned()
        .context("client message without a fuse request")
}

pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Successful getattr reply with randomized attributes.
pub fn prepare_getattr(name: &str, file_type: FileType) -> FuseResponse {
    let mut rng = rand::thread_rng();
    let mtime = now_secs() - rng.gen_range(1..=1_000_000);
    let atime = mtime - rng.gen_range(1..=1_000_000);
    let ctime = atime - rng.gen_range(1..=1_000_000);

    FuseResponse::with_file_attr(FileAttr {
        uuid: rng.gen_range(0..=1_000_000_000u64).to_string(),
        name: name.to_string(),
        mode: rng.gen_range(0..=0o1777),
        uid: rng.gen_range(0..=20_000),
        gid: rng.gen_range(0..=20_000),
        mtime,
        atime,
        ctime,
        file_type: file_type.into(),
        size: Some(rng.gen_range(0..=1_000_000_000)),
    })
}

pub fn status(code: Code) -> FuseResponse {
    FuseResponse::with_code(code)
}

pub fn attr_of(response: &FuseResponse) -> anyhow::Result<&FileAttr> {
    response.file_attr().context("reply carries no file attributes")
}

/// The client's error message, or a description of why there is none.
pub fn error_text<T: std::fmt::Debug>(result: Exchange<T>) -> String {
    match result {
        Ok((value, _)) => format!("unexpected success: {value:?}"),
        Err(err) => err.to_string(),
    }
}
