use std::time::Duration;

use bytes::Bytes;
use fsmock_proto::FrameDecoder;
use http::{Method, StatusCode};
use http_body_util::{BodyExt as _, Full};
use hyper::Request;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::{Deserialize, Serialize};

use crate::control::MockControl;
use crate::error::{Error, Result};

pub const PATH_WAIT_FOR_ANY_MESSAGES: &str = "/tcp_server/wait_for_any_messages";
pub const PATH_RESET_HISTORY: &str = "/tcp_server/reset_history";
pub const PATH_SEND: &str = "/tcp_server/send";
pub const PATH_ALL_MESSAGES_COUNT: &str = "/tcp_server/all_messages_count";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCount {
    pub count: usize,
}

/// [`MockControl`] over the mock server's HTTP control API.
///
/// `wait_for_any_messages` answers with the observed messages as length-prefixed frames; a
/// `504` means the server-side wait timed out.
pub struct HttpMockControl {
    base_url: String,
    rt: tokio::runtime::Runtime,
    inner: Client<HttpConnector, Full<Bytes>>,
}

impl std::fmt::Debug for HttpMockControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMockControl")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpMockControl {
    pub fn new(control_url: impl Into<String>) -> Result<Self> {
        let base_url = control_url.into().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") {
            return Err(Error::InvalidUrl(base_url));
        }

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let inner = {
            let _guard = rt.enter();
            Client::builder(TokioExecutor::new()).build(HttpConnector::new())
        };

        Ok(Self {
            base_url,
            rt,
            inner,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn call(&self, method: Method, path_and_query: &str, body: Bytes) -> Result<(StatusCode, Bytes)> {
        let url = format!("{}{path_and_query}", self.base_url);
        let uri: hyper::Uri = url.parse().map_err(|_| Error::InvalidUrl(url.clone()))?;
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(body))?;

        self.rt.block_on(async {
            let res = self.inner.request(req).await?;
            let (parts, body) = res.into_parts();
            let body = body.collect().await?.to_bytes();
            Ok((parts.status, body))
        })
    }

    fn expect_ok(status: StatusCode, body: &Bytes) -> Result<()> {
        if status.is_success() {
            return Ok(());
        }
        Err(Error::ControlStatus {
            status: status.as_u16(),
            body: String::from_utf8_lossy(body).into_owned(),
        })
    }
}

impl MockControl for HttpMockControl {
    fn wait_for_any_messages(&self, timeout: Option<Duration>) -> Result<Vec<Bytes>> {
        let path = match timeout {
            Some(t) => format!("{PATH_WAIT_FOR_ANY_MESSAGES}?timeout_ms={}", t.as_millis()),
            None => PATH_WAIT_FOR_ANY_MESSAGES.to_string(),
        };

        let (status, body) = self.call(Method::POST, &path, Bytes::new())?;
        if status == StatusCode::GATEWAY_TIMEOUT {
            return Err(Error::Timeout(timeout.unwrap_or_default()));
        }
        Self::expect_ok(status, &body)?;

        let mut decoder = FrameDecoder::default();
        decoder.extend_from_slice(&body);
        let mut messages = Vec::new();
        while let Some(frame) = decoder.next_frame()? {
            messages.push(frame);
        }
        if decoder.buffered() > 0 {
            return Err(Error::Control(format!(
                "{} trailing bytes after the last message frame",
                decoder.buffered()
            )));
        }
        Ok(messages)
    }

    fn reset_history(&self) -> Result<()> {
        let (status, body) = self.call(Method::POST, PATH_RESET_HISTORY, Bytes::new())?;
        Self::expect_ok(status, &body)
    }

    fn send(&self, message: Bytes) -> Result<()> {
        let (status, body) = self.call(Method::POST, PATH_SEND, message)?;
        if status == StatusCode::CONFLICT {
            return Err(Error::NoPeers);
        }
        Self::expect_ok(status, &body)
    }

    fn all_messages_count(&self) -> Result<usize> {
        let (status, body) = self.call(Method::GET, PATH_ALL_MESSAGES_COUNT, Bytes::new())?;
        Self::expect_ok(status, &body)?;
        let count: MessageCount = serde_json::from_slice(&body)?;
        Ok(count.count)
    }
}
