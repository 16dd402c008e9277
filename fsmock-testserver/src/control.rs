use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use bytes::BytesMut;
use fsmock_core::{
    MessageCount, PATH_ALL_MESSAGES_COUNT, PATH_RESET_HISTORY, PATH_SEND,
    PATH_WAIT_FOR_ANY_MESSAGES,
};
use fsmock_proto::encode_frame;
use serde::Deserialize;

use crate::state::MockState;

#[derive(Debug, Deserialize)]
struct WaitQuery {
    timeout_ms: Option<u64>,
}

async fn handle_wait(State(state): State<MockState>, Query(query): Query<WaitQuery>) -> Response {
    let timeout = query.timeout_ms.map(Duration::from_millis);
    let waited = tokio::task::spawn_blocking(move || state.wait_for_any(timeout)).await;

    match waited {
        Ok(Some(messages)) => {
            let mut body = BytesMut::new();
            for message in &messages {
                match encode_frame(message) {
                    Ok(frame) => body.extend_from_slice(&frame),
                    Err(err) => {
                        return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
                    }
                }
            }
            (StatusCode::OK, body.freeze()).into_response()
        }
        Ok(None) => (StatusCode::GATEWAY_TIMEOUT, "no messages observed").into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

async fn handle_reset(State(state): State<MockState>) -> StatusCode {
    state.reset();
    StatusCode::OK
}

async fn handle_send(State(state): State<MockState>, body: Bytes) -> (StatusCode, &'static str) {
    match state.broadcast(body) {
        0 => (StatusCode::CONFLICT, "no connected clients"),
        _ => (StatusCode::OK, ""),
    }
}

async fn handle_count(State(state): State<MockState>) -> Json<MessageCount> {
    Json(MessageCount {
        count: state.message_count(),
    })
}

pub fn router(state: MockState) -> Router {
    Router::new()
        .route(PATH_WAIT_FOR_ANY_MESSAGES, post(handle_wait))
        .route(PATH_RESET_HISTORY, post(handle_reset))
        .route(PATH_SEND, post(handle_send))
        .route(PATH_ALL_MESSAGES_COUNT, get(handle_count))
        .with_state(state)
}
