mod control;
mod error;
mod harness;
mod http_control;

pub mod perf;

pub use control::MockControl;
pub use error::{Error, Result};
pub use harness::{
    DEFAULT_WAIT_TIMEOUT, ExchangeError, ExchangeOptions, ScriptedReplies,
    run_with_scripted_replies, run_with_scripted_replies_opts,
};
pub use http_control::{
    HttpMockControl, MessageCount, PATH_ALL_MESSAGES_COUNT, PATH_RESET_HISTORY, PATH_SEND,
    PATH_WAIT_FOR_ANY_MESSAGES,
};
