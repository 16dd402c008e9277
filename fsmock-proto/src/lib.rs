#![forbid(unsafe_code)]

mod error;
mod frame;
pub mod messages;

pub use error::{Error, Result};
pub use frame::{FrameDecoder, MAX_FRAME_LEN, encode_frame, read_frame, write_frame};
pub use messages::{
    ChangeMode, ChildLink, ClientMessage, Code, CreateDir, DeleteFile, EntryType, FileAttr,
    FileChildren, FileType, FuseRequest, FuseResponse, GetFileAttr, GetFileChildren, Rename,
    ServerMessage, Status, UpdateTimes, decode_client_message, decode_server_message,
};
