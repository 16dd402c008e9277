//! Client/server envelopes of the filesystem-logic protocol.
//!
//! Every request the client sends is a [`ClientMessage`] carrying a `message_id`; the matching
//! [`ServerMessage`] echoes that identifier so the client can pair replies with requests.

use bytes::{Buf, Bytes};
use prost::Message as _;

use crate::error::Result;

#[derive(Clone, PartialEq, prost::Message)]
pub struct ClientMessage {
    #[prost(string, tag = "1")]
    pub message_id: String,
    #[prost(oneof = "client_message::Body", tags = "2")]
    pub body: Option<client_message::Body>,
}

pub mod client_message {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Body {
        #[prost(message, tag = "2")]
        FuseRequest(super::FuseRequest),
    }
}

impl ClientMessage {
    pub fn fuse_request(message_id: impl Into<String>, request: fuse_request::Request) -> Self {
        Self {
            message_id: message_id.into(),
            body: Some(client_message::Body::FuseRequest(FuseRequest {
                request: Some(request),
            })),
        }
    }

    pub fn as_fuse_request(&self) -> Option<&FuseRequest> {
        match &self.body {
            Some(client_message::Body::FuseRequest(r)) => Some(r),
            None => None,
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.encode_to_vec())
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ServerMessage {
    #[prost(string, tag = "1")]
    pub message_id: String,
    #[prost(oneof = "server_message::Body", tags = "2")]
    pub body: Option<server_message::Body>,
}

pub mod server_message {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Body {
        #[prost(message, tag = "2")]
        FuseResponse(super::FuseResponse),
    }
}

impl ServerMessage {
    pub fn fuse_response(message_id: impl Into<String>, response: FuseResponse) -> Self {
        Self {
            message_id: message_id.into(),
            body: Some(server_message::Body::FuseResponse(response)),
        }
    }

    pub fn as_fuse_response(&self) -> Option<&FuseResponse> {
        match &self.body {
            Some(server_message::Body::FuseResponse(r)) => Some(r),
            None => None,
        }
    }

    pub fn into_fuse_response(self) -> Option<FuseResponse> {
        match self.body {
            Some(server_message::Body::FuseResponse(r)) => Some(r),
            None => None,
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.encode_to_vec())
    }
}

pub fn decode_client_message(buf: impl Buf) -> Result<ClientMessage> {
    Ok(ClientMessage::decode(buf)?)
}

pub fn decode_server_message(buf: impl Buf) -> Result<ServerMessage> {
    Ok(ServerMessage::decode(buf)?)
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FuseRequest {
    #[prost(oneof = "fuse_request::Request", tags = "1, 2, 3, 4, 5, 6, 7")]
    pub request: Option<fuse_request::Request>,
}

pub mod fuse_request {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Request {
        #[prost(message, tag = "1")]
        GetFileAttr(super::GetFileAttr),
        #[prost(message, tag = "2")]
        GetFileChildren(super::GetFileChildren),
        #[prost(message, tag = "3")]
        CreateDir(super::CreateDir),
        #[prost(message, tag = "4")]
        DeleteFile(super::DeleteFile),
        #[prost(message, tag = "5")]
        UpdateTimes(super::UpdateTimes),
        #[prost(message, tag = "6")]
        ChangeMode(super::ChangeMode),
        #[prost(message, tag = "7")]
        Rename(super::Rename),
    }
}

macro_rules! request_accessor {
    ($fn_name:ident, $variant:ident, $ty:ty) => {
        pub fn $fn_name(&self) -> Option<&$ty> {
            match &self.request {
                Some(fuse_request::Request::$variant(r)) => Some(r),
                _ => None,
            }
        }
    };
}

impl FuseRequest {
    request_accessor!(get_file_attr, GetFileAttr, GetFileAttr);
    request_accessor!(get_file_children, GetFileChildren, GetFileChildren);
    request_accessor!(create_dir, CreateDir, CreateDir);
    request_accessor!(delete_file, DeleteFile, DeleteFile);
    request_accessor!(update_times, UpdateTimes, UpdateTimes);
    request_accessor!(change_mode, ChangeMode, ChangeMode);
    request_accessor!(rename, Rename, Rename);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum EntryType {
    Path = 0,
    Uuid = 1,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetFileAttr {
    #[prost(enumeration = "EntryType", tag = "1")]
    pub entry_type: i32,
    #[prost(string, tag = "2")]
    pub entry: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetFileChildren {
    #[prost(string, tag = "1")]
    pub uuid: String,
    #[prost(int64, tag = "2")]
    pub offset: i64,
    #[prost(int64, optional, tag = "3")]
    pub size: Option<i64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CreateDir {
    #[prost(string, tag = "1")]
    pub parent_uuid: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(uint32, tag = "3")]
    pub mode: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeleteFile {
    #[prost(string, tag = "1")]
    pub uuid: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UpdateTimes {
    #[prost(string, tag = "1")]
    pub uuid: String,
    #[prost(int64, optional, tag = "2")]
    pub atime: Option<i64>,
    #[prost(int64, optional, tag = "3")]
    pub mtime: Option<i64>,
    #[prost(int64, optional, tag = "4")]
    pub ctime: Option<i64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ChangeMode {
    #[prost(string, tag = "1")]
    pub uuid: String,
    #[prost(uint32, tag = "2")]
    pub mode: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Rename {
    #[prost(string, tag = "1")]
    pub uuid: String,
    #[prost(string, tag = "2")]
    pub target_path: String,
}

/// POSIX-style status codes carried by every [`FuseResponse`].
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    prost::Enumeration,
    strum::Display,
    strum::IntoStaticStr,
)]
#[repr(i32)]
pub enum Code {
    #[strum(serialize = "VOK")]
    Ok = 0,
    #[strum(serialize = "VENOENT")]
    Enoent = 1,
    #[strum(serialize = "VEACCES")]
    Eacces = 2,
    #[strum(serialize = "VEEXIST")]
    Eexist = 3,
    #[strum(serialize = "VEIO")]
    Eio = 4,
    #[strum(serialize = "VENOTSUP")]
    Enotsup = 5,
    #[strum(serialize = "VENOTEMPTY")]
    Enotempty = 6,
    #[strum(serialize = "VEREMOTEIO")]
    Eremoteio = 7,
    #[strum(serialize = "VEPERM")]
    Eperm = 8,
    #[strum(serialize = "VEINVAL")]
    Einval = 9,
    #[strum(serialize = "VEDQUOT")]
    Edquot = 10,
    #[strum(serialize = "VENOATTR")]
    Enoattr = 11,
    #[strum(serialize = "VECOMM")]
    Ecomm = 12,
}

impl Code {
    /// The `strerror` text a client reports for this code.
    pub fn posix_message(self) -> &'static str {
        match self {
            Code::Ok => "Success",
            Code::Enoent => "No such file or directory",
            Code::Eacces => "Permission denied",
            Code::Eexist => "File exists",
            Code::Eio => "Input/output error",
            Code::Enotsup => "Operation not supported",
            Code::Enotempty => "Directory not empty",
            Code::Eremoteio => "Remote I/O error",
            Code::Eperm => "Operation not permitted",
            Code::Einval => "Invalid argument",
            Code::Edquot => "Disk quota exceeded",
            Code::Enoattr => "No data available",
            Code::Ecomm => "Communication error on send",
        }
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Status {
    #[prost(enumeration = "Code", tag = "1")]
    pub code: i32,
    #[prost(string, optional, tag = "2")]
    pub description: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum FileType {
    Reg = 0,
    Dir = 1,
    Lnk = 2,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FileAttr {
    #[prost(string, tag = "1")]
    pub uuid: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(uint32, tag = "3")]
    pub mode: u32,
    #[prost(uint32, tag = "4")]
    pub uid: u32,
    #[prost(uint32, tag = "5")]
    pub gid: u32,
    #[prost(int64, tag = "6")]
    pub mtime: i64,
    #[prost(int64, tag = "7")]
    pub atime: i64,
    #[prost(int64, tag = "8")]
    pub ctime: i64,
    #[prost(enumeration = "FileType", tag = "9")]
    pub file_type: i32,
    #[prost(uint64, optional, tag = "10")]
    pub size: Option<u64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ChildLink {
    #[prost(string, tag = "1")]
    pub uuid: String,
    #[prost(string, tag = "2")]
    pub name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FileChildren {
    #[prost(message, repeated, tag = "1")]
    pub child_links: Vec<ChildLink>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FuseResponse {
    #[prost(message, optional, tag = "1")]
    pub status: Option<Status>,
    #[prost(oneof = "fuse_response::Response", tags = "2, 3")]
    pub response: Option<fuse_response::Response>,
}

pub mod fuse_response {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Response {
        #[prost(message, tag = "2")]
        FileAttr(super::FileAttr),
        #[prost(message, tag = "3")]
        FileChildren(super::FileChildren),
    }
}

impl FuseResponse {
    pub fn ok() -> Self {
        Self::with_code(Code::Ok)
    }

    pub fn with_code(code: Code) -> Self {
        Self {
            status: Some(Status {
                code: code.into(),
                description: None,
            }),
            response: None,
        }
    }

    pub fn with_file_attr(attr: FileAttr) -> Self {
        Self {
            response: Some(fuse_response::Response::FileAttr(attr)),
            ..Self::ok()
        }
    }

    pub fn with_file_children(children: FileChildren) -> Self {
        Self {
            response: Some(fuse_response::Response::FileChildren(children)),
            ..Self::ok()
        }
    }

    /// Missing or unknown status codes read as [`Code::Eio`].
    pub fn status_code(&self) -> Code {
        self.status
            .as_ref()
            .and_then(|s| Code::try_from(s.code).ok())
            .unwrap_or(Code::Eio)
    }

    pub fn file_attr(&self) -> Option<&FileAttr> {
        match &self.response {
            Some(fuse_response::Response::FileAttr(a)) => Some(a),
            _ => None,
        }
    }

    pub fn file_children(&self) -> Option<&FileChildren> {
        match &self.response {
            Some(fuse_response::Response::FileChildren(c)) => Some(c),
            _ => None,
        }
    }
}
