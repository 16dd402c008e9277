use std::collections::HashMap;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fsmock_proto::messages::fuse_request::Request;
use fsmock_proto::{
    ChangeMode, ClientMessage, Code, CreateDir, DeleteFile, EntryType, FileAttr, FileType,
    FuseResponse, GetFileAttr, GetFileChildren, Rename, UpdateTimes, decode_server_message,
    read_frame, write_frame,
};
use parking_lot::Mutex;

use crate::FsOperations;
use crate::error::{FsError, Result};
use crate::stat::{Stat, Ubuf};

pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking client of the filesystem-logic protocol with a per-path attribute cache.
///
/// Every operation resolves its path through `getattr` first, so a path whose attributes are
/// already cached costs one request less.
#[derive(Debug)]
pub struct FsLogicClient {
    stream: Mutex<TcpStream>,
    next_message_id: AtomicU64,
    attrs: Mutex<HashMap<String, FileAttr>>,
}

impl FsLogicClient {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        Self::connect_with_timeout(addr, DEFAULT_REPLY_TIMEOUT)
    }

    pub fn connect_with_timeout(addr: impl ToSocketAddrs, reply_timeout: Duration) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(reply_timeout))?;
        tracing::debug!(peer = ?stream.peer_addr().ok(), "fslogic client connected");

        Ok(Self {
            stream: Mutex::new(stream),
            next_message_id: AtomicU64::new(1),
            attrs: Mutex::new(HashMap::new()),
        })
    }

    /// Number of paths with cached attributes.
    pub fn cached_paths(&self) -> usize {
        self.attrs.lock().len()
    }

    fn communicate(&self, request: Request) -> Result<FuseResponse> {
        let message_id = self
            .next_message_id
            .fetch_add(1, Ordering::Relaxed)
            .to_string();
        let message = ClientMessage::fuse_request(message_id.clone(), request);

        let mut stream = self.stream.lock();
        write_frame(&mut *stream, &message.to_bytes())?;

        loop {
            let frame = read_frame(&mut *stream)?.ok_or(FsError::Disconnected)?;
            let reply = decode_server_message(frame)?;
            if reply.message_id != message_id {
                tracing::debug!(
                    expected = %message_id,
                    got = %reply.message_id,
                    "skipping reply to another request"
                );
                continue;
            }

            let response = reply
                .into_fuse_response()
                .ok_or_else(|| FsError::Protocol("server message without a fuse response".into()))?;
            return match response.status_code() {
                Code::Ok => Ok(response),
                code => Err(FsError::Status(code)),
            };
        }
    }

    fn attr(&self, path: &str) -> Result<FileAttr> {
        if let Some(attr) = self.attrs.lock().get(path) {
            return Ok(attr.clone());
        }

        let response = self.communicate(Request::GetFileAttr(GetFileAttr {
            entry_type: EntryType::Path.into(),
            entry: path.to_string(),
        }))?;
        let attr = response
            .file_attr()
            .cloned()
            .ok_or_else(|| FsError::Protocol("getattr reply without file attributes".into()))?;

        self.attrs.lock().insert(path.to_string(), attr.clone());
        Ok(attr)
    }

    fn update_cached(&self, path: &str, update: impl FnOnce(&mut FileAttr)) {
        if let Some(attr) = self.attrs.lock().get_mut(path) {
            update(attr);
        }
    }

    fn update_times(&self, path: &str, atime: i64, mtime: i64) -> Result<()> {
        let attr = self.attr(path)?;
        self.communicate(Request::UpdateTimes(UpdateTimes {
            uuid: attr.uuid,
            atime: Some(atime),
            mtime: Some(mtime),
            ctime: None,
        }))?;
        self.update_cached(path, |a| {
            a.atime = atime;
            a.mtime = mtime;
        });
        Ok(())
    }
}

fn split_parent(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => ("/", &trimmed[1..]),
        Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
        None => ("/", trimmed),
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

impl FsOperations for FsLogicClient {
    fn getattr(&self, path: &str) -> Result<Stat> {
        self.attr(path).map(|attr| Stat::from(&attr))
    }

    fn mkdir(&self, path: &str, mode: u32) -> Result<()> {
        let (parent, name) = split_parent(path);
        let parent_attr = self.attr(parent)?;
        if !matches!(FileType::try_from(parent_attr.file_type), Ok(FileType::Dir)) {
            return Err(FsError::NotADirectory);
        }

        self.communicate(Request::CreateDir(CreateDir {
            parent_uuid: parent_attr.uuid,
            name: name.to_string(),
            mode,
        }))?;
        Ok(())
    }

    fn rmdir(&self, path: &str) -> Result<()> {
        let attr = self.attr(path)?;
        self.communicate(Request::DeleteFile(DeleteFile { uuid: attr.uuid }))?;
        self.attrs.lock().remove(path);
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        let attr = self.attr(from)?;
        self.communicate(Request::Rename(Rename {
            uuid: attr.uuid,
            target_path: to.to_string(),
        }))?;

        let mut attrs = self.attrs.lock();
        if let Some(moved) = attrs.remove(from) {
            attrs.insert(to.to_string(), moved);
        }
        Ok(())
    }

    fn chmod(&self, path: &str, mode: u32) -> Result<()> {
        let attr = self.attr(path)?;
        self.communicate(Request::ChangeMode(ChangeMode {
            uuid: attr.uuid,
            mode,
        }))?;
        self.update_cached(path, |a| a.mode = mode);
        Ok(())
    }

    fn utime(&self, path: &str) -> Result<()> {
        let now = now_secs();
        self.update_times(path, now, now)
    }

    fn utime_buf(&self, path: &str, buf: Ubuf) -> Result<()> {
        self.update_times(path, buf.actime, buf.modtime)
    }

    fn readdir(&self, path: &str) -> Result<Vec<String>> {
        let attr = self.attr(path)?;
        let response = self.communicate(Request::GetFileChildren(GetFileChildren {
            uuid: attr.uuid,
            offset: 0,
            size: None,
        }))?;
        let children = response
            .file_children()
            .ok_or_else(|| FsError::Protocol("readdir reply without children".into()))?;
        Ok(children
            .child_links
            .iter()
            .map(|link| link.name.clone())
            .collect())
    }
}
