//! Client side of the filesystem-logic protocol.
//!
//! [`FsLogicClient`] turns filesystem calls into framed protobuf requests over TCP and caches the
//! attributes it learns, the way a FUSE frontend talks to its metadata service.

mod client;
mod error;
mod stat;

pub use client::{DEFAULT_REPLY_TIMEOUT, FsLogicClient};
pub use error::{FsError, Result};
pub use stat::{Stat, Ubuf, directory_mode, regular_mode};

/// Filesystem calls served by a filesystem-logic backend.
pub trait FsOperations {
    fn getattr(&self, path: &str) -> Result<Stat>;

    /// Creates `path` with permission bits `mode`. The parent must be a directory.
    fn mkdir(&self, path: &str, mode: u32) -> Result<()>;

    fn rmdir(&self, path: &str) -> Result<()>;

    fn rename(&self, from: &str, to: &str) -> Result<()>;

    fn chmod(&self, path: &str, mode: u32) -> Result<()>;

    /// Sets access and modification time to now.
    fn utime(&self, path: &str) -> Result<()>;

    fn utime_buf(&self, path: &str, buf: Ubuf) -> Result<()>;

    /// Names of the entries of directory `path`.
    fn readdir(&self, path: &str) -> Result<Vec<String>>;
}
