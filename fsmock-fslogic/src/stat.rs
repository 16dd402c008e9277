use fsmock_proto::{FileAttr, FileType};

const S_IFREG: u32 = 0o100_000;
const S_IFDIR: u32 = 0o040_000;
const S_IFLNK: u32 = 0o120_000;

/// File-type bits of a regular file.
pub const fn regular_mode() -> u32 {
    S_IFREG
}

pub const fn directory_mode() -> u32 {
    S_IFDIR
}

/// Attributes as a `stat(2)` caller sees them: permission bits with the file-type bits set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stat {
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
}

impl From<&FileAttr> for Stat {
    fn from(attr: &FileAttr) -> Self {
        let type_bits = match FileType::try_from(attr.file_type) {
            Ok(FileType::Dir) => S_IFDIR,
            Ok(FileType::Lnk) => S_IFLNK,
            Ok(FileType::Reg) | Err(_) => S_IFREG,
        };
        Self {
            mode: attr.mode | type_bits,
            uid: attr.uid,
            gid: attr.gid,
            size: attr.size.unwrap_or_default(),
            atime: attr.atime,
            mtime: attr.mtime,
            ctime: attr.ctime,
        }
    }
}

impl Stat {
    pub fn is_dir(&self) -> bool {
        self.mode & 0o170_000 == S_IFDIR
    }
}

/// Explicit access and modification times, in seconds since the epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ubuf {
    pub actime: i64,
    pub modtime: i64,
}
