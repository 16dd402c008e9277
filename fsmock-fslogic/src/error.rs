use fsmock_proto::Code;

pub type Result<T> = std::result::Result<T, FsError>;

/// Failure of a filesystem operation. Displays as the POSIX error text where one applies.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("{}", .0.posix_message())]
    Status(Code),

    #[error("Not a directory")]
    NotADirectory,

    #[error("connection closed by the server")]
    Disconnected,

    #[error("unexpected reply: {0}")]
    Protocol(String),

    #[error(transparent)]
    Wire(#[from] fsmock_proto::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl FsError {
    pub fn code(&self) -> Option<Code> {
        match self {
            FsError::Status(code) => Some(*code),
            _ => None,
        }
    }
}
