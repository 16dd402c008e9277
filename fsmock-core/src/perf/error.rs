pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("test body failed: {0:#}")]
    Conformance(anyhow::Error),

    #[error("not all performance configurations of `{case}` succeeded")]
    ConfigurationsFailed { case: String },

    #[error("no successful repeats to average")]
    NoSuccessfulRepeats,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize performance results: {0}")]
    Json(#[from] serde_json::Error),
}
