use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("filesystem error: {0}")]
    Fs(#[from] std::io::Error),

    #[error("malformed record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid track id '{0}'")]
    InvalidTrackId(String),

    #[error("directory scan failed: {0}")]
    Scan(#[from] walkdir::Error),
}
