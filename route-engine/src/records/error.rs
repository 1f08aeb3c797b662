//! Path record store error types.

/// Errors that can occur when reading or writing path records.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// Reading or writing the backing file failed
    #[error("record store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file could not be encoded or decoded
    #[error("record store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A record failed validation
    #[error("invalid record: {message}")]
    Invalid { message: String },
}
