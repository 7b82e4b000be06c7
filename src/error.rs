// Error types for the decode session
use thiserror::Error;

/// Errors surfaced by a decode session.
///
/// Corrupt or non-audio input is never an error: the session skips it.
#[derive(Error, Debug)]
pub enum Error {
    /// Stream read or seek failed
    #[error("Stream I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Caller-provided PCM buffer cannot hold a worst-case frame
    #[error("Output buffer too small: need {required} samples, got {actual}")]
    OutputTooSmall { required: usize, actual: usize },

    /// Frame codec could not be constructed
    #[error("Codec error: {0}")]
    Codec(String),

    /// Settings file could not be read, parsed or written
    #[error("Settings error: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, Error>;
