use thiserror::Error;

/// Errors surfaced by the audio session subsystem.
///
/// This is the complete set callers can observe. Platform backends map
/// native failures into these variants at the trait boundary; raw OS
/// error codes never cross into core results.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AudioError {
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("a session is already active")]
    SessionAlreadyActive,

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("corrupt container: {0}")]
    CorruptContainer(String),

    #[error("operation timed out")]
    Timeout,

    #[error("i/o error: {0}")]
    Io(String),
}

impl AudioError {
    /// Wrap a filesystem error, keeping only its message.
    pub fn io(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
