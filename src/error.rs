//! Error types for xz-pipe

use std::io;
use std::process::ExitStatus;

/// Result type for xz-pipe operations
pub type Result<T> = std::result::Result<T, XzPipeError>;

/// Error types that can occur while piping a stream through XZ
#[derive(Debug)]
pub enum XzPipeError {
    /// I/O error on a pipe, the wrapped stream, or at process launch
    Io(io::Error),
    /// Option value outside its valid domain, or not supported on this platform
    OptionIllegal(String),
    /// The xz subprocess terminated with a non-zero exit status
    ToolFailed(ExitStatus),
}

impl std::fmt::Display for XzPipeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            XzPipeError::Io(e) => write!(f, "I/O error: {}", e),
            XzPipeError::OptionIllegal(msg) => write!(f, "option illegal: {}", msg),
            XzPipeError::ToolFailed(status) => write!(f, "xz exited with {}", status),
        }
    }
}

impl std::error::Error for XzPipeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            XzPipeError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for XzPipeError {
    fn from(err: io::Error) -> Self {
        XzPipeError::Io(err)
    }
}

impl From<XzPipeError> for io::Error {
    fn from(err: XzPipeError) -> Self {
        match err {
            XzPipeError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}
