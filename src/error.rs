//! Error types for the tee core

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the interceptor and the stdout redirect
#[derive(Debug, Error)]
pub enum TeeError {
    /// The log file could not be opened
    #[error("failed to open log file {}", path.display())]
    OpenLog {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing or flushing the original console sink failed
    #[error("failed to write to console")]
    Console(#[source] io::Error),

    /// Writing or flushing the log file failed
    #[error("failed to write to log file")]
    LogFile(#[source] io::Error),

    /// Swapping or restoring the process stdout descriptor failed
    #[error("failed to redirect stdout")]
    Redirect(#[source] io::Error),

    /// The interceptor has already been closed
    #[error("interceptor is closed")]
    Closed,

    /// A stdout redirect is already active in this process
    #[error("stdout is already redirected by another tee")]
    AlreadyInstalled,

    /// Process-wide redirection is not available on this platform
    #[error("stdout redirection is not supported on this platform")]
    Unsupported,

    /// The thread draining the stdout pipe panicked
    #[error("stdout pump thread panicked")]
    PumpPanicked,
}

impl From<TeeError> for io::Error {
    fn from(err: TeeError) -> Self {
        match err {
            TeeError::OpenLog { source, .. } => source,
            TeeError::Console(source) | TeeError::LogFile(source) | TeeError::Redirect(source) => {
                source
            }
            TeeError::Closed => io::Error::new(io::ErrorKind::BrokenPipe, err),
            TeeError::Unsupported => io::Error::new(io::ErrorKind::Unsupported, err),
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_maps_to_broken_pipe() {
        let err: io::Error = TeeError::Closed.into();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_io_variants_unwrap_source() {
        let source = io::Error::new(io::ErrorKind::PermissionDenied, "read-only");
        let err: io::Error = TeeError::LogFile(source).into();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_open_log_message_names_path() {
        let err = TeeError::OpenLog {
            path: PathBuf::from("/tmp/x.log"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "failed to open log file /tmp/x.log");
    }
}
