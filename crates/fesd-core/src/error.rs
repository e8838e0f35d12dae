//! Error types for fesd.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport-layer, protocol-layer, and
//! instrument-level errors are all captured here, and every variant maps
//! onto exactly one of the three [`ErrorKind`]s that callers at an outer
//! boundary (CLI, foreign bindings) must preserve.

/// The error type for all fesd operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (port cannot be opened, write failed).
    #[error("transport error: {0}")]
    Transport(String),

    /// The instrument returned something the driver cannot interpret.
    #[error("invalid response from device: {0}")]
    Protocol(String),

    /// Timed out waiting for the command prompt.
    ///
    /// This typically indicates the instrument is powered off, the wrong
    /// port was given, or a reset is still in progress.
    #[error("timeout waiting for response")]
    Timeout,

    /// The instrument answered with `ERR` before the prompt.
    #[error("command rejected by device: {0}")]
    Rejected(String),

    /// A caller-supplied value or reference cannot be resolved.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A read succeeded but the calibration data it carries is unusable.
    #[error("calibration error: {0}")]
    Calibration(String),

    /// No connection to the instrument has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the instrument was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The three failure kinds visible at the library boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transport failure: open, write, read timeout, unreadable reply.
    Communication,
    /// The instrument rejected a command or a reference could not be resolved.
    InvalidArguments,
    /// Calibration data read from the instrument is structurally invalid.
    Calibration,
}

impl ErrorKind {
    /// Status code used by status-code based boundaries (C-style APIs).
    ///
    /// Success is `0`; the error kinds are negative.
    pub fn status_code(self) -> i16 {
        match self {
            ErrorKind::InvalidArguments => -1,
            ErrorKind::Communication => -2,
            ErrorKind::Calibration => -3,
        }
    }
}

impl Error {
    /// Classify this error into one of the boundary [`ErrorKind`]s.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Rejected(_) | Error::InvalidParameter(_) => ErrorKind::InvalidArguments,
            Error::Calibration(_) => ErrorKind::Calibration,
            Error::Transport(_)
            | Error::Protocol(_)
            | Error::Timeout
            | Error::NotConnected
            | Error::ConnectionLost
            | Error::Io(_) => ErrorKind::Communication,
        }
    }

    /// Shorthand for the generic "reply could not be parsed" error.
    pub fn invalid_response(detail: impl Into<String>) -> Self {
        Error::Protocol(detail.into())
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
