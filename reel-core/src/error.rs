//! Error taxonomy shared by every pipeline component.
//!
//! Internal APIs return [`Result`] and propagate with `?`. Components that sit
//! behind a boolean host call additionally record the failure in an
//! [`ErrorSlot`] so the caller can poll the last error and message afterwards.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),
    #[error("Decoder initialization failed: {0}")]
    DecoderInitFailed(String),
    #[error("Decode failed: {0}")]
    DecodeFailed(String),
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("Failed to open file: {0}")]
    FileOpenFailed(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Out of memory: {0}")]
    OutOfMemory(String),
    #[error("Thread error: {0}")]
    ThreadError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a decoding engine behind the adapter traits.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("Engine creation failed: {0}")]
    Create(String),
    #[error("Configuration rejected: {0}")]
    Config(String),
    #[error("Unsupported parameter: {0}")]
    Unsupported(String),
    /// Unit arrived before any parameter sets. No output, nothing to recover.
    #[error("No parameter sets received yet")]
    NoParameterSets,
    /// The engine concealed damage in the picture and withheld it.
    #[error("Picture concealed")]
    Concealed,
    /// Engine state is damaged and must be flushed.
    #[error("Corrupt unit: {0}")]
    Corrupt(String),
}

/// Discriminant of [`Error`] without the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidParam,
    DecoderInitFailed,
    DecodeFailed,
    FileNotFound,
    FileOpenFailed,
    UnsupportedFormat,
    OutOfMemory,
    ThreadError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidParam => "invalid parameter",
            Self::DecoderInitFailed => "decoder initialization failed",
            Self::DecodeFailed => "decode failed",
            Self::FileNotFound => "file not found",
            Self::FileOpenFailed => "file open failed",
            Self::UnsupportedFormat => "unsupported format",
            Self::OutOfMemory => "out of memory",
            Self::ThreadError => "thread error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParam(_) => ErrorKind::InvalidParam,
            Self::DecoderInitFailed(_) => ErrorKind::DecoderInitFailed,
            Self::DecodeFailed(_) => ErrorKind::DecodeFailed,
            Self::FileNotFound(_) => ErrorKind::FileNotFound,
            Self::FileOpenFailed(_) => ErrorKind::FileOpenFailed,
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::OutOfMemory(_) => ErrorKind::OutOfMemory,
            Self::ThreadError(_) => ErrorKind::ThreadError,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::InvalidParam(m)
            | Self::DecoderInitFailed(m)
            | Self::DecodeFailed(m)
            | Self::FileNotFound(m)
            | Self::FileOpenFailed(m)
            | Self::UnsupportedFormat(m)
            | Self::OutOfMemory(m)
            | Self::ThreadError(m) => m,
        }
    }

    /// Classify an I/O failure raised while opening a container.
    pub fn from_open(path: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileNotFound(path.to_string()),
            _ => Self::FileOpenFailed(format!("{}: {}", path, err)),
        }
    }
}

/// Last-error/last-message pair held by each component.
#[derive(Debug, Default, Clone)]
pub struct ErrorSlot {
    last: Option<Error>,
}

impl ErrorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, err: Error) {
        tracing::debug!("recording error: {}", err);
        self.last = Some(err);
    }

    pub fn clear(&mut self) {
        self.last = None;
    }

    pub fn has_error(&self) -> bool {
        self.last.is_some()
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        self.last.as_ref().map(Error::kind)
    }

    pub fn last_message(&self) -> &str {
        self.last.as_ref().map(Error::message).unwrap_or("")
    }

    pub fn get(&self) -> Option<&Error> {
        self.last.as_ref()
    }

    /// Record the error carried by `result`, if any, and pass it through.
    pub fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.set(e.clone());
        }
        result
    }
}
