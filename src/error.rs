//! Stable error codes for the filesystem API.
//!
//! The reference implementation hands callers a signed integer, not a
//! string; hosts linking against this crate from C or from a wire
//! protocol depend on those exact values. [`FsError::code`] and
//! [`FsError::from_code`] are the conversion boundary between this
//! enum and that contract.

use thiserror::Error;

/// Errors returned by [`crate::fs::Filesystem`] operations.
///
/// Each variant corresponds to one of the five stable negative codes
/// the reference implementation defines. Use [`FsError::code`] when an
/// integration needs the bare integer rather than a typed error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FsError {
    /// `open_*`/`delete` called on a file whose handle is not `Closed`.
    #[error("file already open")]
    FileAlreadyOpen,
    /// Operation on a file whose pointer-table entry is the sentinel.
    #[error("file does not exist")]
    FileDoesNotExist,
    /// Read on a write handle, or write on a read handle.
    #[error("wrong file I/O type")]
    WrongFileIoType,
    /// Handle out of the `[0, MAX_FILES)` range.
    #[error("invalid access handle")]
    InvalidAccessHandle,
    /// No free block available when one was needed.
    #[error("device out of space")]
    OutOfSpace,
}

impl FsError {
    /// The stable wire-compatible code for this error.
    pub const fn code(self) -> i16 {
        match self {
            FsError::FileAlreadyOpen => -1,
            FsError::FileDoesNotExist => -2,
            FsError::WrongFileIoType => -3,
            FsError::InvalidAccessHandle => -4,
            FsError::OutOfSpace => -5,
        }
    }

    /// Recover the typed error from a stable code, if it is one of the
    /// five known values.
    pub const fn from_code(code: i16) -> Option<Self> {
        match code {
            -1 => Some(FsError::FileAlreadyOpen),
            -2 => Some(FsError::FileDoesNotExist),
            -3 => Some(FsError::WrongFileIoType),
            -4 => Some(FsError::InvalidAccessHandle),
            -5 => Some(FsError::OutOfSpace),
            _ => None,
        }
    }
}

/// Convenience alias for results returned by the filesystem API.
pub type FsResult<T> = Result<T, FsError>;
