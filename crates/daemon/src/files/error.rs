//! Error taxonomy shared by every file operation.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while resolving, listing, archiving or writing
/// paths inside the share root.
#[derive(Debug, Error)]
pub enum FileError {
    /// The requested path resolves outside the share root.
    #[error("path escapes the share root: {0}")]
    PathEscape(String),

    /// The requested path does not exist.
    #[error("path does not exist: {0}")]
    NotFound(String),

    /// The requested path is not a directory.
    #[error("path is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The requested path is not a regular file.
    #[error("path is not a file: {0}")]
    NotAFile(PathBuf),

    /// The operation was abandoned because its consumer went away.
    #[error("operation cancelled")]
    Cancelled,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl FileError {
    /// Whether this error should be reported to clients as "not found".
    ///
    /// Path escapes are folded into absence so responses never confirm
    /// structure outside the root.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PathEscape(_) | Self::NotFound(_))
    }
}

impl From<walkdir::Error> for FileError {
    fn from(err: walkdir::Error) -> Self {
        let message = err.to_string();
        match err.into_io_error() {
            Some(io_err) => FileError::Io(io_err),
            None => FileError::Io(io::Error::other(message)),
        }
    }
}

impl From<zip::result::ZipError> for FileError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io_err) => FileError::Io(io_err),
            other => FileError::Io(io::Error::other(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_and_absence_are_not_found() {
        assert!(FileError::PathEscape("../etc".to_string()).is_not_found());
        assert!(FileError::NotFound("missing".to_string()).is_not_found());
        assert!(!FileError::NotADirectory(PathBuf::from("/x")).is_not_found());
        assert!(!FileError::Io(io::Error::other("boom")).is_not_found());
    }

    #[test]
    fn test_zip_io_error_unwraps() {
        let err = zip::result::ZipError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        match FileError::from(err) {
            FileError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
