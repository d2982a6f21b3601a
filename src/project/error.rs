//! Per-file failures recorded during a tree walk.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Why a file could not be analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileErrorKind {
    NotFound,
    PermissionDenied,
    /// Content is not valid UTF-8.
    Encoding,
    /// A directory entry could not be read during the walk.
    Walk,
    Io,
}

impl FileErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileErrorKind::NotFound => "not found",
            FileErrorKind::PermissionDenied => "permission denied",
            FileErrorKind::Encoding => "encoding",
            FileErrorKind::Walk => "walk",
            FileErrorKind::Io => "io",
        }
    }
}

/// A file that was skipped, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{}: {} ({})", .path.display(), .message, .kind.as_str())]
pub struct FileError {
    pub path: PathBuf,
    pub kind: FileErrorKind,
    pub message: String,
}

impl FileError {
    pub fn new(path: impl Into<PathBuf>, kind: FileErrorKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn from_io(path: &Path, err: &io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::NotFound => FileErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => FileErrorKind::PermissionDenied,
            io::ErrorKind::InvalidData => FileErrorKind::Encoding,
            _ => FileErrorKind::Io,
        };
        Self::new(path, kind, err.to_string())
    }

    pub fn encoding(path: &Path, err: &std::string::FromUtf8Error) -> Self {
        Self::new(
            path,
            FileErrorKind::Encoding,
            format!("invalid UTF-8 at byte {}", err.utf8_error().valid_up_to()),
        )
    }

    pub fn from_walk(err: &walkdir::Error) -> Self {
        let path = err.path().map(Path::to_path_buf).unwrap_or_default();
        let kind = match err.io_error().map(io::Error::kind) {
            Some(io::ErrorKind::PermissionDenied) => FileErrorKind::PermissionDenied,
            Some(io::ErrorKind::NotFound) => FileErrorKind::NotFound,
            _ => FileErrorKind::Walk,
        };
        Self::new(path, kind, err.to_string())
    }
}
