//! Content fingerprints for analyzed files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identity of a file's content at the time it was read.
///
/// Two fingerprints are equal when their content hash and size match; the
/// path and modification time are informational only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fingerprint {
    pub path: PathBuf,
    /// SHA-256 of the file bytes, lowercase hex.
    pub hash: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Cache identity: the content plus the language it is analyzed as.
///
/// The same bytes under `.py` and `.rs` analyze differently, so the
/// language tag is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FingerprintKey {
    pub hash: String,
    pub size: u64,
    pub language: String,
}

impl Fingerprint {
    /// Fingerprint bytes that were read from `path`.
    pub fn of_bytes(path: impl Into<PathBuf>, bytes: &[u8], modified: Option<SystemTime>) -> Self {
        Self {
            path: path.into(),
            hash: content_hash(bytes),
            size: bytes.len() as u64,
            modified: modified.map(DateTime::<Utc>::from),
        }
    }

    /// Read a file and fingerprint it. Returns the bytes alongside so the
    /// caller does not read the file twice.
    pub fn read(path: &Path) -> io::Result<(Self, Vec<u8>)> {
        let bytes = fs::read(path)?;
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok();
        Ok((Self::of_bytes(path, &bytes, modified), bytes))
    }

    pub fn key(&self, language: &str) -> FingerprintKey {
        FingerprintKey {
            hash: self.hash.clone(),
            size: self.size,
            language: language.to_string(),
        }
    }

    /// Whether this fingerprint describes the given stored hash and size.
    pub fn matches(&self, hash: &str, size: u64) -> bool {
        self.hash == hash && self.size == size
    }
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.size == other.size
    }
}

impl Eq for Fingerprint {}

/// SHA-256 of `bytes` as lowercase hex.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_content_hash_known_value() {
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_equality_ignores_path_and_mtime() {
        let a = Fingerprint::of_bytes("a.py", b"x = 1\n", None);
        let b = Fingerprint::of_bytes("b.py", b"x = 1\n", Some(SystemTime::now()));
        let c = Fingerprint::of_bytes("a.py", b"x = 2\n", None);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.key("python"), b.key("python"));
        assert_ne!(a.key("python"), a.key("rust"));
    }

    #[test]
    fn test_read_reports_size_and_mtime() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("main.rs");
        std::fs::write(&path, "fn main() {}\n").unwrap();

        let (fp, bytes) = Fingerprint::read(&path).unwrap();
        assert_eq!(fp.size, 13);
        assert_eq!(bytes.len(), 13);
        assert!(fp.modified.is_some());
        assert!(fp.matches(&content_hash(b"fn main() {}\n"), 13));
    }
}
