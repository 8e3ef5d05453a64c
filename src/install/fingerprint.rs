//! Content fingerprints for change detection.

use std::io::{self, ErrorKind};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Hex SHA-256 of a byte slice.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hex SHA-256 of a file, or `None` when it does not exist yet.
pub async fn fingerprint_file(path: &Path) -> io::Result<Option<String>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(fingerprint_bytes(&bytes))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
