//! Content-derived document identity.
//!
//! A [`ContentIdentity`] is the lowercase hex SHA-256 of a source file's raw
//! bytes. It is the only deduplication key: filenames and paths never take
//! part in it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use tokio::io::AsyncReadExt;

const READ_BUF_BYTES: usize = 64 * 1024;
const DIGEST_HEX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentIdentity(String);

impl ContentIdentity {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut hasher = ContentHasher::default();
        hasher.update(bytes);
        hasher.finish()
    }

    /// Stream a file through SHA-256 without loading it into memory.
    pub async fn compute_file(path: &Path) -> std::io::Result<Self> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut hasher = ContentHasher::default();
        let mut buf = vec![0u8; READ_BUF_BYTES];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finish())
    }

    /// Parse a stored digest. Accepts upper or lower case hex.
    pub fn parse(s: &str) -> Result<Self, String> {
        if s.len() != DIGEST_HEX_LEN || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("invalid content identity: '{}'", s));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading hex characters, used to disambiguate archive entry names.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

/// Incremental digest for bytes that arrive in chunks.
#[derive(Default)]
pub struct ContentHasher {
    digest: Sha256,
    bytes: u64,
}

impl ContentHasher {
    pub fn update(&mut self, chunk: &[u8]) {
        self.digest.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    /// Bytes hashed so far.
    pub fn len(&self) -> u64 {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }

    pub fn finish(self) -> ContentIdentity {
        ContentIdentity(hex::encode(self.digest.finalize()))
    }
}

impl fmt::Display for ContentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentIdentity {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentIdentity> for String {
    fn from(value: ContentIdentity) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn known_digest() {
        let id = ContentIdentity::from_bytes(b"abc");
        assert_eq!(
            id.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(id.short(), "ba7816bf8f01");
    }

    #[tokio::test]
    async fn same_bytes_different_names_same_identity() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("report-2021.pdf");
        let b = tmp.path().join("copy of report.pdf");
        std::fs::write(&a, b"%PDF-1.4 identical").unwrap();
        std::fs::write(&b, b"%PDF-1.4 identical").unwrap();

        let ia = ContentIdentity::compute_file(&a).await.unwrap();
        let ib = ContentIdentity::compute_file(&b).await.unwrap();
        assert_eq!(ia, ib);
        assert_eq!(ia, ContentIdentity::from_bytes(b"%PDF-1.4 identical"));
    }

    #[tokio::test]
    async fn large_file_matches_in_memory_digest() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("big.bin");
        let bytes: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &bytes).unwrap();

        let streamed = ContentIdentity::compute_file(&path).await.unwrap();
        assert_eq!(streamed, ContentIdentity::from_bytes(&bytes));
    }

    #[test]
    fn chunked_hashing_matches_one_shot() {
        let bytes: Vec<u8> = (0..10_000u32).map(|i| (i % 97) as u8).collect();
        let mut hasher = ContentHasher::default();
        assert!(hasher.is_empty());
        for chunk in bytes.chunks(333) {
            hasher.update(chunk);
        }
        assert_eq!(hasher.len(), 10_000);
        assert_eq!(hasher.finish(), ContentIdentity::from_bytes(&bytes));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = ContentIdentity::compute_file(&tmp.path().join("nope"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn parse_validates_and_normalizes() {
        let upper = "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD";
        let id = ContentIdentity::parse(upper).unwrap();
        assert_eq!(id, ContentIdentity::from_bytes(b"abc"));
        assert!(ContentIdentity::parse("abc").is_err());
        assert!(ContentIdentity::parse(&"z".repeat(64)).is_err());
    }

    #[test]
    fn serde_rejects_malformed_digest() {
        let ok: ContentIdentity = serde_json::from_str(
            "\"ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad\"",
        )
        .unwrap();
        assert_eq!(ok.short(), "ba7816bf8f01");
        assert!(serde_json::from_str::<ContentIdentity>("\"not-a-digest\"").is_err());
    }
}
