//! Content-addressed cache keys (blake3).

use std::fmt;

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash `bytes`.
    #[inline]
    pub fn of(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    /// Full lowercase hex encoding.
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Display first 16 chars of hex for brevity
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// Digest of the source bytes plus the source extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    digest: ContentHash,
    /// Lowercased, without the leading dot.
    ext: String,
}

impl CacheKey {
    pub fn new(bytes: &[u8], ext: &str) -> Self {
        Self {
            digest: ContentHash::of(bytes),
            ext: ext.trim_start_matches('.').to_ascii_lowercase(),
        }
    }

    /// Entry file name: `<hexDigest>.<ext>`.
    pub fn file_name(&self) -> String {
        if self.ext.is_empty() {
            self.digest.to_hex()
        } else {
            format!("{}.{}", self.digest.to_hex(), self.ext)
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.digest, self.ext)
    }
}
