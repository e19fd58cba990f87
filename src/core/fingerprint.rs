//! core::fingerprint
//!
//! SHA-1 content hashing. Pure functions with no repository dependencies.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha1::{Digest, Sha1};

use super::types::Fingerprint;

/// Hash raw bytes.
///
/// ```
/// use strata::core::fingerprint::hash_bytes;
///
/// assert_eq!(
///     hash_bytes(b"").as_str(),
///     "da39a3ee5e6b4b0d3255bfef95601890afd80709"
/// );
/// ```
pub fn hash_bytes(data: &[u8]) -> Fingerprint {
    let mut hasher = Sha1::new();
    hasher.update(data);
    Fingerprint::from_digest(hex::encode(hasher.finalize()))
}

/// Hash a descriptor string.
pub fn hash_str(text: &str) -> Fingerprint {
    hash_bytes(text.as_bytes())
}

/// Hash a file's bytes, streaming.
pub fn hash_file(path: &Path) -> std::io::Result<Fingerprint> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha1::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Fingerprint::from_digest(hex::encode(hasher.finalize())))
}

impl Fingerprint {
    /// Recompute the hash of `content` and compare.
    ///
    /// ```
    /// use strata::core::fingerprint::hash_bytes;
    ///
    /// let fp = hash_bytes(b"hello");
    /// assert!(fp.check(b"hello"));
    /// assert!(!fp.check(b"hello!"));
    /// ```
    pub fn check(&self, content: &[u8]) -> bool {
        hash_bytes(content) == *self
    }
}
