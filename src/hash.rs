//! Content hashes.

use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Hex SHA-256 of the content bytes. Used for local/remote equality.
pub fn sha256_hex(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Git blob SHA (`sha1("blob <len>\0" + content)`), as reported in remote
/// directory listings. Lets a local file be compared with a listing entry
/// without downloading it.
pub fn git_blob_sha(content: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("blob {}\0", content.len()).as_bytes());
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
