//! Cryptographic digests over image ranges.
//!
//! Used for content identifiers of snapshots, where a collision-resistant fingerprint of the
//! program matters more than detecting transmission errors.

use md5::Md5;
use sha1::{Digest, Sha1};

/// SHA-1 digest of the range.
#[must_use]
pub fn sha1(bytes: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(bytes);

    let mut digest = [0u8; 20];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// MD5 digest of the range.
#[must_use]
pub fn md5(bytes: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(bytes);

    let mut digest = [0u8; 16];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// The first eight bytes of the SHA-1 digest, read as a little-endian `u64`.
///
/// Short enough to be stored in a header field as a content identifier.
#[must_use]
pub fn sha1_id(bytes: &[u8]) -> u64 {
    let digest = sha1(bytes);
    let mut id = [0u8; 8];
    id.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(id)
}
