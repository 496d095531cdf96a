use sha2::{Digest, Sha256};

pub type Hash = [u8; 32];

pub const ZERO_HASH: Hash = [0u8; 32];

pub fn sha256(b: &[u8]) -> Hash {
    let mut h = Sha256::new();
    h.update(b);
    let out = h.finalize();
    let mut r = [0u8; 32];
    r.copy_from_slice(&out);
    r
}

pub fn sha256d(b: &[u8]) -> Hash {
    sha256(&sha256(b))
}

/// Byte-reversed copy. Vertex and external-header hashes are compared as
/// big-endian integers in display order, which is the reverse of digest order.
pub fn reversed(h: Hash) -> Hash {
    let mut out = h;
    out.reverse();
    out
}
