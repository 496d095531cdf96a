use crate::compactsize::{encode_compact_size, read_compact_len};
use crate::constants::{
    EXTERNAL_HEADER_BYTES, MAX_COINBASE_BYTES, MAX_MERKLE_PATH_WIRE_STEPS, MERGED_MINING_MAGIC,
};
use crate::error::{AuxPowError, MalformedVertex};
use crate::hash::{reversed, sha256d, Hash};
use crate::weight::hash_meets_weight;
use crate::wire_read::Reader;

/// Header of the external chain's block. Little-endian fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalHeader {
    pub version: u32,
    pub prev_block: Hash,
    pub merkle_root: Hash,
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl ExternalHeader {
    pub fn to_bytes(&self) -> [u8; EXTERNAL_HEADER_BYTES] {
        let mut out = [0u8; EXTERNAL_HEADER_BYTES];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..36].copy_from_slice(&self.prev_block);
        out[36..68].copy_from_slice(&self.merkle_root);
        out[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        out[72..76].copy_from_slice(&self.bits.to_le_bytes());
        out[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    pub fn parse(r: &mut Reader<'_>) -> Result<Self, MalformedVertex> {
        let version = r.read_u32_le()?;
        let prev_block = r.read_hash()?;
        let merkle_root = r.read_hash()?;
        let timestamp = r.read_u32_le()?;
        let bits = r.read_u32_le()?;
        let nonce = r.read_u32_le()?;
        Ok(Self {
            version,
            prev_block,
            merkle_root,
            timestamp,
            bits,
            nonce,
        })
    }

    /// Display-order hash; compared as a big-endian integer.
    pub fn hash(&self) -> Hash {
        reversed(sha256d(&self.to_bytes()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MerkleDirection {
    /// Running hash is the left operand.
    SiblingOnRight = 0,
    /// Running hash is the right operand.
    SiblingOnLeft = 1,
}

impl MerkleDirection {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(MerkleDirection::SiblingOnRight),
            1 => Some(MerkleDirection::SiblingOnLeft),
            _ => None,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            MerkleDirection::SiblingOnRight => MerkleDirection::SiblingOnLeft,
            MerkleDirection::SiblingOnLeft => MerkleDirection::SiblingOnRight,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MerklePathStep {
    pub direction: MerkleDirection,
    pub sibling: Hash,
}

/// Replays `path` from `leaf`. Each step double-hashes the concatenation.
pub fn merkle_root_from_path(leaf: Hash, path: &[MerklePathStep]) -> Hash {
    let mut cur = leaf;
    let mut buf = [0u8; 64];
    for step in path {
        match step.direction {
            MerkleDirection::SiblingOnRight => {
                buf[..32].copy_from_slice(&cur);
                buf[32..].copy_from_slice(&step.sibling);
            }
            MerkleDirection::SiblingOnLeft => {
                buf[..32].copy_from_slice(&step.sibling);
                buf[32..].copy_from_slice(&cur);
            }
        }
        cur = sha256d(&buf);
    }
    cur
}

/// Coinbase bytes carrying the merge-mining commitment between `prefix`
/// and `suffix`.
pub fn build_coinbase(prefix: &[u8], mining_base_hash: &Hash, suffix: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(prefix.len() + MERGED_MINING_MAGIC.len() + 32 + suffix.len());
    out.extend_from_slice(prefix);
    out.extend_from_slice(&MERGED_MINING_MAGIC);
    out.extend_from_slice(mining_base_hash);
    out.extend_from_slice(suffix);
    out
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuxiliaryProofOfWork {
    pub header: ExternalHeader,
    pub coinbase: Vec<u8>,
    pub merkle_path: Vec<MerklePathStep>,
}

impl AuxiliaryProofOfWork {
    pub fn parse(r: &mut Reader<'_>) -> Result<Self, MalformedVertex> {
        let header = ExternalHeader::parse(r)?;

        let coinbase_len = read_compact_len(r, MAX_COINBASE_BYTES, "aux pow coinbase too long")?;
        let coinbase = r.read_bytes(coinbase_len)?.to_vec();

        let path_len = read_compact_len(r, MAX_MERKLE_PATH_WIRE_STEPS, "aux pow merkle path too long")?;
        let mut merkle_path = Vec::with_capacity(path_len);
        for _ in 0..path_len {
            let direction = MerkleDirection::from_byte(r.read_u8()?)
                .ok_or(MalformedVertex::FieldRange("invalid merkle direction flag"))?;
            let sibling = r.read_hash()?;
            merkle_path.push(MerklePathStep { direction, sibling });
        }

        Ok(Self {
            header,
            coinbase,
            merkle_path,
        })
    }

    pub fn parse_bytes(b: &[u8]) -> Result<Self, MalformedVertex> {
        let mut r = Reader::new(b);
        let a = Self::parse(&mut r)?;
        r.finish("aux pow")?;
        Ok(a)
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.header.to_bytes());
        encode_compact_size(self.coinbase.len() as u64, out);
        out.extend_from_slice(&self.coinbase);
        encode_compact_size(self.merkle_path.len() as u64, out);
        for step in &self.merkle_path {
            out.push(step.direction as u8);
            out.extend_from_slice(&step.sibling);
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }

    pub fn coinbase_txid(&self) -> Hash {
        sha256d(&self.coinbase)
    }

    pub fn merkle_root(&self) -> Hash {
        merkle_root_from_path(self.coinbase_txid(), &self.merkle_path)
    }

    /// Hash following the single merge-mining tag in the coinbase. `None`
    /// when the tag is absent, repeated, or truncated.
    pub fn committed_base_hash(&self) -> Option<Hash> {
        let magic = &MERGED_MINING_MAGIC;
        let mut positions = self
            .coinbase
            .windows(magic.len())
            .enumerate()
            .filter(|(_, w)| *w == magic)
            .map(|(i, _)| i);
        let pos = positions.next()?;
        if positions.next().is_some() {
            return None;
        }
        let start = pos + magic.len();
        self.coinbase.get(start..start + 32)?.try_into().ok()
    }

    /// Runs the four checks in order. The path bound is checked first so an
    /// oversize proof is rejected before any hashing. The header hash must
    /// meet this chain's `weight`; the header's own `bits` are not consulted.
    pub fn verify(&self, mining_base_hash: &Hash, weight: f64, max_merkle_path_length: usize) -> Result<(), AuxPowError> {
        if self.merkle_path.len() > max_merkle_path_length {
            return Err(AuxPowError::PathTooLong {
                length: self.merkle_path.len(),
                max: max_merkle_path_length,
            });
        }
        if !hash_meets_weight(&self.header.hash(), weight) {
            return Err(AuxPowError::BadExternalPoW);
        }
        if self.merkle_root() != self.header.merkle_root {
            return Err(AuxPowError::BadMerkleProof);
        }
        match self.committed_base_hash() {
            Some(h) if h == *mining_base_hash => Ok(()),
            _ => Err(AuxPowError::CommitmentMismatch),
        }
    }
}
