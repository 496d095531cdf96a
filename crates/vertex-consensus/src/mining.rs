//! Reference CPU miner. Scans a nonce range and reports the first nonce
//! whose hash meets the vertex's declared weight. Not part of verification.

use num_bigint::BigUint;

use crate::aux_pow::{build_coinbase, merkle_root_from_path, AuxiliaryProofOfWork, ExternalHeader, MerklePathStep};
use crate::error::MalformedVertex;
use crate::hash::{reversed, sha256d, Hash, ZERO_HASH};
use crate::vertex::{Block, BlockBase, MergeMinedBlock, Transaction, VertexKind};
use crate::weight::{hash_to_int, weight_to_target};

fn scan<const N: usize>(
    mut bytes: Vec<u8>,
    target: &BigUint,
    start: u128,
    end: u128,
    put: impl Fn(u128) -> [u8; N],
) -> Option<u128> {
    let at = bytes.len() - N;
    let mut nonce = start;
    while nonce < end {
        bytes[at..].copy_from_slice(&put(nonce));
        if hash_to_int(&reversed(sha256d(&bytes))) <= *target {
            return Some(nonce);
        }
        nonce += 1;
    }
    None
}

/// First nonce in `[start, end)` meeting the block weight.
pub fn mine_block(block: &Block, start: u128, end: u128) -> Result<Option<u128>, MalformedVertex> {
    let bytes = block.to_bytes()?;
    let target = weight_to_target(block.base.weight);
    Ok(scan::<16>(bytes, &target, start, end, |n| n.to_be_bytes()))
}

pub fn mine_transaction(tx: &Transaction, start: u32, end: u32) -> Result<Option<u32>, MalformedVertex> {
    let bytes = tx.to_bytes()?;
    let target = weight_to_target(tx.weight);
    let found = scan::<4>(bytes, &target, start as u128, end as u128, |n| (n as u32).to_be_bytes());
    Ok(found.map(|n| n as u32))
}

/// Builds an auxiliary proof committing to `base` with the coinbase placed
/// at the leaf of `path`. The header nonce is left at zero.
pub fn aux_pow_template(base: &BlockBase, bits: u32, path: Vec<MerklePathStep>) -> Result<AuxiliaryProofOfWork, MalformedVertex> {
    let base_hash = base.mining_base_hash(VertexKind::MergeMinedBlock)?;
    let coinbase = build_coinbase(b"\x03\x01\x02\x03", &base_hash, b"\xff\xff\xff\xff");
    let merkle_root = merkle_root_from_path(sha256d(&coinbase), &path);
    Ok(AuxiliaryProofOfWork {
        header: ExternalHeader {
            version: 0x2000_0000,
            prev_block: ZERO_HASH,
            merkle_root,
            timestamp: base.timestamp,
            bits,
            nonce: 0,
        },
        coinbase,
        merkle_path: path,
    })
}

/// Grinds the external header nonce until its hash meets the block weight.
/// Updates the header in place.
pub fn mine_merge_mined_block(block: &mut MergeMinedBlock, start: u32, end: u32) -> Option<u32> {
    let target = weight_to_target(block.base.weight);
    let header = &mut block.aux_pow.header;
    let mut nonce = start;
    while nonce < end {
        header.nonce = nonce;
        let h: Hash = header.hash();
        if hash_to_int(&h) <= target {
            return Some(nonce);
        }
        nonce += 1;
    }
    None
}
