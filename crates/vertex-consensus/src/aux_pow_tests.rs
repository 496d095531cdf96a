use crate::aux_pow::{build_coinbase, AuxiliaryProofOfWork, MerkleDirection, MerklePathStep};
use crate::error::{AuxPowError, MalformedVertex};
use crate::hash::{sha256, Hash, ZERO_HASH};
use crate::mining::aux_pow_template;
use crate::vertex::{BlockBase, TxOutput, VertexKind};
use crate::weight::hash_meets_weight;

// External chain's own difficulty; far above anything ground in tests.
const EXTERNAL_BITS: u32 = 0x1d00_ffff;
const WEIGHT: f64 = 2.0;

fn base() -> BlockBase {
    BlockBase {
        signal_bits: 0,
        weight: WEIGHT,
        timestamp: 1_700_000_000,
        height: 1,
        parent: [0x11; 32],
        outputs: vec![TxOutput {
            value: 6400,
            script: vec![0x76, 0xa9],
        }],
        data: b"merge".to_vec(),
    }
}

fn path(len: usize) -> Vec<MerklePathStep> {
    (0..len)
        .map(|i| MerklePathStep {
            direction: if i % 3 == 0 {
                MerkleDirection::SiblingOnLeft
            } else {
                MerkleDirection::SiblingOnRight
            },
            sibling: sha256(&(i as u64).to_le_bytes()),
        })
        .collect()
}

fn grind(aux: &mut AuxiliaryProofOfWork) {
    while !hash_meets_weight(&aux.header.hash(), WEIGHT) {
        aux.header.nonce += 1;
    }
}

fn valid_aux(len: usize) -> (AuxiliaryProofOfWork, Hash) {
    let b = base();
    let mut aux = aux_pow_template(&b, EXTERNAL_BITS, path(len)).expect("template");
    grind(&mut aux);
    let base_hash = b.mining_base_hash(VertexKind::MergeMinedBlock).expect("base hash");
    (aux, base_hash)
}

#[test]
fn valid_proof_at_bound_is_accepted() {
    let (aux, base_hash) = valid_aux(12);
    assert_eq!(aux.verify(&base_hash, WEIGHT, 12), Ok(()));
}

#[test]
fn path_one_over_bound_is_rejected_regardless_of_validity() {
    let (aux, base_hash) = valid_aux(13);
    assert_eq!(
        aux.verify(&base_hash, WEIGHT, 12),
        Err(AuxPowError::PathTooLong { length: 13, max: 12 })
    );
    assert_eq!(aux.verify(&base_hash, WEIGHT, 13), Ok(()));

    let mut broken = aux.clone();
    broken.header.bits = 0;
    broken.coinbase.clear();
    assert_eq!(
        broken.verify(&ZERO_HASH, WEIGHT, 12),
        Err(AuxPowError::PathTooLong { length: 13, max: 12 })
    );
}

#[test]
fn flipping_any_sibling_breaks_the_proof() {
    let (aux, base_hash) = valid_aux(6);
    for i in 0..aux.merkle_path.len() {
        let mut bad = aux.clone();
        bad.merkle_path[i].sibling[31] ^= 0x01;
        assert_eq!(bad.verify(&base_hash, WEIGHT, 12), Err(AuxPowError::BadMerkleProof), "step {i}");
    }
}

#[test]
fn flipping_any_direction_breaks_the_proof() {
    let (aux, base_hash) = valid_aux(6);
    for i in 0..aux.merkle_path.len() {
        let mut bad = aux.clone();
        bad.merkle_path[i].direction = bad.merkle_path[i].direction.flipped();
        assert_eq!(bad.verify(&base_hash, WEIGHT, 12), Err(AuxPowError::BadMerkleProof), "step {i}");
    }
}

#[test]
fn tampered_coinbase_breaks_the_proof() {
    let (mut aux, base_hash) = valid_aux(3);
    aux.coinbase.push(0x00);
    assert_eq!(aux.verify(&base_hash, WEIGHT, 12), Err(AuxPowError::BadMerkleProof));
}

#[test]
fn header_below_block_weight_is_bad_external_pow() {
    let (aux, base_hash) = valid_aux(2);
    assert_eq!(aux.verify(&base_hash, 256.0, 12), Err(AuxPowError::BadExternalPoW));

    let mut weak = aux.clone();
    while hash_meets_weight(&weak.header.hash(), WEIGHT) {
        weak.header.nonce += 1;
    }
    assert_eq!(weak.verify(&base_hash, WEIGHT, 12), Err(AuxPowError::BadExternalPoW));
}

#[test]
fn share_meeting_block_weight_passes_whatever_its_bits() {
    let (aux, base_hash) = valid_aux(3);
    assert_eq!(aux.header.bits, EXTERNAL_BITS);
    assert_eq!(aux.verify(&base_hash, WEIGHT, 12), Ok(()));

    for bits in [0u32, 0x0300_0001, 0xff12_3456] {
        let mut other = aux.clone();
        other.header.bits = bits;
        while !hash_meets_weight(&other.header.hash(), WEIGHT) {
            other.header.nonce += 1;
        }
        assert_eq!(other.verify(&base_hash, WEIGHT, 12), Ok(()), "bits {bits:#010x}");
    }
}

#[test]
fn commitment_must_match_the_block() {
    let (aux, _) = valid_aux(4);
    assert_eq!(aux.verify(&[0x42; 32], WEIGHT, 12), Err(AuxPowError::CommitmentMismatch));
}

#[test]
fn repeated_commitment_tag_is_rejected() {
    let b = base();
    let base_hash = b.mining_base_hash(VertexKind::MergeMinedBlock).expect("base hash");
    let mut aux = aux_pow_template(&b, EXTERNAL_BITS, vec![]).expect("template");
    aux.coinbase = build_coinbase(b"", &base_hash, &build_coinbase(b"", &base_hash, b""));
    aux.header.merkle_root = aux.coinbase_txid();
    grind(&mut aux);
    assert_eq!(aux.committed_base_hash(), None);
    assert_eq!(aux.verify(&base_hash, WEIGHT, 12), Err(AuxPowError::CommitmentMismatch));
}

#[test]
fn truncated_commitment_is_rejected() {
    let b = base();
    let mut aux = aux_pow_template(&b, EXTERNAL_BITS, vec![]).expect("template");
    aux.coinbase = b"prefixHath\x01\x02".to_vec();
    assert_eq!(aux.committed_base_hash(), None);
}

#[test]
fn wire_round_trip_reproduces_verdict() {
    for len in [0usize, 1, 12, 13] {
        let (aux, base_hash) = valid_aux(len);
        let bytes = aux.to_bytes();
        let back = AuxiliaryProofOfWork::parse_bytes(&bytes).expect("parse");
        assert_eq!(back, aux);
        assert_eq!(back.verify(&base_hash, WEIGHT, 12), aux.verify(&base_hash, WEIGHT, 12));
    }
}

#[test]
fn wire_rejects_bad_direction_and_trailing_bytes() {
    let (aux, _) = valid_aux(1);
    let mut bytes = aux.to_bytes();

    let mut trailing = bytes.clone();
    trailing.push(0x00);
    assert_eq!(
        AuxiliaryProofOfWork::parse_bytes(&trailing),
        Err(MalformedVertex::TrailingBytes("aux pow"))
    );

    // direction flag sits right before the last sibling
    let dir_at = bytes.len() - 33;
    bytes[dir_at] = 0x02;
    assert_eq!(
        AuxiliaryProofOfWork::parse_bytes(&bytes),
        Err(MalformedVertex::FieldRange("invalid merkle direction flag"))
    );
}

#[test]
fn wire_rejects_non_minimal_coinbase_length() {
    let (aux, _) = valid_aux(0);
    let bytes = aux.to_bytes();
    let mut b = bytes[..80].to_vec();
    b.extend_from_slice(&[0xfd, aux.coinbase.len() as u8, 0x00]);
    b.extend_from_slice(&bytes[81..]);
    assert_eq!(
        AuxiliaryProofOfWork::parse_bytes(&b),
        Err(MalformedVertex::NonMinimalCompactSize)
    );
}
