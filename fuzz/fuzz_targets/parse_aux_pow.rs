#![no_main]

use libfuzzer_sys::fuzz_target;
use vertex_consensus::AuxiliaryProofOfWork;

fuzz_target!(|data: &[u8]| {
    let Ok(aux) = AuxiliaryProofOfWork::parse_bytes(data) else {
        return;
    };
    assert_eq!(aux.to_bytes(), data, "aux pow re-encoding mismatch");

    // Verdict must not depend on anything but the proof, weight and bound.
    let base = aux.committed_base_hash().unwrap_or([0u8; 32]);
    let a = aux.verify(&base, 1.0, 12);
    let b = AuxiliaryProofOfWork::parse_bytes(data)
        .expect("reparse")
        .verify(&base, 1.0, 12);
    assert_eq!(a, b);
});
