#![no_main]

use libfuzzer_sys::fuzz_target;
use num_bigint::BigUint;
use vertex_consensus::weight::{hash_meets_weight, weight_to_target};

// 8 bytes weight (f64 BE) + 32 bytes hash.
fuzz_target!(|data: &[u8]| {
    if data.len() < 40 {
        return;
    }
    let mut w = [0u8; 8];
    w.copy_from_slice(&data[..8]);
    let weight = f64::from_be_bytes(w);
    if !weight.is_finite() || weight < 0.0 {
        return;
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&data[8..40]);

    let target = weight_to_target(weight);
    assert!(target <= BigUint::from(1u8) << 256usize);
    assert_eq!(
        hash_meets_weight(&hash, weight),
        BigUint::from_bytes_be(&hash) <= target
    );
});
