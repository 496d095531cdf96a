#![no_main]

use libfuzzer_sys::fuzz_target;
use vertex_consensus::{verify, ConsensusParameters, MemoryAncestors, Vertex};

// Parse, re-encode, and verify against an empty store: never panics, and
// anything that parses re-encodes to the same bytes.
fuzz_target!(|data: &[u8]| {
    let Ok(v) = Vertex::parse(data) else {
        return;
    };
    let enc = v.to_bytes().expect("parsed vertex re-encodes");
    assert_eq!(enc, data, "vertex re-encoding mismatch");

    let params = ConsensusParameters::unittests();
    let _ = verify(&v, &MemoryAncestors::new(), &params);
});
