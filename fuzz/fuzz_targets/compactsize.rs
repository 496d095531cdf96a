#![no_main]

use libfuzzer_sys::fuzz_target;
use vertex_consensus::{encode_compact_size, read_compact_size, Reader};

fuzz_target!(|data: &[u8]| {
    let mut r = Reader::new(data);
    let Ok(n) = read_compact_size(&mut r) else {
        return;
    };
    let prefix = &data[..r.offset()];
    let mut enc = Vec::new();
    encode_compact_size(n, &mut enc);
    if enc != prefix {
        panic!("non-minimal or mismatch: got={enc:02x?} want_prefix={prefix:02x?}");
    }
});
