// Version field: high byte = vertex kind, low byte = signal bits.
pub const VERSION_KIND_SHIFT: u32 = 8;
pub const MAX_SIGNAL_BITS: u8 = 8;

pub const BLOCK_DATA_MAX_SIZE: usize = 100;
pub const MAX_NUM_INPUTS: usize = 255;
pub const MAX_NUM_OUTPUTS: usize = 255;
pub const MAX_OUTPUT_SCRIPT_SIZE: usize = 1024;

pub const WEIGHT_TOL: f64 = 1e-10;

pub const MIN_TX_WEIGHT_COEFFICIENT: f64 = 1.6;
pub const MIN_TX_WEIGHT_K: f64 = 100.0;
pub const DECIMAL_PLACES: u32 = 2;

pub const OLD_MAX_MERKLE_PATH_LENGTH: usize = 12;
pub const NEW_MAX_MERKLE_PATH_LENGTH: usize = 20;

pub const EXTERNAL_HEADER_BYTES: usize = 80;
pub const MERGED_MINING_MAGIC: [u8; 4] = *b"Hath";
pub const MAX_COINBASE_BYTES: u64 = 100_000;
// Generous parse-time cap; the consensus bound is selected per block.
pub const MAX_MERKLE_PATH_WIRE_STEPS: u64 = 256;
