use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};

use crate::error::InsufficientWork;
use crate::hash::Hash;
use crate::params::ConsensusParameters;
use crate::vertex::{Transaction, Vertex};

/// Exact integer value of a finite, non-negative double (truncated).
fn f64_to_biguint(d: f64) -> BigUint {
    if !d.is_finite() || d < 1.0 {
        return BigUint::zero();
    }
    let bits = d.to_bits();
    let exp = ((bits >> 52) & 0x7ff) as i64 - 1075;
    let mantissa = (bits & ((1u64 << 52) - 1)) | (1u64 << 52);
    let m = BigUint::from(mantissa);
    if exp >= 0 {
        m << exp as usize
    } else {
        m >> (-exp) as usize
    }
}

/// `floor(2^(256 - weight))`, evaluated in double precision and then
/// converted exactly, so every node derives the same integer target.
pub fn weight_to_target(weight: f64) -> BigUint {
    if weight <= 0.0 {
        return BigUint::one() << 256usize;
    }
    f64_to_biguint(2f64.powf(256.0 - weight))
}

pub fn hash_to_int(hash: &Hash) -> BigUint {
    BigUint::from_bytes_be(hash)
}

/// Accepts iff the hash, read as a big-endian integer, is at most the target.
pub fn hash_meets_weight(hash: &Hash, weight: f64) -> bool {
    hash_to_int(hash) <= weight_to_target(weight)
}

pub fn verify_pow(hash: &Hash, weight: f64) -> Result<(), InsufficientWork> {
    if !hash_meets_weight(hash, weight) {
        return Err(InsufficientWork::HashAboveTarget { weight });
    }
    Ok(())
}

/// Expected hashes for `weight`, rounded to nearest.
pub fn weight_to_work(weight: f64) -> BigUint {
    f64_to_biguint(0.5 + 2f64.powf(weight))
}

pub fn work_to_weight(work: &BigUint) -> f64 {
    if work.is_zero() {
        return 0.0;
    }
    let bits = work.bits();
    if bits <= 64 {
        return work.to_f64().map(f64::log2).unwrap_or(0.0);
    }
    // Keep the top 64 bits; the rest only perturbs digits beyond f64 precision.
    let shift = bits - 64;
    let top = (work >> shift as usize).to_f64().unwrap_or(0.0);
    top.log2() + shift as f64
}

/// Minimum weight of a transaction of `size` bytes moving `sum_outputs`
/// base units.
pub fn minimum_tx_weight(params: &ConsensusParameters, size: usize, sum_outputs: u128) -> f64 {
    let amount = (sum_outputs.max(1) as f64) / 10f64.powi(params.decimal_places as i32);
    let size = (size.max(1)) as f64;
    let w = params.min_tx_weight_coefficient * size.log2()
        + 4.0 / (1.0 + params.min_tx_weight_k / amount) * 4.0;
    w.max(params.min_tx_weight)
}

pub struct WeightVerifier<'a> {
    params: &'a ConsensusParameters,
}

impl<'a> WeightVerifier<'a> {
    pub fn new(params: &'a ConsensusParameters) -> Self {
        Self { params }
    }

    pub fn min_tx_weight(&self, tx: &Transaction, size: usize) -> f64 {
        minimum_tx_weight(self.params, size, tx.sum_outputs())
    }

    fn verify_tx_bounds(&self, tx: &Transaction, size: usize) -> Result<(), InsufficientWork> {
        let minimum = self.min_tx_weight(tx, size);
        if tx.weight < minimum - self.params.weight_tol {
            return Err(InsufficientWork::BelowMinimum {
                weight: tx.weight,
                minimum,
            });
        }
        let maximum = minimum + self.params.max_tx_weight_diff;
        if minimum > self.params.max_tx_weight_diff_activation && tx.weight > maximum {
            return Err(InsufficientWork::AboveMaximum {
                weight: tx.weight,
                maximum,
            });
        }
        Ok(())
    }

    /// Class bounds first, then the hash against the declared weight.
    /// `hash` is the vertex's proof-of-work hash.
    pub fn verify_weight(&self, vertex: &Vertex, hash: &Hash, size: usize) -> Result<(), InsufficientWork> {
        match vertex {
            Vertex::Block(_) | Vertex::MergeMinedBlock(_) => {
                let weight = vertex.weight();
                let minimum = self.params.min_block_weight;
                if weight < minimum - self.params.weight_tol {
                    return Err(InsufficientWork::BelowMinimum { weight, minimum });
                }
            }
            Vertex::Transaction(tx) => self.verify_tx_bounds(tx, size)?,
        }
        verify_pow(hash, vertex.weight())
    }
}
