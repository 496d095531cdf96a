use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    BLOCK_DATA_MAX_SIZE, DECIMAL_PLACES, MAX_NUM_INPUTS, MAX_NUM_OUTPUTS, MAX_SIGNAL_BITS,
    MIN_TX_WEIGHT_COEFFICIENT, MIN_TX_WEIGHT_K, NEW_MAX_MERKLE_PATH_LENGTH,
    OLD_MAX_MERKLE_PATH_LENGTH, WEIGHT_TOL,
};
use crate::error::MalformedVertex;
use crate::feature_activation::{Criteria, Feature, FeatureActivationSettings};
use crate::hash::{Hash, ZERO_HASH};
use crate::vertex::{Block, BlockBase, TxOutput};

#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("unknown network {0:?}")]
    UnknownNetwork(String),
    #[error("{field} must be finite and > 0, got {value}")]
    BadWeight { field: &'static str, value: f64 },
    #[error("{0} must be > 0")]
    Zero(&'static str),
    #[error("old_max_merkle_path_length {old} exceeds new_max_merkle_path_length {new}")]
    MerklePathBounds { old: usize, new: usize },
    #[error("max_signal_bits must be in 1..={max}, got {got}")]
    SignalBits { got: u8, max: u8 },
    #[error("threshold {threshold} exceeds evaluation_interval {interval}")]
    Threshold { threshold: u32, interval: u64 },
    #[error("feature {feature}: {reason}")]
    BadCriteria { feature: Feature, reason: String },
    #[error("features {a} and {b} share bit {bit}")]
    DuplicateBit { a: Feature, b: Feature, bit: u8 },
    #[error("genesis block cannot be encoded: {0}")]
    Genesis(#[from] MalformedVertex),
    #[error("genesis hash mismatch: configured {configured}, computed {computed}")]
    GenesisHashMismatch { configured: String, computed: String },
}

/// How nano contracts are enabled on a network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NanoContractsSetting {
    Disabled,
    Enabled,
    /// Enabled once `NANO_CONTRACTS` is active at the transaction's anchor.
    FeatureActivation,
}

/// Per-network consensus constants. Constructed once and shared by reference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsensusParameters {
    pub network_name: String,
    pub p2pkh_version_byte: u8,
    pub multisig_version_byte: u8,

    pub min_block_weight: f64,
    pub min_tx_weight: f64,
    pub max_tx_weight_diff: f64,
    pub max_tx_weight_diff_activation: f64,
    pub min_tx_weight_coefficient: f64,
    pub min_tx_weight_k: f64,
    pub decimal_places: u32,
    pub weight_tol: f64,
    pub block_difficulty_n_blocks: u64,

    pub reward_spend_min_blocks: u64,

    pub old_max_merkle_path_length: usize,
    pub new_max_merkle_path_length: usize,

    pub block_data_max_size: usize,
    pub max_num_inputs: usize,
    pub max_num_outputs: usize,

    #[serde(with = "hex_bytes")]
    pub genesis_output_script: Vec<u8>,
    pub genesis_block_timestamp: u32,
    pub genesis_block_nonce: u128,
    pub genesis_tokens: u64,
    #[serde(default, with = "hex_hash_opt", skip_serializing_if = "Option::is_none")]
    pub genesis_block_hash: Option<Hash>,

    pub enable_nano_contracts: NanoContractsSetting,
    pub feature_activation: FeatureActivationSettings,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(v))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

mod hex_hash_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::hash::Hash;

    pub fn serialize<S: Serializer>(v: &Option<Hash>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(h) => s.serialize_str(&hex::encode(h)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Hash>, D::Error> {
        let Some(s) = Option::<String>::deserialize(d)? else {
            return Ok(None);
        };
        let b = hex::decode(s).map_err(serde::de::Error::custom)?;
        let h: Hash = b
            .try_into()
            .map_err(|_| serde::de::Error::custom("genesis_block_hash must be 32 bytes"))?;
        Ok(Some(h))
    }
}

fn criteria(bit: u8, start_height: u64, timeout_height: u64, lock_in_on_timeout: bool, version: &str) -> Criteria {
    Criteria {
        bit,
        start_height,
        timeout_height,
        threshold: None,
        minimum_activation_height: 0,
        lock_in_on_timeout,
        version: version.to_string(),
    }
}

fn hash_from_hex(s: &str) -> Option<Hash> {
    hex::decode(s).ok()?.try_into().ok()
}

impl ConsensusParameters {
    pub fn mainnet() -> Self {
        let mut features = BTreeMap::new();
        features.insert(
            Feature::IncreaseMaxMerklePathLength,
            criteria(0, 4_354_560, 4_475_520, false, "0.59.0"),
        );
        Self {
            network_name: "mainnet".to_string(),
            p2pkh_version_byte: 0x28,
            multisig_version_byte: 0x64,
            min_block_weight: 21.0,
            min_tx_weight: 14.0,
            max_tx_weight_diff: 4.0,
            max_tx_weight_diff_activation: 32.0,
            min_tx_weight_coefficient: MIN_TX_WEIGHT_COEFFICIENT,
            min_tx_weight_k: MIN_TX_WEIGHT_K,
            decimal_places: DECIMAL_PLACES,
            weight_tol: WEIGHT_TOL,
            block_difficulty_n_blocks: 134,
            reward_spend_min_blocks: 300,
            old_max_merkle_path_length: OLD_MAX_MERKLE_PATH_LENGTH,
            new_max_merkle_path_length: NEW_MAX_MERKLE_PATH_LENGTH,
            block_data_max_size: BLOCK_DATA_MAX_SIZE,
            max_num_inputs: MAX_NUM_INPUTS,
            max_num_outputs: MAX_NUM_OUTPUTS,
            genesis_output_script: hex::decode("76a9147fd4ae0e4fb2d2854e76d359029d8078bb99649e88ac")
                .unwrap_or_default(),
            genesis_block_timestamp: 1_572_636_343,
            genesis_block_nonce: 3_526_202,
            genesis_tokens: 200_000_000_000,
            genesis_block_hash: hash_from_hex(MAINNET_GENESIS_HASH),
            enable_nano_contracts: NanoContractsSetting::Disabled,
            feature_activation: FeatureActivationSettings {
                evaluation_interval: 40_320,
                max_signal_bits: 4,
                default_threshold: 36_288,
                features,
            },
        }
    }

    pub fn testnet() -> Self {
        let mut features = BTreeMap::new();
        features.insert(
            Feature::IncreaseMaxMerklePathLength,
            criteria(0, 3_144_960, 3_225_600, false, "0.59.0"),
        );
        features.insert(
            Feature::NanoContracts,
            criteria(1, 3_709_440, 3_870_720, true, "0.63.0"),
        );
        Self {
            network_name: "testnet-bravo".to_string(),
            p2pkh_version_byte: 0x49,
            multisig_version_byte: 0x87,
            genesis_output_script: hex::decode("76a91478e804bf8aa68332c6c1ada274ac598178b972bf88ac")
                .unwrap_or_default(),
            genesis_block_timestamp: 1_677_601_898,
            genesis_block_nonce: 7_881_594,
            genesis_block_hash: hash_from_hex(TESTNET_GENESIS_HASH),
            min_tx_weight: 8.0,
            enable_nano_contracts: NanoContractsSetting::FeatureActivation,
            feature_activation: FeatureActivationSettings {
                evaluation_interval: 40_320,
                max_signal_bits: 4,
                default_threshold: 30_240,
                features,
            },
            ..Self::mainnet()
        }
    }

    /// Low-difficulty parameters for tests: weights of 2, a four-block
    /// evaluation interval and a ten-block reward lock.
    pub fn unittests() -> Self {
        let mut features = BTreeMap::new();
        features.insert(
            Feature::IncreaseMaxMerklePathLength,
            criteria(3, 4_000, 8_000, false, "0.59.0"),
        );
        Self {
            network_name: "unittests".to_string(),
            min_block_weight: 2.0,
            min_tx_weight: 2.0,
            max_tx_weight_diff: 25.0,
            max_tx_weight_diff_activation: 0.0,
            block_difficulty_n_blocks: 20,
            reward_spend_min_blocks: 10,
            genesis_output_script: hex::decode("76a914d07bc82d6e0d1bb116614076645e9b87c8c83b4188ac")
                .unwrap_or_default(),
            genesis_block_nonce: 5,
            genesis_block_hash: hash_from_hex(UNITTESTS_GENESIS_HASH),
            enable_nano_contracts: NanoContractsSetting::Enabled,
            feature_activation: FeatureActivationSettings {
                evaluation_interval: 4,
                max_signal_bits: 4,
                default_threshold: 3,
                features,
            },
            ..Self::mainnet()
        }
    }

    pub fn by_network_name(name: &str) -> Result<Self, ParamsError> {
        match name {
            "mainnet" => Ok(Self::mainnet()),
            "testnet" | "testnet-bravo" => Ok(Self::testnet()),
            "unittests" => Ok(Self::unittests()),
            _ => Err(ParamsError::UnknownNetwork(name.to_string())),
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, ParamsError> {
        let p: Self = serde_json::from_str(s)?;
        p.validate()?;
        tracing::debug!(network = %p.network_name, "loaded consensus parameters");
        Ok(p)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ParamsError> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|source| ParamsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&s)
    }

    pub fn genesis_block(&self) -> Block {
        Block {
            base: BlockBase {
                signal_bits: 0,
                weight: self.min_block_weight,
                timestamp: self.genesis_block_timestamp,
                height: 0,
                parent: ZERO_HASH,
                outputs: vec![TxOutput {
                    value: self.genesis_tokens,
                    script: self.genesis_output_script.clone(),
                }],
                data: Vec::new(),
            },
            nonce: self.genesis_block_nonce,
        }
    }

    /// Configured genesis hash, or the hash of the configured genesis block
    /// when none is pinned.
    pub fn genesis_hash(&self) -> Result<Hash, MalformedVertex> {
        match self.genesis_block_hash {
            Some(h) => Ok(h),
            None => self.genesis_block().hash(),
        }
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        for (field, value) in [
            ("min_block_weight", self.min_block_weight),
            ("min_tx_weight", self.min_tx_weight),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ParamsError::BadWeight { field, value });
            }
        }
        for (field, value) in [
            ("max_tx_weight_diff", self.max_tx_weight_diff),
            ("max_tx_weight_diff_activation", self.max_tx_weight_diff_activation),
            ("min_tx_weight_coefficient", self.min_tx_weight_coefficient),
            ("min_tx_weight_k", self.min_tx_weight_k),
            ("weight_tol", self.weight_tol),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ParamsError::BadWeight { field, value });
            }
        }
        if self.block_difficulty_n_blocks == 0 {
            return Err(ParamsError::Zero("block_difficulty_n_blocks"));
        }
        if self.old_max_merkle_path_length > self.new_max_merkle_path_length {
            return Err(ParamsError::MerklePathBounds {
                old: self.old_max_merkle_path_length,
                new: self.new_max_merkle_path_length,
            });
        }

        let fa = &self.feature_activation;
        if fa.evaluation_interval == 0 {
            return Err(ParamsError::Zero("evaluation_interval"));
        }
        if fa.max_signal_bits == 0 || fa.max_signal_bits > MAX_SIGNAL_BITS {
            return Err(ParamsError::SignalBits {
                got: fa.max_signal_bits,
                max: MAX_SIGNAL_BITS,
            });
        }
        if u64::from(fa.default_threshold) > fa.evaluation_interval {
            return Err(ParamsError::Threshold {
                threshold: fa.default_threshold,
                interval: fa.evaluation_interval,
            });
        }

        let mut bits: BTreeMap<u8, Feature> = BTreeMap::new();
        for (feature, c) in &fa.features {
            let bad = |reason: String| ParamsError::BadCriteria { feature: *feature, reason };
            if c.bit >= fa.max_signal_bits {
                return Err(bad(format!("bit {} must be < max_signal_bits {}", c.bit, fa.max_signal_bits)));
            }
            if let Some(t) = c.threshold {
                if u64::from(t) > fa.evaluation_interval {
                    return Err(ParamsError::Threshold {
                        threshold: t,
                        interval: fa.evaluation_interval,
                    });
                }
            }
            for (name, h) in [
                ("start_height", c.start_height),
                ("timeout_height", c.timeout_height),
                ("minimum_activation_height", c.minimum_activation_height),
            ] {
                if h % fa.evaluation_interval != 0 {
                    return Err(bad(format!(
                        "{name} {h} is not a multiple of evaluation_interval {}",
                        fa.evaluation_interval
                    )));
                }
            }
            let min_timeout = c.start_height.saturating_add(2 * fa.evaluation_interval);
            if c.timeout_height < min_timeout {
                return Err(bad(format!(
                    "timeout_height {} must be at least {min_timeout}",
                    c.timeout_height
                )));
            }
            if let Some(other) = bits.insert(c.bit, *feature) {
                return Err(ParamsError::DuplicateBit {
                    a: other,
                    b: *feature,
                    bit: c.bit,
                });
            }
        }

        if let Some(configured) = self.genesis_block_hash {
            let computed = self.genesis_block().hash()?;
            if computed != configured {
                return Err(ParamsError::GenesisHashMismatch {
                    configured: hex::encode(configured),
                    computed: hex::encode(computed),
                });
            }
        }
        Ok(())
    }

    pub fn registered_features(&self) -> BTreeSet<Feature> {
        self.feature_activation.features.keys().copied().collect()
    }
}

const MAINNET_GENESIS_HASH: &str = "a418039087644151ddfaeb28a65a53e544aab79fba04302bb6e765a5a018ceed";
const TESTNET_GENESIS_HASH: &str = "17a077dd6a04f764276905aa08d665a3578e637c89862502e8e09b902793a827";
const UNITTESTS_GENESIS_HASH: &str = "91f8e0814b0c5f826ac46c73c86671713295cd23737395aaeea6dec5eacb7ca4";
