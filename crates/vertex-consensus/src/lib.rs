pub mod ancestors;
pub mod aux_pow;
mod compactsize;
pub mod constants;
pub mod error;
pub mod feature_activation;
pub mod hash;
pub mod merge_mining;
pub mod mining;
pub mod params;
pub mod reward_lock;
pub mod verifier;
pub mod vertex;
pub mod weight;
mod wire_read;

pub use ancestors::{AncestorAccessor, MemoryAncestors};
pub use aux_pow::{AuxiliaryProofOfWork, ExternalHeader, MerkleDirection, MerklePathStep};
pub use compactsize::{encode_compact_size, read_compact_size};
pub use error::{
    AuxPowError, ContractError, ErrorCode, FeatureQueryError, InsufficientWork, MalformedVertex,
    RewardLocked, VerificationError,
};
pub use feature_activation::{
    BlockSignalingState, Criteria, Feature, FeatureActivationSettings, FeatureInfo,
    FeatureService, FeatureState,
};
pub use hash::Hash;
pub use merge_mining::MergeMiningVerifier;
pub use params::{ConsensusParameters, NanoContractsSetting, ParamsError};
pub use reward_lock::RewardLockVerifier;
pub use verifier::{verify, ContractRuntime, VertexVerifier};
pub use vertex::{
    Block, BlockBase, BlockHeaderView, MergeMinedBlock, Transaction, TxInput, TxOutput, Vertex,
    VertexKind,
};
pub use weight::{weight_to_target, weight_to_work, work_to_weight, WeightVerifier};
pub use wire_read::Reader;

#[cfg(test)]
mod aux_pow_tests;
#[cfg(test)]
mod feature_activation_tests;
