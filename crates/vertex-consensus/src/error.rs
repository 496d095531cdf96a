use crate::feature_activation::Feature;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    VertexErrParse,
    VertexErrFieldRange,
    VertexErrUnknownAncestor,
    VertexErrHeight,
    VertexErrTimestamp,
    VertexErrGenesis,
    VertexErrInsufficientWork,

    AuxPowErrBadExternalPow,
    AuxPowErrBadMerkleProof,
    AuxPowErrPathTooLong,
    AuxPowErrCommitmentMismatch,

    BlockErrMissingSignal,

    TxErrRewardLocked,
    TxErrContractsDisabled,
    TxErrContractRejected,

    FeatureErrQuery,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::VertexErrParse => "VERTEX_ERR_PARSE",
            ErrorCode::VertexErrFieldRange => "VERTEX_ERR_FIELD_RANGE",
            ErrorCode::VertexErrUnknownAncestor => "VERTEX_ERR_UNKNOWN_ANCESTOR",
            ErrorCode::VertexErrHeight => "VERTEX_ERR_HEIGHT",
            ErrorCode::VertexErrTimestamp => "VERTEX_ERR_TIMESTAMP",
            ErrorCode::VertexErrGenesis => "VERTEX_ERR_GENESIS",
            ErrorCode::VertexErrInsufficientWork => "VERTEX_ERR_INSUFFICIENT_WORK",

            ErrorCode::AuxPowErrBadExternalPow => "AUXPOW_ERR_BAD_EXTERNAL_POW",
            ErrorCode::AuxPowErrBadMerkleProof => "AUXPOW_ERR_BAD_MERKLE_PROOF",
            ErrorCode::AuxPowErrPathTooLong => "AUXPOW_ERR_PATH_TOO_LONG",
            ErrorCode::AuxPowErrCommitmentMismatch => "AUXPOW_ERR_COMMITMENT_MISMATCH",

            ErrorCode::BlockErrMissingSignal => "BLOCK_ERR_MISSING_SIGNAL",

            ErrorCode::TxErrRewardLocked => "TX_ERR_REWARD_LOCKED",
            ErrorCode::TxErrContractsDisabled => "TX_ERR_CONTRACTS_DISABLED",
            ErrorCode::TxErrContractRejected => "TX_ERR_CONTRACT_REJECTED",

            ErrorCode::FeatureErrQuery => "FEATURE_ERR_QUERY",
        }
    }
}

/// Structural deserialization or field-range violation. Always detected
/// before any hashing.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum MalformedVertex {
    #[error("unexpected end of input reading {0}")]
    UnexpectedEof(&'static str),
    #[error("trailing bytes after {0}")]
    TrailingBytes(&'static str),
    #[error("non-minimal CompactSize")]
    NonMinimalCompactSize,
    #[error("unknown vertex kind {0:#04x}")]
    UnknownKind(u8),
    #[error("{0}")]
    FieldRange(&'static str),
    #[error("unknown ancestor {0}")]
    UnknownAncestor(String),
    #[error("block height {height} does not follow parent height {parent_height}")]
    IncorrectHeight { height: u64, parent_height: u64 },
    #[error("timestamp {timestamp} is not after ancestor timestamp {ancestor_timestamp}")]
    TimestampNotAfterAncestor { timestamp: u32, ancestor_timestamp: u32 },
    #[error("height-0 block is not the configured genesis")]
    NotGenesis,
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum InsufficientWork {
    #[error("hash does not meet the target of weight {weight}")]
    HashAboveTarget { weight: f64 },
    #[error("weight {weight} is below the minimum {minimum}")]
    BelowMinimum { weight: f64, minimum: f64 },
    #[error("weight {weight} exceeds the allowed maximum {maximum}")]
    AboveMaximum { weight: f64, maximum: f64 },
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuxPowError {
    #[error("external header hash does not meet its declared target")]
    BadExternalPoW,
    #[error("coinbase is not included under the external merkle root")]
    BadMerkleProof,
    #[error("merkle path length {length} exceeds the maximum {max}")]
    PathTooLong { length: usize, max: usize },
    #[error("coinbase does not commit to the block mining base hash")]
    CommitmentMismatch,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error(
    "reward of block at height {reward_height} is locked at spending height {spending_height} (needs {min_blocks} blocks)"
)]
pub struct RewardLocked {
    pub reward_height: u64,
    pub spending_height: u64,
    pub min_blocks: u64,
}

/// Caller or configuration bug, not a verdict on the vertex.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FeatureQueryError {
    #[error("feature {0} is not registered for this network")]
    Unregistered(Feature),
    #[error("ancestor at height {height} is not available")]
    MissingAncestor { height: u64 },
    #[error("block {0} is not available")]
    UnknownBlock(String),
    #[error("feature evaluation interval is zero")]
    ZeroEvaluationInterval,
}

/// Opaque rejection returned by the contract runtime hook.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("contract runtime rejected the transaction ({} byte payload)", .payload.len())]
pub struct ContractError {
    pub payload: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum VerificationError {
    #[error(transparent)]
    Malformed(#[from] MalformedVertex),
    #[error(transparent)]
    InsufficientWork(#[from] InsufficientWork),
    #[error(transparent)]
    AuxPow(#[from] AuxPowError),
    #[error(transparent)]
    RewardLocked(#[from] RewardLocked),
    #[error(transparent)]
    FeatureQuery(#[from] FeatureQueryError),
    #[error("block must signal support for {0}")]
    MissingMandatorySignal(Feature),
    #[error("nano contracts are not enabled at the anchor block")]
    ContractsNotEnabled,
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl VerificationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            VerificationError::Malformed(e) => match e {
                MalformedVertex::UnexpectedEof(_)
                | MalformedVertex::TrailingBytes(_)
                | MalformedVertex::NonMinimalCompactSize
                | MalformedVertex::UnknownKind(_) => ErrorCode::VertexErrParse,
                MalformedVertex::FieldRange(_) => ErrorCode::VertexErrFieldRange,
                MalformedVertex::UnknownAncestor(_) => ErrorCode::VertexErrUnknownAncestor,
                MalformedVertex::IncorrectHeight { .. } => ErrorCode::VertexErrHeight,
                MalformedVertex::TimestampNotAfterAncestor { .. } => ErrorCode::VertexErrTimestamp,
                MalformedVertex::NotGenesis => ErrorCode::VertexErrGenesis,
            },
            VerificationError::InsufficientWork(_) => ErrorCode::VertexErrInsufficientWork,
            VerificationError::AuxPow(e) => match e {
                AuxPowError::BadExternalPoW => ErrorCode::AuxPowErrBadExternalPow,
                AuxPowError::BadMerkleProof => ErrorCode::AuxPowErrBadMerkleProof,
                AuxPowError::PathTooLong { .. } => ErrorCode::AuxPowErrPathTooLong,
                AuxPowError::CommitmentMismatch => ErrorCode::AuxPowErrCommitmentMismatch,
            },
            VerificationError::RewardLocked(_) => ErrorCode::TxErrRewardLocked,
            VerificationError::FeatureQuery(_) => ErrorCode::FeatureErrQuery,
            VerificationError::MissingMandatorySignal(_) => ErrorCode::BlockErrMissingSignal,
            VerificationError::ContractsNotEnabled => ErrorCode::TxErrContractsDisabled,
            VerificationError::Contract(_) => ErrorCode::TxErrContractRejected,
        }
    }

    /// True for failures caused by the caller's configuration or ancestor
    /// store rather than by the vertex itself.
    pub fn is_internal(&self) -> bool {
        matches!(self, VerificationError::FeatureQuery(_))
    }

    /// A reward-locked spend may become valid once the chain grows; nothing
    /// else changes its verdict by waiting.
    pub fn is_retryable_later(&self) -> bool {
        matches!(self, VerificationError::RewardLocked(_))
    }
}
