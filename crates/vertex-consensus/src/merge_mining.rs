use crate::error::VerificationError;
use crate::feature_activation::{Feature, FeatureService};
use crate::params::ConsensusParameters;
use crate::vertex::{make_version, BlockHeaderView, MergeMinedBlock, VertexKind};

pub struct MergeMiningVerifier<'a> {
    params: &'a ConsensusParameters,
    features: &'a FeatureService<'a>,
}

impl<'a> MergeMiningVerifier<'a> {
    pub fn new(params: &'a ConsensusParameters, features: &'a FeatureService<'a>) -> Self {
        Self { params, features }
    }

    /// Path bound for `block`, selected by the block's own feature state.
    pub fn max_merkle_path_length(&self, block: &BlockHeaderView) -> Result<usize, VerificationError> {
        let raised = self
            .features
            .is_feature_active_for_block(block, Feature::IncreaseMaxMerklePathLength)?;
        Ok(if raised {
            self.params.new_max_merkle_path_length
        } else {
            self.params.old_max_merkle_path_length
        })
    }

    pub fn verify_aux_pow(&self, block: &MergeMinedBlock) -> Result<(), VerificationError> {
        let view = BlockHeaderView {
            hash: block.hash(),
            parent: block.base.parent,
            height: block.base.height,
            timestamp: block.base.timestamp,
            version: make_version(VertexKind::MergeMinedBlock, block.base.signal_bits),
        };
        let max = self.max_merkle_path_length(&view)?;
        let base_hash = block.mining_base_hash()?;
        block.aux_pow.verify(&base_hash, block.base.weight, max)?;
        Ok(())
    }
}
