use std::collections::HashSet;

use tracing::{debug, trace};

use crate::ancestors::AncestorAccessor;
use crate::constants::MAX_OUTPUT_SCRIPT_SIZE;
use crate::error::{ContractError, MalformedVertex, VerificationError};
use crate::feature_activation::{BlockSignalingState, Feature, FeatureService};
use crate::hash::Hash;
use crate::merge_mining::MergeMiningVerifier;
use crate::params::{ConsensusParameters, NanoContractsSetting};
use crate::reward_lock::RewardLockVerifier;
use crate::vertex::{BlockBase, BlockHeaderView, Transaction, TxOutput, Vertex};
use crate::weight::WeightVerifier;

/// Contract execution hook. Invoked last, only for transactions carrying a
/// contract payload on a network where contracts are enabled.
pub trait ContractRuntime {
    fn execute(&self, tx: &Transaction, anchor: &BlockHeaderView) -> Result<(), ContractError>;
}

pub struct VertexVerifier<'a> {
    params: &'a ConsensusParameters,
    contract_runtime: Option<&'a dyn ContractRuntime>,
}

fn check_outputs(outputs: &[TxOutput], params: &ConsensusParameters) -> Result<(), MalformedVertex> {
    if outputs.len() > params.max_num_outputs {
        return Err(MalformedVertex::FieldRange("too many outputs"));
    }
    if outputs.iter().any(|o| o.script.len() > MAX_OUTPUT_SCRIPT_SIZE) {
        return Err(MalformedVertex::FieldRange("output script too long"));
    }
    Ok(())
}

fn check_weight_field(weight: f64) -> Result<(), MalformedVertex> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(MalformedVertex::FieldRange("weight must be finite and non-negative"));
    }
    Ok(())
}

fn check_block_structure(base: &BlockBase, params: &ConsensusParameters) -> Result<(), MalformedVertex> {
    check_weight_field(base.weight)?;
    if base.data.len() > params.block_data_max_size {
        return Err(MalformedVertex::FieldRange("block data too long"));
    }
    check_outputs(&base.outputs, params)
}

fn check_tx_structure(tx: &Transaction, params: &ConsensusParameters) -> Result<(), MalformedVertex> {
    check_weight_field(tx.weight)?;
    if tx.inputs.len() > params.max_num_inputs {
        return Err(MalformedVertex::FieldRange("too many inputs"));
    }
    let mut seen = HashSet::with_capacity(tx.inputs.len());
    for i in &tx.inputs {
        if !seen.insert((i.tx_id, i.index)) {
            return Err(MalformedVertex::FieldRange("duplicate input"));
        }
    }
    check_outputs(&tx.outputs, params)
}

impl<'a> VertexVerifier<'a> {
    pub fn new(params: &'a ConsensusParameters) -> Self {
        Self {
            params,
            contract_runtime: None,
        }
    }

    pub fn with_contract_runtime(mut self, runtime: &'a dyn ContractRuntime) -> Self {
        self.contract_runtime = Some(runtime);
        self
    }

    /// Accepts or rejects `vertex`. The first failing check is returned as is.
    pub fn verify(&self, vertex: &Vertex, ancestors: &dyn AncestorAccessor) -> Result<(), VerificationError> {
        let res = match vertex {
            Vertex::Block(_) | Vertex::MergeMinedBlock(_) => self.verify_block(vertex, ancestors),
            Vertex::Transaction(tx) => self.verify_tx(vertex, tx, ancestors),
        };
        if let Err(e) = &res {
            debug!(code = e.code().as_str(), error = %e, kind = ?vertex.kind(), "vertex rejected");
        }
        res
    }

    fn parent_of(
        &self,
        hash: &Hash,
        ancestors: &dyn AncestorAccessor,
    ) -> Result<BlockHeaderView, MalformedVertex> {
        ancestors
            .get_block(hash)
            .ok_or_else(|| MalformedVertex::UnknownAncestor(hex::encode(hash)))
    }

    fn verify_block(&self, vertex: &Vertex, ancestors: &dyn AncestorAccessor) -> Result<(), VerificationError> {
        let base = vertex
            .block_base()
            .ok_or(MalformedVertex::FieldRange("not a block"))?;

        trace!(check = "structure", height = base.height);
        check_block_structure(base, self.params)?;
        let bytes = vertex.to_bytes()?;
        let hash = vertex.hash()?;

        if base.height == 0 {
            trace!(check = "genesis");
            if hash != self.params.genesis_hash()? {
                return Err(MalformedVertex::NotGenesis.into());
            }
            return Ok(());
        }

        trace!(check = "parent");
        let parent = self.parent_of(&base.parent, ancestors)?;
        if base.height != parent.height + 1 {
            return Err(MalformedVertex::IncorrectHeight {
                height: base.height,
                parent_height: parent.height,
            }
            .into());
        }
        if base.timestamp <= parent.timestamp {
            return Err(MalformedVertex::TimestampNotAfterAncestor {
                timestamp: base.timestamp,
                ancestor_timestamp: parent.timestamp,
            }
            .into());
        }

        trace!(check = "weight", weight = base.weight);
        WeightVerifier::new(self.params).verify_weight(vertex, &hash, bytes.len())?;

        let features = FeatureService::new(&self.params.feature_activation, ancestors);
        if let Vertex::MergeMinedBlock(mm) = vertex {
            trace!(check = "aux_pow", path_len = mm.aux_pow.merkle_path.len());
            MergeMiningVerifier::new(self.params, &features).verify_aux_pow(mm)?;
        }

        trace!(check = "mandatory_signaling");
        let view = vertex
            .block_view()?
            .ok_or(MalformedVertex::FieldRange("not a block"))?;
        if let BlockSignalingState::MissingSignal(f) = features.is_signaling_mandatory_features(&view)? {
            return Err(VerificationError::MissingMandatorySignal(f));
        }
        Ok(())
    }

    fn verify_tx(
        &self,
        vertex: &Vertex,
        tx: &Transaction,
        ancestors: &dyn AncestorAccessor,
    ) -> Result<(), VerificationError> {
        trace!(check = "structure", inputs = tx.inputs.len(), outputs = tx.outputs.len());
        check_tx_structure(tx, self.params)?;
        let bytes = tx.to_bytes()?;

        trace!(check = "anchor");
        let anchor = self.parent_of(&tx.anchor_block, ancestors)?;
        if tx.timestamp <= anchor.timestamp {
            return Err(MalformedVertex::TimestampNotAfterAncestor {
                timestamp: tx.timestamp,
                ancestor_timestamp: anchor.timestamp,
            }
            .into());
        }

        trace!(check = "weight", weight = tx.weight);
        let hash = tx.hash()?;
        WeightVerifier::new(self.params).verify_weight(vertex, &hash, bytes.len())?;

        trace!(check = "reward_lock", spending_height = anchor.height);
        RewardLockVerifier::new(self.params.reward_spend_min_blocks).verify_inputs(
            &tx.inputs,
            anchor.height,
            ancestors,
        )?;

        if tx.contract_payload.is_some() {
            trace!(check = "nano_contracts");
            let enabled = match self.params.enable_nano_contracts {
                NanoContractsSetting::Disabled => false,
                NanoContractsSetting::Enabled => true,
                NanoContractsSetting::FeatureActivation => {
                    FeatureService::new(&self.params.feature_activation, ancestors)
                        .is_feature_active_for_block(&anchor, Feature::NanoContracts)?
                }
            };
            if !enabled {
                return Err(VerificationError::ContractsNotEnabled);
            }
            if let Some(rt) = self.contract_runtime {
                rt.execute(tx, &anchor)?;
            }
        }
        Ok(())
    }
}

/// Verifies `vertex` against `ancestors` without a contract runtime.
pub fn verify(
    vertex: &Vertex,
    ancestors: &dyn AncestorAccessor,
    params: &ConsensusParameters,
) -> Result<(), VerificationError> {
    VertexVerifier::new(params).verify(vertex, ancestors)
}
