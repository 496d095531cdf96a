use crate::ancestors::AncestorAccessor;
use crate::error::RewardLocked;
use crate::vertex::TxInput;

/// Height of the block whose reward an input spends, or `None` when the
/// input does not spend a block reward.
pub fn reward_height(input: &TxInput, ancestors: &dyn AncestorAccessor) -> Option<u64> {
    ancestors.get_block(&input.tx_id).map(|b| b.height)
}

pub struct RewardLockVerifier {
    min_blocks: u64,
}

impl RewardLockVerifier {
    pub fn new(min_blocks: u64) -> Self {
        Self { min_blocks }
    }

    /// Pure height arithmetic. A spend below the reward height is treated
    /// as zero confirmations.
    pub fn verify_spendability(&self, reward_height: u64, spending_height: u64) -> Result<(), RewardLocked> {
        if spending_height.saturating_sub(reward_height) < self.min_blocks {
            return Err(RewardLocked {
                reward_height,
                spending_height,
                min_blocks: self.min_blocks,
            });
        }
        Ok(())
    }

    /// Checks every input of a transaction spending at `spending_height`.
    pub fn verify_inputs(
        &self,
        inputs: &[TxInput],
        spending_height: u64,
        ancestors: &dyn AncestorAccessor,
    ) -> Result<(), RewardLocked> {
        for input in inputs {
            if let Some(h) = reward_height(input, ancestors) {
                self.verify_spendability(h, spending_height)?;
            }
        }
        Ok(())
    }
}

