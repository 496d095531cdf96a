use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ancestors::AncestorAccessor;
use crate::error::FeatureQueryError;
use crate::vertex::{version_signal_bits, BlockHeaderView, Vertex};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Feature {
    NopFeature1,
    NopFeature2,
    NopFeature3,
    IncreaseMaxMerklePathLength,
    NanoContracts,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::NopFeature1,
        Feature::NopFeature2,
        Feature::NopFeature3,
        Feature::IncreaseMaxMerklePathLength,
        Feature::NanoContracts,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Feature::NopFeature1 => "NOP_FEATURE_1",
            Feature::NopFeature2 => "NOP_FEATURE_2",
            Feature::NopFeature3 => "NOP_FEATURE_3",
            Feature::IncreaseMaxMerklePathLength => "INCREASE_MAX_MERKLE_PATH_LENGTH",
            Feature::NanoContracts => "NANO_CONTRACTS",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureState {
    Defined,
    Started,
    MustSignal,
    LockedIn,
    Active,
    Failed,
}

impl FeatureState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureState::Defined => "DEFINED",
            FeatureState::Started => "STARTED",
            FeatureState::MustSignal => "MUST_SIGNAL",
            FeatureState::LockedIn => "LOCKED_IN",
            FeatureState::Active => "ACTIVE",
            FeatureState::Failed => "FAILED",
        }
    }

    pub fn is_active(&self) -> bool {
        *self == FeatureState::Active
    }
}

/// Activation schedule of one feature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Criteria {
    pub bit: u8,
    pub start_height: u64,
    pub timeout_height: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,
    #[serde(default)]
    pub minimum_activation_height: u64,
    #[serde(default)]
    pub lock_in_on_timeout: bool,
    /// Software version that introduced the feature. Informational only.
    #[serde(default)]
    pub version: String,
}

impl Criteria {
    pub fn threshold(&self, settings: &FeatureActivationSettings) -> u32 {
        self.threshold.unwrap_or(settings.default_threshold)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureActivationSettings {
    pub evaluation_interval: u64,
    pub max_signal_bits: u8,
    pub default_threshold: u32,
    #[serde(default)]
    pub features: BTreeMap<Feature, Criteria>,
}

impl FeatureActivationSettings {
    pub fn criteria(&self, feature: Feature) -> Result<&Criteria, FeatureQueryError> {
        self.features
            .get(&feature)
            .ok_or(FeatureQueryError::Unregistered(feature))
    }

    /// Most recent evaluation boundary at or below `height`.
    pub fn boundary_height(&self, height: u64) -> Result<u64, FeatureQueryError> {
        height
            .checked_rem(self.evaluation_interval)
            .map(|offset| height - offset)
            .ok_or(FeatureQueryError::ZeroEvaluationInterval)
    }
}

/// One registered feature and its state at some block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FeatureInfo {
    pub feature: Feature,
    pub criteria: Criteria,
    pub state: FeatureState,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockSignalingState {
    Signaling,
    MissingSignal(Feature),
}

fn next_state(
    prev: FeatureState,
    boundary_height: u64,
    prev_window_signal_count: u32,
    criteria: &Criteria,
    settings: &FeatureActivationSettings,
) -> FeatureState {
    match prev {
        FeatureState::Defined => {
            if boundary_height >= criteria.start_height {
                FeatureState::Started
            } else {
                FeatureState::Defined
            }
        }
        FeatureState::Started => {
            if boundary_height >= criteria.timeout_height && !criteria.lock_in_on_timeout {
                FeatureState::Failed
            } else if boundary_height < criteria.timeout_height
                && prev_window_signal_count >= criteria.threshold(settings)
            {
                FeatureState::LockedIn
            } else if boundary_height + settings.evaluation_interval >= criteria.timeout_height
                && criteria.lock_in_on_timeout
            {
                FeatureState::MustSignal
            } else {
                FeatureState::Started
            }
        }
        // MUST_SIGNAL lasts exactly one interval.
        FeatureState::MustSignal => FeatureState::LockedIn,
        FeatureState::LockedIn => {
            if boundary_height >= criteria.minimum_activation_height {
                FeatureState::Active
            } else {
                FeatureState::LockedIn
            }
        }
        FeatureState::Active => FeatureState::Active,
        FeatureState::Failed => FeatureState::Failed,
    }
}

/// State at `height` given the per-window signal counts for the feature's
/// bit. `window_signal_counts[k]` covers heights
/// `[k * interval, (k + 1) * interval - 1]` and is consulted at boundary
/// `(k + 1) * interval`.
pub fn state_from_window_counts(
    criteria: &Criteria,
    settings: &FeatureActivationSettings,
    height: u64,
    window_signal_counts: &[u32],
) -> Result<FeatureState, String> {
    if settings.evaluation_interval == 0 {
        return Err("feature activation: evaluation_interval must be > 0".to_string());
    }
    let interval = settings.evaluation_interval;
    let target_index = height / interval;
    if (window_signal_counts.len() as u64) < target_index {
        return Err(format!(
            "feature activation: need {} window counts, got {}",
            target_index,
            window_signal_counts.len()
        ));
    }

    // Boundary 0 is genesis and always DEFINED.
    let mut state = FeatureState::Defined;
    for index in 1..=target_index {
        let count = window_signal_counts[(index - 1) as usize];
        state = next_state(state, index * interval, count, criteria, settings);
    }
    Ok(state)
}

fn signals(view: &BlockHeaderView, bit: u8, max_signal_bits: u8) -> bool {
    (version_signal_bits(view.version, max_signal_bits) >> bit) & 1 == 1
}

/// Computes feature states from ancestor headers on every call. Holds no
/// cache; callers may memoize by (feature, block hash).
pub struct FeatureService<'a> {
    settings: &'a FeatureActivationSettings,
    ancestors: &'a dyn AncestorAccessor,
}

impl<'a> FeatureService<'a> {
    pub fn new(settings: &'a FeatureActivationSettings, ancestors: &'a dyn AncestorAccessor) -> Self {
        Self { settings, ancestors }
    }

    pub fn settings(&self) -> &FeatureActivationSettings {
        self.settings
    }

    /// State of `feature` at `block`. The block itself need not be stored;
    /// only its ancestors are read.
    pub fn get_state(&self, block: &BlockHeaderView, feature: Feature) -> Result<FeatureState, FeatureQueryError> {
        let criteria = self.settings.criteria(feature)?;
        let boundary = self.settings.boundary_height(block.height)?;
        if block.is_genesis() {
            return Ok(FeatureState::Defined);
        }

        let interval = self.settings.evaluation_interval;
        let target_index = boundary / interval;
        let mut counts = vec![0u32; target_index as usize];

        // Windows before the feature starts cannot change its state.
        let lowest = criteria.start_height.max(interval);
        if lowest < boundary {
            let mut cur = self
                .ancestors
                .get_ancestor_at_height(&block.parent, boundary - 1)
                .filter(|a| a.height == boundary - 1)
                .ok_or(FeatureQueryError::MissingAncestor { height: boundary - 1 })?;
            loop {
                if signals(&cur, criteria.bit, self.settings.max_signal_bits) {
                    counts[(cur.height / interval) as usize] += 1;
                }
                if cur.height <= lowest {
                    break;
                }
                let below = cur.height - 1;
                cur = self
                    .ancestors
                    .get_block(&cur.parent)
                    .filter(|p| p.height == below)
                    .ok_or(FeatureQueryError::MissingAncestor { height: below })?;
            }
        }

        state_from_window_counts(criteria, self.settings, block.height, &counts)
            .map_err(|_| FeatureQueryError::MissingAncestor { height: boundary })
    }

    pub fn is_feature_active_for_block(&self, block: &BlockHeaderView, feature: Feature) -> Result<bool, FeatureQueryError> {
        Ok(self.get_state(block, feature)?.is_active())
    }

    fn anchor_view(&self, vertex: &Vertex) -> Result<BlockHeaderView, FeatureQueryError> {
        match vertex {
            Vertex::Transaction(tx) => self
                .ancestors
                .get_block(&tx.anchor_block)
                .ok_or_else(|| FeatureQueryError::UnknownBlock(hex::encode(tx.anchor_block))),
            _ => vertex
                .block_view()
                .ok()
                .flatten()
                .ok_or_else(|| FeatureQueryError::UnknownBlock("unencodable block".to_string())),
        }
    }

    /// Blocks are evaluated at themselves, transactions at their anchor block.
    pub fn get_vertex_state(&self, vertex: &Vertex, feature: Feature) -> Result<FeatureState, FeatureQueryError> {
        let view = self.anchor_view(vertex)?;
        self.get_state(&view, feature)
    }

    pub fn is_feature_active(&self, vertex: &Vertex, feature: Feature) -> Result<bool, FeatureQueryError> {
        Ok(self.get_vertex_state(vertex, feature)?.is_active())
    }

    pub fn get_feature_infos(&self, block: &BlockHeaderView) -> Result<Vec<FeatureInfo>, FeatureQueryError> {
        let mut out = Vec::with_capacity(self.settings.features.len());
        for (feature, criteria) in &self.settings.features {
            out.push(FeatureInfo {
                feature: *feature,
                criteria: criteria.clone(),
                state: self.get_state(block, *feature)?,
            });
        }
        Ok(out)
    }

    /// Checks that a block inside a MUST_SIGNAL interval can still reach the
    /// threshold for every such feature.
    pub fn is_signaling_mandatory_features(&self, block: &BlockHeaderView) -> Result<BlockSignalingState, FeatureQueryError> {
        let boundary = self.settings.boundary_height(block.height)?;
        if block.is_genesis() {
            return Ok(BlockSignalingState::Signaling);
        }
        let interval = self.settings.evaluation_interval;
        let offset = block.height - boundary;
        let remaining = interval - offset - 1;

        for (feature, criteria) in &self.settings.features {
            if self.get_state(block, *feature)? != FeatureState::MustSignal {
                continue;
            }

            let max_bits = self.settings.max_signal_bits;
            let mut count = u32::from(signals(block, criteria.bit, max_bits));
            if offset > 0 {
                let mut cur = self
                    .ancestors
                    .get_block(&block.parent)
                    .filter(|p| p.height == block.height - 1)
                    .ok_or(FeatureQueryError::MissingAncestor { height: block.height - 1 })?;
                loop {
                    if signals(&cur, criteria.bit, max_bits) {
                        count += 1;
                    }
                    if cur.height <= boundary {
                        break;
                    }
                    let below = cur.height - 1;
                    cur = self
                        .ancestors
                        .get_block(&cur.parent)
                        .filter(|p| p.height == below)
                        .ok_or(FeatureQueryError::MissingAncestor { height: below })?;
                }
            }

            let missing = u64::from(criteria.threshold(self.settings).saturating_sub(count));
            if missing > remaining {
                return Ok(BlockSignalingState::MissingSignal(*feature));
            }
        }

        Ok(BlockSignalingState::Signaling)
    }
}
