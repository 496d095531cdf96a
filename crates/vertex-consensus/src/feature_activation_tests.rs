use std::collections::BTreeMap;

use crate::ancestors::MemoryAncestors;
use crate::error::FeatureQueryError;
use crate::feature_activation::{
    state_from_window_counts, BlockSignalingState, Criteria, Feature, FeatureActivationSettings,
    FeatureService, FeatureState,
};
use crate::hash::{sha256, Hash, ZERO_HASH};
use crate::vertex::{make_version, BlockHeaderView, Transaction, Vertex, VertexKind};

fn settings(criteria: Criteria) -> FeatureActivationSettings {
    let mut features = BTreeMap::new();
    features.insert(Feature::NopFeature1, criteria);
    FeatureActivationSettings {
        evaluation_interval: 4,
        max_signal_bits: 4,
        default_threshold: 3,
        features,
    }
}

fn criteria(timeout_height: u64, lock_in_on_timeout: bool) -> Criteria {
    Criteria {
        bit: 0,
        start_height: 0,
        timeout_height,
        threshold: None,
        minimum_activation_height: 0,
        lock_in_on_timeout,
        version: "0.1.0".to_string(),
    }
}

fn block_hash(height: u64) -> Hash {
    let mut b = b"synthetic-block".to_vec();
    b.extend_from_slice(&height.to_le_bytes());
    sha256(&b)
}

/// Chain of `versions.len()` blocks; block `h` carries `versions[h]`.
fn chain(versions: &[u16]) -> (MemoryAncestors, Vec<BlockHeaderView>) {
    let mut store = MemoryAncestors::new();
    let mut views = Vec::with_capacity(versions.len());
    for (h, v) in versions.iter().enumerate() {
        let h = h as u64;
        let view = BlockHeaderView {
            hash: block_hash(h),
            parent: if h == 0 { ZERO_HASH } else { block_hash(h - 1) },
            height: h,
            timestamp: 1_000 + h as u32,
            version: *v,
        };
        store.insert(view.clone());
        views.push(view);
    }
    (store, views)
}

fn sig(bits: u8) -> u16 {
    make_version(VertexKind::RegularBlock, bits)
}

/// Versions for `n` blocks where the blocks at `signaling` heights set bit 0.
fn versions(n: usize, signaling: &[usize]) -> Vec<u16> {
    (0..n)
        .map(|h| if signaling.contains(&h) { sig(0b0001) } else { sig(0) })
        .collect()
}

#[test]
fn threshold_met_locks_in_then_activates_one_interval_later() {
    let s = settings(criteria(400, false));
    let (store, views) = chain(&versions(20, &[4, 5, 6]));
    let svc = FeatureService::new(&s, &store);

    let state = |h: usize| svc.get_state(&views[h], Feature::NopFeature1).expect("state");
    assert_eq!(state(0), FeatureState::Defined);
    assert_eq!(state(3), FeatureState::Defined);
    assert_eq!(state(4), FeatureState::Started);
    assert_eq!(state(7), FeatureState::Started);
    assert_eq!(state(8), FeatureState::LockedIn);
    assert_eq!(state(11), FeatureState::LockedIn);
    assert_eq!(state(12), FeatureState::Active);
    assert_eq!(state(19), FeatureState::Active);

    assert!(!svc.is_feature_active_for_block(&views[11], Feature::NopFeature1).expect("active"));
    assert!(svc.is_feature_active_for_block(&views[12], Feature::NopFeature1).expect("active"));
}

#[test]
fn one_below_threshold_never_locks_in() {
    let s = settings(criteria(16, false));
    let (store, views) = chain(&versions(24, &[4, 5, 8, 9, 12, 13]));
    let svc = FeatureService::new(&s, &store);

    for h in 4..16 {
        assert_eq!(
            svc.get_state(&views[h], Feature::NopFeature1).expect("state"),
            FeatureState::Started,
            "height {h}"
        );
    }
    assert_eq!(
        svc.get_state(&views[16], Feature::NopFeature1).expect("state"),
        FeatureState::Failed
    );
    assert_eq!(
        svc.get_state(&views[23], Feature::NopFeature1).expect("state"),
        FeatureState::Failed
    );
}

#[test]
fn signals_in_the_boundary_block_window_only_count_once_it_closes() {
    let s = settings(criteria(400, false));
    // Signals at 7, 8, 9: split across two windows, neither reaches three.
    let (store, views) = chain(&versions(16, &[7, 8, 9]));
    let svc = FeatureService::new(&s, &store);
    assert_eq!(
        svc.get_state(&views[15], Feature::NopFeature1).expect("state"),
        FeatureState::Started
    );
}

#[test]
fn lock_in_on_timeout_goes_through_must_signal() {
    let s = settings(criteria(16, true));
    let (store, views) = chain(&versions(24, &[]));
    let svc = FeatureService::new(&s, &store);
    let state = |h: usize| svc.get_state(&views[h], Feature::NopFeature1).expect("state");

    assert_eq!(state(8), FeatureState::Started);
    assert_eq!(state(12), FeatureState::MustSignal);
    assert_eq!(state(16), FeatureState::LockedIn);
    assert_eq!(state(20), FeatureState::Active);
}

#[test]
fn minimum_activation_height_holds_locked_in() {
    let mut c = criteria(400, false);
    c.minimum_activation_height = 20;
    let s = settings(c);
    let (store, views) = chain(&versions(24, &[4, 5, 6, 7]));
    let svc = FeatureService::new(&s, &store);
    let state = |h: usize| svc.get_state(&views[h], Feature::NopFeature1).expect("state");

    assert_eq!(state(8), FeatureState::LockedIn);
    assert_eq!(state(16), FeatureState::LockedIn);
    assert_eq!(state(20), FeatureState::Active);
}

#[test]
fn threshold_override_applies_per_feature() {
    let mut c = criteria(400, false);
    c.threshold = Some(4);
    let s = settings(c);
    let (store, views) = chain(&versions(16, &[4, 5, 6]));
    let svc = FeatureService::new(&s, &store);
    assert_eq!(
        svc.get_state(&views[12], Feature::NopFeature1).expect("state"),
        FeatureState::Started
    );
}

#[test]
fn non_block_version_signals_nothing() {
    let s = settings(criteria(400, false));
    let tx_version = make_version(VertexKind::Transaction, 0b1111);
    let mut v = versions(12, &[]);
    v[4] = tx_version;
    v[5] = tx_version;
    v[6] = tx_version;
    let (store, views) = chain(&v);
    let svc = FeatureService::new(&s, &store);
    assert_eq!(
        svc.get_state(&views[8], Feature::NopFeature1).expect("state"),
        FeatureState::Started
    );
}

#[test]
fn bits_above_max_signal_bits_are_masked() {
    let mut c = criteria(400, false);
    c.bit = 0;
    let s = settings(c);
    // 0b1_0000 sets bit 4, outside the four inspected bits.
    let mut v = versions(12, &[]);
    for h in 4..8 {
        v[h] = sig(0b1_0000);
    }
    let (store, views) = chain(&v);
    let svc = FeatureService::new(&s, &store);
    assert_eq!(
        svc.get_state(&views[8], Feature::NopFeature1).expect("state"),
        FeatureState::Started
    );
}

#[test]
fn unregistered_feature_is_a_query_error() {
    let s = settings(criteria(400, false));
    let (store, views) = chain(&versions(8, &[]));
    let svc = FeatureService::new(&s, &store);
    assert_eq!(
        svc.get_state(&views[5], Feature::NanoContracts),
        Err(FeatureQueryError::Unregistered(Feature::NanoContracts))
    );
}

#[test]
fn missing_ancestor_is_reported() {
    let s = settings(criteria(400, false));
    let (_, views) = chain(&versions(12, &[]));
    let mut partial = MemoryAncestors::new();
    for v in &views[8..] {
        partial.insert(v.clone());
    }
    let svc = FeatureService::new(&s, &partial);
    assert_eq!(
        svc.get_state(&views[11], Feature::NopFeature1),
        Err(FeatureQueryError::MissingAncestor { height: 7 })
    );
}

#[test]
fn zero_evaluation_interval_is_a_query_error() {
    let mut s = settings(criteria(400, false));
    s.evaluation_interval = 0;
    let (store, views) = chain(&versions(6, &[]));
    let svc = FeatureService::new(&s, &store);

    assert_eq!(s.boundary_height(5), Err(FeatureQueryError::ZeroEvaluationInterval));
    for view in [&views[0], &views[5]] {
        assert_eq!(
            svc.get_state(view, Feature::NopFeature1),
            Err(FeatureQueryError::ZeroEvaluationInterval)
        );
        assert_eq!(
            svc.is_signaling_mandatory_features(view),
            Err(FeatureQueryError::ZeroEvaluationInterval)
        );
    }
}

#[test]
fn mandatory_signal_walk_rejects_parent_at_wrong_height() {
    let s = settings(criteria(16, true));
    let (store, _) = chain(&versions(16, &[12]));
    let svc = FeatureService::new(&s, &store);
    // Claims height 14 but links to block 12.
    let skewed = BlockHeaderView {
        hash: [0xcd; 32],
        parent: block_hash(12),
        height: 14,
        timestamp: 9_000,
        version: sig(1),
    };
    assert_eq!(
        svc.is_signaling_mandatory_features(&skewed),
        Err(FeatureQueryError::MissingAncestor { height: 13 })
    );
}

#[test]
fn candidate_block_need_not_be_stored() {
    let s = settings(criteria(400, false));
    let (store, _) = chain(&versions(12, &[4, 5, 6]));
    let candidate = BlockHeaderView {
        hash: [0xab; 32],
        parent: block_hash(11),
        height: 12,
        timestamp: 5_000,
        version: sig(0),
    };
    let svc = FeatureService::new(&s, &store);
    assert_eq!(
        svc.get_state(&candidate, Feature::NopFeature1).expect("state"),
        FeatureState::Active
    );
}

#[test]
fn transaction_takes_the_state_of_its_anchor() {
    let s = settings(criteria(400, false));
    let (store, views) = chain(&versions(16, &[4, 5, 6]));
    let svc = FeatureService::new(&s, &store);
    let tx = |anchor: Hash| {
        Vertex::Transaction(Transaction {
            weight: 2.0,
            timestamp: 10_000,
            anchor_block: anchor,
            inputs: vec![],
            outputs: vec![],
            contract_payload: None,
            nonce: 0,
        })
    };

    assert!(!svc.is_feature_active(&tx(views[9].hash), Feature::NopFeature1).expect("query"));
    assert!(svc.is_feature_active(&tx(views[13].hash), Feature::NopFeature1).expect("query"));
    assert!(matches!(
        svc.is_feature_active(&tx([0x55; 32]), Feature::NopFeature1),
        Err(FeatureQueryError::UnknownBlock(_))
    ));
}

#[test]
fn feature_infos_list_every_registered_feature() {
    let mut s = settings(criteria(400, false));
    let mut other = criteria(400, false);
    other.bit = 1;
    other.start_height = 100;
    s.features.insert(Feature::NopFeature2, other);
    let (store, views) = chain(&versions(12, &[4, 5, 6]));
    let svc = FeatureService::new(&s, &store);

    let infos = svc.get_feature_infos(&views[11]).expect("infos");
    assert_eq!(infos.len(), 2);
    assert_eq!(infos[0].feature, Feature::NopFeature1);
    assert_eq!(infos[0].state, FeatureState::LockedIn);
    assert_eq!(infos[1].feature, Feature::NopFeature2);
    assert_eq!(infos[1].state, FeatureState::Defined);
}

#[test]
fn must_signal_interval_rejects_blocks_that_cannot_reach_threshold() {
    let s = settings(criteria(16, true));
    // Interval [12, 15] is MUST_SIGNAL; block 12 signals.
    let (store, views) = chain(&versions(16, &[12]));
    let svc = FeatureService::new(&s, &store);

    let candidate = |height: u64, bits: u8| BlockHeaderView {
        hash: [height as u8; 32],
        parent: block_hash(height - 1),
        height,
        timestamp: 9_000,
        version: sig(bits),
    };

    assert_eq!(
        svc.is_signaling_mandatory_features(&views[12]).expect("signaling"),
        BlockSignalingState::Signaling
    );
    // Count 1 after block 12; block 13 without the bit leaves 2 missing and
    // 2 remaining.
    assert_eq!(
        svc.is_signaling_mandatory_features(&candidate(13, 0)).expect("signaling"),
        BlockSignalingState::Signaling
    );

    // A chain where 12 and 13 both skip the bit.
    let (store2, _) = chain(&versions(14, &[]));
    let svc2 = FeatureService::new(&s, &store2);
    assert_eq!(
        svc2.is_signaling_mandatory_features(&candidate(14, 1)).expect("signaling"),
        BlockSignalingState::MissingSignal(Feature::NopFeature1)
    );
    assert_eq!(
        svc2.is_signaling_mandatory_features(&candidate(13, 0)).expect("signaling"),
        BlockSignalingState::MissingSignal(Feature::NopFeature1)
    );
}

#[test]
fn window_count_state_matches_service() {
    let s = settings(criteria(400, false));
    let c = &s.features[&Feature::NopFeature1];
    assert_eq!(
        state_from_window_counts(c, &s, 9, &[0, 3]).expect("state"),
        FeatureState::LockedIn
    );
    assert_eq!(
        state_from_window_counts(c, &s, 12, &[0, 3, 0]).expect("state"),
        FeatureState::Active
    );
    assert_eq!(
        state_from_window_counts(c, &s, 12, &[0, 2, 2]).expect("state"),
        FeatureState::Started
    );
    assert!(state_from_window_counts(c, &s, 12, &[0]).is_err());
}
