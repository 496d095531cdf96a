#![no_main]

use std::collections::BTreeMap;

use libfuzzer_sys::fuzz_target;
use vertex_consensus::feature_activation::state_from_window_counts;
use vertex_consensus::{Criteria, Feature, FeatureActivationSettings, FeatureState};

// Window counts drive the state machine; once ACTIVE or FAILED, no later
// window can change it.
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let criteria = Criteria {
        bit: 0,
        start_height: (data[0] as u64 % 8) * 4,
        timeout_height: (data[0] as u64 % 8) * 4 + 8 + (data[1] as u64 % 8) * 4,
        threshold: None,
        minimum_activation_height: 0,
        lock_in_on_timeout: data[1] & 0x80 != 0,
        version: String::new(),
    };
    let mut features = BTreeMap::new();
    features.insert(Feature::NopFeature1, criteria.clone());
    let settings = FeatureActivationSettings {
        evaluation_interval: 4,
        max_signal_bits: 4,
        default_threshold: 3,
        features,
    };
    let counts: Vec<u32> = data[2..].iter().map(|b| (*b % 5) as u32).collect();

    let mut terminal: Option<FeatureState> = None;
    for i in 0..=counts.len() {
        let height = i as u64 * 4;
        let s = state_from_window_counts(&criteria, &settings, height, &counts).expect("enough counts");
        if let Some(t) = terminal {
            assert_eq!(s, t, "terminal state changed at height {height}");
        }
        if matches!(s, FeatureState::Active | FeatureState::Failed) {
            terminal = Some(s);
        }
    }
});
