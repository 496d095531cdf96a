use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use vertex_consensus::aux_pow::{MerkleDirection, MerklePathStep};
use vertex_consensus::hash::sha256;
use vertex_consensus::mining::{aux_pow_template, mine_block, mine_merge_mined_block};
use vertex_consensus::{
    verify, Block, BlockBase, ConsensusParameters, Criteria, Feature, FeatureService, MemoryAncestors,
    MergeMinedBlock, TxOutput, Vertex,
};

fn next_base(tip: &Block) -> BlockBase {
    BlockBase {
        signal_bits: 0,
        weight: tip.base.weight,
        timestamp: tip.base.timestamp + 30,
        height: tip.base.height + 1,
        parent: tip.hash().expect("hash"),
        outputs: vec![TxOutput {
            value: 6400,
            script: vec![0x76, 0xa9, 0x14],
        }],
        data: vec![],
    }
}

fn build_chain(params: &ConsensusParameters, len: u64) -> (MemoryAncestors, Block) {
    let mut store = MemoryAncestors::new();
    let mut tip = params.genesis_block();
    store.insert_vertex(&Vertex::Block(tip.clone())).expect("insert");
    for _ in 0..len {
        let mut b = Block {
            base: next_base(&tip),
            nonce: 0,
        };
        b.nonce = mine_block(&b, 0, 1 << 24).expect("encode").expect("nonce");
        store.insert_vertex(&Vertex::Block(b.clone())).expect("insert");
        tip = b;
    }
    (store, tip)
}

fn bench_verify(c: &mut Criterion) {
    let mut params = ConsensusParameters::unittests();
    params.feature_activation.features.insert(
        Feature::NopFeature1,
        Criteria {
            bit: 0,
            start_height: 0,
            timeout_height: 4_000,
            threshold: None,
            minimum_activation_height: 0,
            lock_in_on_timeout: false,
            version: String::new(),
        },
    );
    let (store, tip) = build_chain(&params, 256);

    let mut block = Block {
        base: next_base(&tip),
        nonce: 0,
    };
    block.nonce = mine_block(&block, 0, 1 << 24).expect("encode").expect("nonce");
    let block = Vertex::Block(block);

    let base = next_base(&tip);
    let path = (0..params.old_max_merkle_path_length)
        .map(|i| MerklePathStep {
            direction: MerkleDirection::SiblingOnRight,
            sibling: sha256(&[i as u8]),
        })
        .collect();
    let aux_pow = aux_pow_template(&base, 0x1d00_ffff, path).expect("template");
    let mut mm = MergeMinedBlock { base, aux_pow };
    mine_merge_mined_block(&mut mm, 0, u32::MAX).expect("nonce");
    let mm = Vertex::MergeMinedBlock(mm);

    c.bench_function("verify_block", |b| {
        b.iter(|| verify(black_box(&block), &store, &params))
    });
    c.bench_function("verify_merge_mined_block", |b| {
        b.iter(|| verify(black_box(&mm), &store, &params))
    });

    let view = block.block_view().expect("view").expect("block");
    let features = FeatureService::new(&params.feature_activation, &store);
    c.bench_function("feature_state_256_blocks", |b| {
        b.iter(|| features.get_state(black_box(&view), Feature::NopFeature1))
    });
}

criterion_group!(benches, bench_verify);
criterion_main!(benches);
