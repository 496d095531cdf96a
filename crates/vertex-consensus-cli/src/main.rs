use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vertex_consensus::mining::{mine_block, mine_merge_mined_block, mine_transaction};
use vertex_consensus::weight::weight_to_target;
use vertex_consensus::{
    verify, weight_to_work, AuxiliaryProofOfWork, ConsensusParameters, FeatureService,
    MemoryAncestors, Vertex,
};

#[derive(Deserialize)]
struct Request {
    op: String,

    #[serde(default)]
    network: String,

    #[serde(default)]
    params_json: Option<serde_json::Value>,

    #[serde(default)]
    vertex_hex: String,

    #[serde(default)]
    ancestors_hex: Vec<String>,

    #[serde(default)]
    aux_pow_hex: String,

    #[serde(default)]
    weight: f64,

    #[serde(default)]
    nonce_start: u64,

    #[serde(default)]
    nonce_end: u64,

    #[serde(default)]
    chunk_size: u64,
}

#[derive(Serialize)]
struct FeatureStateJson {
    feature: String,
    state: String,
    bit: u8,
}

#[derive(Default, Serialize)]
struct Response {
    ok: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    err: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    vertex_hash: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    mining_base_hash: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    merkle_root: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    committed_hash: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    path_len: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    features: Option<Vec<FeatureStateJson>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    work: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    nonce: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    mined_hex: Option<String>,
}

fn fail(err: impl Into<String>) -> Response {
    Response {
        ok: false,
        err: Some(err.into()),
        ..Default::default()
    }
}

fn load_params(req: &Request) -> Result<ConsensusParameters, Response> {
    if let Some(v) = &req.params_json {
        return ConsensusParameters::from_json_str(&v.to_string()).map_err(|e| fail(format!("bad params: {e}")));
    }
    let name = if req.network.is_empty() { "unittests" } else { req.network.as_str() };
    ConsensusParameters::by_network_name(name).map_err(|e| fail(format!("bad params: {e}")))
}

fn decode_vertex(h: &str) -> Result<Vertex, Response> {
    let b = hex::decode(h).map_err(|_| fail("bad hex"))?;
    Vertex::parse(&b).map_err(|e| Response {
        ok: false,
        err: Some("VERTEX_ERR_PARSE".to_string()),
        detail: Some(e.to_string()),
        ..Default::default()
    })
}

fn load_ancestors(req: &Request) -> Result<MemoryAncestors, Response> {
    let mut store = MemoryAncestors::new();
    for h in &req.ancestors_hex {
        let v = decode_vertex(h)?;
        store
            .insert_vertex(&v)
            .map_err(|e| fail(format!("bad ancestor: {e}")))?;
    }
    Ok(store)
}

fn op_verify(req: &Request) -> Result<Response, Response> {
    let params = load_params(req)?;
    let store = load_ancestors(req)?;
    let v = decode_vertex(&req.vertex_hex)?;
    match verify(&v, &store, &params) {
        Ok(()) => Ok(Response {
            ok: true,
            vertex_hash: v.hash().ok().map(hex::encode),
            ..Default::default()
        }),
        Err(e) => Ok(Response {
            ok: false,
            err: Some(e.code().as_str().to_string()),
            detail: Some(e.to_string()),
            ..Default::default()
        }),
    }
}

fn op_vertex_hash(req: &Request) -> Result<Response, Response> {
    let v = decode_vertex(&req.vertex_hex)?;
    let hash = v.hash().map_err(|e| fail(e.to_string()))?;
    let base = match &v {
        Vertex::Block(b) => Some(b.mining_base_hash()),
        Vertex::MergeMinedBlock(b) => Some(b.mining_base_hash()),
        Vertex::Transaction(_) => None,
    };
    let mining_base_hash = base.transpose().map_err(|e| fail(e.to_string()))?;
    Ok(Response {
        ok: true,
        vertex_hash: Some(hex::encode(hash)),
        mining_base_hash: mining_base_hash.map(hex::encode),
        ..Default::default()
    })
}

fn op_parse_aux_pow(req: &Request) -> Result<Response, Response> {
    let b = hex::decode(&req.aux_pow_hex).map_err(|_| fail("bad hex"))?;
    let aux = AuxiliaryProofOfWork::parse_bytes(&b).map_err(|e| Response {
        ok: false,
        err: Some("VERTEX_ERR_PARSE".to_string()),
        detail: Some(e.to_string()),
        ..Default::default()
    })?;
    Ok(Response {
        ok: true,
        vertex_hash: Some(hex::encode(aux.header.hash())),
        merkle_root: Some(hex::encode(aux.merkle_root())),
        committed_hash: aux.committed_base_hash().map(hex::encode),
        path_len: Some(aux.merkle_path.len()),
        ..Default::default()
    })
}

fn op_feature_states(req: &Request) -> Result<Response, Response> {
    let params = load_params(req)?;
    let store = load_ancestors(req)?;
    let v = decode_vertex(&req.vertex_hex)?;
    let view = match v.block_view() {
        Ok(Some(view)) => view,
        Ok(None) => return Err(fail("vertex is not a block")),
        Err(e) => return Err(fail(e.to_string())),
    };
    let svc = FeatureService::new(&params.feature_activation, &store);
    let infos = svc.get_feature_infos(&view).map_err(|e| Response {
        ok: false,
        err: Some("FEATURE_ERR_QUERY".to_string()),
        detail: Some(e.to_string()),
        ..Default::default()
    })?;
    Ok(Response {
        ok: true,
        features: Some(
            infos
                .into_iter()
                .map(|i| FeatureStateJson {
                    feature: i.feature.as_str().to_string(),
                    state: i.state.as_str().to_string(),
                    bit: i.criteria.bit,
                })
                .collect(),
        ),
        ..Default::default()
    })
}

fn op_weight_to_work(req: &Request) -> Result<Response, Response> {
    if !req.weight.is_finite() || req.weight < 0.0 {
        return Err(fail("bad weight"));
    }
    Ok(Response {
        ok: true,
        work: Some(weight_to_work(req.weight).to_str_radix(10)),
        target: Some(weight_to_target(req.weight).to_str_radix(16)),
        ..Default::default()
    })
}

/// Resolves the requested nonce range for `v`. Transactions and merge-mined
/// headers carry a 32-bit nonce, so their range must fit in `u32`.
fn nonce_range(v: &Vertex, start: u64, end: u64) -> Result<(u64, u64), Response> {
    let end = if end == 0 { u64::from(u32::MAX) } else { end };
    let wide = matches!(v, Vertex::Block(_));
    if !wide && (start > u64::from(u32::MAX) || end > u64::from(u32::MAX)) {
        return Err(fail("nonce range exceeds 32 bits for this vertex kind"));
    }
    if start >= end {
        return Err(fail("empty nonce range"));
    }
    Ok((start, end))
}

/// Scans `[nonce_start, nonce_end)` in chunks, logging progress between
/// chunks. The mined vertex is returned re-encoded.
fn op_mine(req: &Request) -> Result<Response, Response> {
    let mut v = decode_vertex(&req.vertex_hex)?;
    let (mut start, end) = nonce_range(&v, req.nonce_start, req.nonce_end)?;
    let chunk = if req.chunk_size == 0 { 1 << 20 } else { req.chunk_size };

    let mut found = None;
    while start < end && found.is_none() {
        let stop = start.saturating_add(chunk).min(end);
        found = match &mut v {
            Vertex::Block(b) => mine_block(b, start as u128, stop as u128)
                .map_err(|e| fail(e.to_string()))?
                .map(|n| {
                    b.nonce = n;
                    n.to_string()
                }),
            Vertex::Transaction(tx) => mine_transaction(tx, start as u32, stop as u32)
                .map_err(|e| fail(e.to_string()))?
                .map(|n| {
                    tx.nonce = n;
                    n.to_string()
                }),
            Vertex::MergeMinedBlock(b) => {
                mine_merge_mined_block(b, start as u32, stop as u32).map(|n| n.to_string())
            }
        };
        info!(start, stop, found = found.is_some(), "mined nonce range");
        start = stop;
    }

    let Some(nonce) = found else {
        warn!(end, "nonce range exhausted");
        return Err(fail("nonce range exhausted"));
    };
    let bytes = v.to_bytes().map_err(|e| fail(e.to_string()))?;
    Ok(Response {
        ok: true,
        nonce: Some(nonce),
        vertex_hash: v.hash().ok().map(hex::encode),
        mined_hex: Some(hex::encode(bytes)),
        ..Default::default()
    })
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let req: Request = match serde_json::from_reader(std::io::stdin()) {
        Ok(v) => v,
        Err(e) => {
            let _ = serde_json::to_writer(std::io::stdout(), &fail(format!("bad request: {e}")));
            return;
        }
    };

    let res = match req.op.as_str() {
        "verify" => op_verify(&req),
        "vertex_hash" => op_vertex_hash(&req),
        "parse_aux_pow" => op_parse_aux_pow(&req),
        "feature_states" => op_feature_states(&req),
        "weight_to_work" => op_weight_to_work(&req),
        "mine" => op_mine(&req),
        _ => Err(fail("unknown op")),
    };
    let resp = res.unwrap_or_else(|e| e);
    let _ = serde_json::to_writer(std::io::stdout(), &resp);
}

#[cfg(test)]
mod tests {
    use super::*;
    use vertex_consensus::Transaction;

    fn tx() -> Vertex {
        Vertex::Transaction(Transaction {
            weight: 1.0,
            timestamp: 1,
            anchor_block: [0u8; 32],
            inputs: vec![],
            outputs: vec![],
            contract_payload: None,
            nonce: 0,
        })
    }

    #[test]
    fn narrow_nonce_range_must_fit_u32() {
        let v = tx();
        let wrapped = nonce_range(&v, u64::from(u32::MAX) + 5, u64::from(u32::MAX) + 10);
        assert!(wrapped.is_err());
        assert!(nonce_range(&v, 0, u64::from(u32::MAX) + 1).is_err());
        assert!(matches!(nonce_range(&v, 7, 0), Ok((7, end)) if end == u64::from(u32::MAX)));
        assert!(nonce_range(&v, 10, 10).is_err());
    }

    #[test]
    fn block_nonce_range_may_exceed_u32() {
        let params = ConsensusParameters::unittests();
        let v = Vertex::Block(params.genesis_block());
        let start = u64::from(u32::MAX) + 5;
        assert!(matches!(nonce_range(&v, start, start + 100), Ok((s, e)) if s == start && e == start + 100));
    }
}
