use crate::aux_pow::AuxiliaryProofOfWork;
use crate::constants::{MAX_SIGNAL_BITS, VERSION_KIND_SHIFT};
use crate::error::MalformedVertex;
use crate::hash::{reversed, sha256d, Hash};
use crate::wire_read::Reader;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VertexKind {
    RegularBlock = 0,
    Transaction = 1,
    MergeMinedBlock = 3,
}

impl VertexKind {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(VertexKind::RegularBlock),
            1 => Some(VertexKind::Transaction),
            3 => Some(VertexKind::MergeMinedBlock),
            _ => None,
        }
    }

    pub fn is_block(self) -> bool {
        matches!(self, VertexKind::RegularBlock | VertexKind::MergeMinedBlock)
    }
}

pub fn make_version(kind: VertexKind, signal_bits: u8) -> u16 {
    ((kind as u16) << VERSION_KIND_SHIFT) | signal_bits as u16
}

pub fn version_kind(version: u16) -> Option<VertexKind> {
    VertexKind::from_byte((version >> VERSION_KIND_SHIFT) as u8)
}

/// Signal bits carried by a block version, masked to `max_signal_bits`.
///
/// A version whose kind byte is not a block kind is malformed and signals
/// nothing; it is never rejected here.
pub fn version_signal_bits(version: u16, max_signal_bits: u8) -> u8 {
    match version_kind(version) {
        Some(kind) if kind.is_block() => {
            let bits = max_signal_bits.min(MAX_SIGNAL_BITS);
            let mask = if bits >= 8 { 0xff } else { (1u8 << bits) - 1 };
            (version as u8) & mask
        }
        _ => 0,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOutput {
    pub value: u64,
    pub script: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxInput {
    pub tx_id: Hash,
    pub index: u8,
    pub data: Vec<u8>,
}

/// Block fields covered by the mining base hash: everything except the
/// nonce and the auxiliary proof-of-work.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockBase {
    pub signal_bits: u8,
    pub weight: f64,
    pub timestamp: u32,
    pub height: u64,
    pub parent: Hash,
    pub outputs: Vec<TxOutput>,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub base: BlockBase,
    pub nonce: u128,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MergeMinedBlock {
    pub base: BlockBase,
    pub aux_pow: AuxiliaryProofOfWork,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
    pub weight: f64,
    pub timestamp: u32,
    /// Block this transaction was built on; feature state and reward
    /// maturity are evaluated against it.
    pub anchor_block: Hash,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub contract_payload: Option<Vec<u8>>,
    pub nonce: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Vertex {
    Block(Block),
    MergeMinedBlock(MergeMinedBlock),
    Transaction(Transaction),
}

/// Read-only view of a stored block, as served by the ancestor accessor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockHeaderView {
    pub hash: Hash,
    pub parent: Hash,
    pub height: u64,
    pub timestamp: u32,
    pub version: u16,
}

impl BlockHeaderView {
    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }
}

fn encode_outputs(outputs: &[TxOutput], out: &mut Vec<u8>) {
    out.push(outputs.len() as u8);
    for o in outputs {
        out.extend_from_slice(&o.value.to_be_bytes());
        out.extend_from_slice(&(o.script.len() as u16).to_be_bytes());
        out.extend_from_slice(&o.script);
    }
}

fn parse_outputs(r: &mut Reader<'_>) -> Result<Vec<TxOutput>, MalformedVertex> {
    let n = r.read_u8()? as usize;
    let mut outputs = Vec::with_capacity(n);
    for _ in 0..n {
        let value = r.read_u64_be()?;
        let script_len = r.read_u16_be()? as usize;
        let script = r.read_bytes(script_len)?.to_vec();
        outputs.push(TxOutput { value, script });
    }
    Ok(outputs)
}

fn check_len(n: usize, max: usize, what: &'static str) -> Result<(), MalformedVertex> {
    if n > max {
        return Err(MalformedVertex::FieldRange(what));
    }
    Ok(())
}

impl BlockBase {
    pub fn encode(&self, kind: VertexKind, out: &mut Vec<u8>) -> Result<(), MalformedVertex> {
        check_len(self.outputs.len(), u8::MAX as usize, "too many outputs to encode")?;
        check_len(self.data.len(), u8::MAX as usize, "block data too long to encode")?;
        for o in &self.outputs {
            check_len(o.script.len(), u16::MAX as usize, "output script too long to encode")?;
        }
        out.extend_from_slice(&make_version(kind, self.signal_bits).to_be_bytes());
        out.extend_from_slice(&self.weight.to_be_bytes());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&self.height.to_be_bytes());
        out.extend_from_slice(&self.parent);
        encode_outputs(&self.outputs, out);
        out.push(self.data.len() as u8);
        out.extend_from_slice(&self.data);
        Ok(())
    }

    // Reads everything after the version field.
    fn parse_after_version(r: &mut Reader<'_>, signal_bits: u8) -> Result<Self, MalformedVertex> {
        let weight = r.read_f64_be()?;
        let timestamp = r.read_u32_be()?;
        let height = r.read_u64_be()?;
        let parent = r.read_hash()?;
        let outputs = parse_outputs(r)?;
        let data_len = r.read_u8()? as usize;
        let data = r.read_bytes(data_len)?.to_vec();
        Ok(Self {
            signal_bits,
            weight,
            timestamp,
            height,
            parent,
            outputs,
            data,
        })
    }

    /// sha256d over the serialized base fields (nonce and aux-PoW excluded).
    pub fn mining_base_hash(&self, kind: VertexKind) -> Result<Hash, MalformedVertex> {
        let mut b = Vec::new();
        self.encode(kind, &mut b)?;
        Ok(sha256d(&b))
    }
}

impl Block {
    pub fn to_bytes(&self) -> Result<Vec<u8>, MalformedVertex> {
        let mut b = Vec::new();
        self.base.encode(VertexKind::RegularBlock, &mut b)?;
        b.extend_from_slice(&self.nonce.to_be_bytes());
        Ok(b)
    }

    pub fn mining_base_hash(&self) -> Result<Hash, MalformedVertex> {
        self.base.mining_base_hash(VertexKind::RegularBlock)
    }

    pub fn hash(&self) -> Result<Hash, MalformedVertex> {
        Ok(reversed(sha256d(&self.to_bytes()?)))
    }

    pub fn is_genesis(&self) -> bool {
        self.base.height == 0
    }
}

impl MergeMinedBlock {
    pub fn to_bytes(&self) -> Result<Vec<u8>, MalformedVertex> {
        let mut b = Vec::new();
        self.base.encode(VertexKind::MergeMinedBlock, &mut b)?;
        self.aux_pow.encode(&mut b);
        Ok(b)
    }

    pub fn mining_base_hash(&self) -> Result<Hash, MalformedVertex> {
        self.base.mining_base_hash(VertexKind::MergeMinedBlock)
    }

    /// The proof-of-work of a merge-mined block is the external header's.
    pub fn hash(&self) -> Hash {
        self.aux_pow.header.hash()
    }
}

impl Transaction {
    pub fn to_bytes(&self) -> Result<Vec<u8>, MalformedVertex> {
        check_len(self.inputs.len(), u8::MAX as usize, "too many inputs to encode")?;
        check_len(self.outputs.len(), u8::MAX as usize, "too many outputs to encode")?;

        let mut b = Vec::new();
        b.extend_from_slice(&make_version(VertexKind::Transaction, 0).to_be_bytes());
        b.extend_from_slice(&self.weight.to_be_bytes());
        b.extend_from_slice(&self.timestamp.to_be_bytes());
        b.extend_from_slice(&self.anchor_block);
        b.push(self.inputs.len() as u8);
        for i in &self.inputs {
            check_len(i.data.len(), u16::MAX as usize, "input data too long to encode")?;
            b.extend_from_slice(&i.tx_id);
            b.push(i.index);
            b.extend_from_slice(&(i.data.len() as u16).to_be_bytes());
            b.extend_from_slice(&i.data);
        }
        for o in &self.outputs {
            check_len(o.script.len(), u16::MAX as usize, "output script too long to encode")?;
        }
        encode_outputs(&self.outputs, &mut b);
        match &self.contract_payload {
            None => b.push(0x00),
            Some(p) => {
                check_len(p.len(), u16::MAX as usize, "contract payload too long to encode")?;
                b.push(0x01);
                b.extend_from_slice(&(p.len() as u16).to_be_bytes());
                b.extend_from_slice(p);
            }
        }
        b.extend_from_slice(&self.nonce.to_be_bytes());
        Ok(b)
    }

    fn parse_after_version(r: &mut Reader<'_>) -> Result<Self, MalformedVertex> {
        let weight = r.read_f64_be()?;
        let timestamp = r.read_u32_be()?;
        let anchor_block = r.read_hash()?;

        let in_count = r.read_u8()? as usize;
        let mut inputs = Vec::with_capacity(in_count);
        for _ in 0..in_count {
            let tx_id = r.read_hash()?;
            let index = r.read_u8()?;
            let data_len = r.read_u16_be()? as usize;
            let data = r.read_bytes(data_len)?.to_vec();
            inputs.push(TxInput { tx_id, index, data });
        }

        let outputs = parse_outputs(r)?;

        let contract_payload = match r.read_u8()? {
            0x00 => None,
            0x01 => {
                let n = r.read_u16_be()? as usize;
                Some(r.read_bytes(n)?.to_vec())
            }
            _ => return Err(MalformedVertex::FieldRange("invalid contract payload flag")),
        };

        let nonce = r.read_u32_be()?;
        Ok(Self {
            weight,
            timestamp,
            anchor_block,
            inputs,
            outputs,
            contract_payload,
            nonce,
        })
    }

    pub fn hash(&self) -> Result<Hash, MalformedVertex> {
        Ok(reversed(sha256d(&self.to_bytes()?)))
    }

    pub fn sum_outputs(&self) -> u128 {
        self.outputs.iter().map(|o| o.value as u128).sum()
    }
}

impl Vertex {
    pub fn parse(b: &[u8]) -> Result<Self, MalformedVertex> {
        let mut r = Reader::new(b);
        let version = r.read_u16_be()?;
        let kind_byte = (version >> VERSION_KIND_SHIFT) as u8;
        let kind = VertexKind::from_byte(kind_byte).ok_or(MalformedVertex::UnknownKind(kind_byte))?;
        let signal_bits = version as u8;

        let v = match kind {
            VertexKind::RegularBlock => {
                let base = BlockBase::parse_after_version(&mut r, signal_bits)?;
                let nonce = r.read_u128_be()?;
                Vertex::Block(Block { base, nonce })
            }
            VertexKind::MergeMinedBlock => {
                let base = BlockBase::parse_after_version(&mut r, signal_bits)?;
                let aux_pow = AuxiliaryProofOfWork::parse(&mut r)?;
                Vertex::MergeMinedBlock(MergeMinedBlock { base, aux_pow })
            }
            VertexKind::Transaction => {
                if signal_bits != 0 {
                    return Err(MalformedVertex::FieldRange("transactions carry no signal bits"));
                }
                Vertex::Transaction(Transaction::parse_after_version(&mut r)?)
            }
        };
        r.finish("vertex")?;
        Ok(v)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, MalformedVertex> {
        match self {
            Vertex::Block(b) => b.to_bytes(),
            Vertex::MergeMinedBlock(b) => b.to_bytes(),
            Vertex::Transaction(tx) => tx.to_bytes(),
        }
    }

    pub fn kind(&self) -> VertexKind {
        match self {
            Vertex::Block(_) => VertexKind::RegularBlock,
            Vertex::MergeMinedBlock(_) => VertexKind::MergeMinedBlock,
            Vertex::Transaction(_) => VertexKind::Transaction,
        }
    }

    pub fn hash(&self) -> Result<Hash, MalformedVertex> {
        match self {
            Vertex::Block(b) => b.hash(),
            Vertex::MergeMinedBlock(b) => Ok(b.hash()),
            Vertex::Transaction(tx) => tx.hash(),
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            Vertex::Block(b) => b.base.weight,
            Vertex::MergeMinedBlock(b) => b.base.weight,
            Vertex::Transaction(tx) => tx.weight,
        }
    }

    pub fn block_base(&self) -> Option<&BlockBase> {
        match self {
            Vertex::Block(b) => Some(&b.base),
            Vertex::MergeMinedBlock(b) => Some(&b.base),
            Vertex::Transaction(_) => None,
        }
    }

    /// Header view of a block vertex, as the ancestor accessor would serve it.
    pub fn block_view(&self) -> Result<Option<BlockHeaderView>, MalformedVertex> {
        let Some(base) = self.block_base() else {
            return Ok(None);
        };
        Ok(Some(BlockHeaderView {
            hash: self.hash()?,
            parent: base.parent,
            height: base.height,
            timestamp: base.timestamp,
            version: make_version(self.kind(), base.signal_bits),
        }))
    }
}
