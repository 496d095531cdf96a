use std::collections::HashMap;

use crate::error::MalformedVertex;
use crate::hash::Hash;
use crate::vertex::{BlockHeaderView, Vertex};

/// Read-only view of the block store.
///
/// Implementations must be deterministic for the duration of a verification
/// call. Any caching or I/O policy belongs to the implementor.
pub trait AncestorAccessor {
    fn get_block(&self, hash: &Hash) -> Option<BlockHeaderView>;

    /// Block at `height` on the chain ending at `from` (inclusive).
    ///
    /// The default walks parent links one block at a time; stores with a
    /// height index should override it.
    fn get_ancestor_at_height(&self, from: &Hash, height: u64) -> Option<BlockHeaderView> {
        let mut cur = self.get_block(from)?;
        if height > cur.height {
            return None;
        }
        while cur.height > height {
            cur = self.get_block(&cur.parent)?;
        }
        Some(cur)
    }
}

impl<T: AncestorAccessor + ?Sized> AncestorAccessor for &T {
    fn get_block(&self, hash: &Hash) -> Option<BlockHeaderView> {
        (**self).get_block(hash)
    }

    fn get_ancestor_at_height(&self, from: &Hash, height: u64) -> Option<BlockHeaderView> {
        (**self).get_ancestor_at_height(from, height)
    }
}

/// HashMap-backed accessor for tests, tooling and the reference miner.
#[derive(Clone, Debug, Default)]
pub struct MemoryAncestors {
    blocks: HashMap<Hash, BlockHeaderView>,
}

impl MemoryAncestors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, view: BlockHeaderView) {
        self.blocks.insert(view.hash, view);
    }

    /// Stores a block vertex. Transactions are not ancestors and are ignored.
    pub fn insert_vertex(&mut self, v: &Vertex) -> Result<Option<Hash>, MalformedVertex> {
        match v.block_view()? {
            Some(view) => {
                let h = view.hash;
                self.insert(view);
                Ok(Some(h))
            }
            None => Ok(None),
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl AncestorAccessor for MemoryAncestors {
    fn get_block(&self, hash: &Hash) -> Option<BlockHeaderView> {
        self.blocks.get(hash).cloned()
    }
}
