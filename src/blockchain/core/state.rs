use super::chain::{Block, Sha256Hash};

/// Snapshot of the chain tip a miner builds on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainTip {
    pub height: u64,
    pub hash: Sha256Hash,
    pub difficulty: u32,
}

impl ChainTip {
    pub fn of(block: &Block, difficulty: u32) -> Self {
        Self {
            height: block.header.height,
            hash: block.hash(),
            difficulty,
        }
    }

    pub fn next_height(&self) -> u64 {
        self.height + 1
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash)
    }
}
