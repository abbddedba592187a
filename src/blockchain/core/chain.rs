use crate::error::{ChainError, Result};
use crate::miner::mine_block;
use crate::transaction::TransactionPayload;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::state::ChainTip;
use super::validation::{validate_contents, validate_successor};

pub type Sha256Hash = [u8; 32];

/// Timestamp of the genesis block (2023-01-01T00:00:00Z, in millis)
pub const GENESIS_TIMESTAMP: u64 = 1672531200000;
pub const GENESIS_MINER: &str = "genesis";
/// Highest accepted difficulty, in leading zero bits
pub const MAX_DIFFICULTY: u32 = 32;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub timestamp: u64,
    pub previous_hash: Sha256Hash,
    pub payload_hash: Sha256Hash,
    pub difficulty: u32,
    pub nonce: u64,
}

impl BlockHeader {
    pub fn hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.height.to_le_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.previous_hash);
        hasher.update(self.payload_hash);
        hasher.update(self.difficulty.to_le_bytes());
        hasher.update(self.nonce.to_le_bytes());
        hasher.finalize().into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    /// `None` only for the genesis block
    pub payload: Option<TransactionPayload>,
    pub miner: String,
}

impl Block {
    pub fn new(
        height: u64,
        previous_hash: Sha256Hash,
        difficulty: u32,
        payload: TransactionPayload,
        miner: impl Into<String>,
    ) -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis() as u64;
        let payload_hash = payload.hash();

        Block {
            header: BlockHeader {
                height,
                timestamp,
                previous_hash,
                payload_hash,
                difficulty,
                nonce: 0,
            },
            payload: Some(payload),
            miner: miner.into(),
        }
    }

    /// Candidate block extending `tip`
    pub fn on_tip(tip: &ChainTip, payload: TransactionPayload, miner: impl Into<String>) -> Self {
        Self::new(tip.next_height(), tip.hash, tip.difficulty, payload, miner)
    }

    pub fn hash(&self) -> Sha256Hash {
        self.header.hash()
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash())
    }

    pub fn payload_hash(&self) -> Sha256Hash {
        self.payload.as_ref().map_or([0u8; 32], TransactionPayload::hash)
    }

    pub fn is_genesis(&self) -> bool {
        self.header.height == 0
    }

    pub fn hash_to_target(difficulty: u32) -> [u8; 32] {
        let mut target = [0xFF; 32];
        let leading_zeros = difficulty / 8;
        let partial_bits = difficulty % 8;

        for item in target.iter_mut().take(leading_zeros as usize) {
            *item = 0;
        }

        if leading_zeros < 32 && partial_bits > 0 {
            target[leading_zeros as usize] = 0xFF >> partial_bits;
        }
        target
    }
}

/// The authoritative, append-only chain shared by every participant.
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    difficulty: u32,
}

impl Blockchain {
    /// Create a chain holding only a freshly mined genesis block.
    pub fn new(difficulty: u32) -> Result<Self> {
        if difficulty == 0 || difficulty > MAX_DIFFICULTY {
            return Err(ChainError::InvalidBlock(format!(
                "Difficulty must be between 1 and {}, got {}",
                MAX_DIFFICULTY, difficulty
            )));
        }

        let genesis = Self::create_genesis_block(difficulty)?;
        info!(hash = %genesis.hash_str(), difficulty, "Created genesis block");

        Ok(Blockchain {
            blocks: vec![genesis],
            difficulty,
        })
    }

    fn create_genesis_block(difficulty: u32) -> Result<Block> {
        let header = BlockHeader {
            height: 0,
            timestamp: GENESIS_TIMESTAMP,
            previous_hash: [0u8; 32],
            payload_hash: [0u8; 32],
            difficulty,
            nonce: 0,
        };

        let genesis_block = Block {
            header,
            payload: None,
            miner: GENESIS_MINER.to_string(),
        };
        mine_block(genesis_block).map_err(|e| ChainError::InvalidBlock(format!("Genesis mining failed: {}", e)))
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, height: u64) -> Option<&Block> {
        self.blocks.get(height as usize)
    }

    pub fn last_block(&self) -> &Block {
        // A chain is never constructed without its genesis block.
        &self.blocks[self.blocks.len() - 1]
    }

    /// Snapshot of the current tip for miners to build on.
    pub fn tip(&self) -> ChainTip {
        ChainTip::of(self.last_block(), self.difficulty)
    }

    /// Append a mined block. Rejects blocks built on anything but the current
    /// tip, blocks below the chain difficulty, and blocks failing proof of work.
    pub fn append(&mut self, block: Block) -> Result<()> {
        if block.is_genesis() {
            return Err(ChainError::InvalidBlock(
                "Genesis block can only be created with the chain.".to_string(),
            ));
        }

        if block.header.difficulty < self.difficulty {
            return Err(ChainError::InvalidBlock(format!(
                "Block difficulty {} is below chain difficulty {}",
                block.header.difficulty, self.difficulty
            )));
        }

        if block.payload.is_none() {
            return Err(ChainError::InvalidBlock("Non-genesis block carries no payload.".to_string()));
        }

        validate_successor(self.last_block(), &block)?;

        debug!(height = block.header.height, hash = %block.hash_str(), miner = %block.miner, "Appending block");
        self.blocks.push(block);
        Ok(())
    }

    /// Re-check every link and proof in the chain.
    pub fn verify_chain(&self) -> Result<()> {
        let genesis = self
            .blocks
            .first()
            .ok_or_else(|| ChainError::InvalidBlock("Chain has no genesis block".to_string()))?;
        validate_contents(genesis)?;

        for pair in self.blocks.windows(2) {
            validate_successor(&pair[0], &pair[1])?;
        }
        Ok(())
    }
}
