use crate::error::{ChainError, Result};

use super::chain::Block;

/// Check that `block` is a well-formed successor of `parent`: linkage first,
/// then height, payload commitment and proof of work.
pub fn validate_successor(parent: &Block, block: &Block) -> Result<()> {
    let parent_hash = parent.hash();
    if block.header.previous_hash != parent_hash {
        return Err(ChainError::StaleTip {
            expected: hex::encode(parent_hash),
            found: hex::encode(block.header.previous_hash),
        });
    }

    if block.header.height != parent.header.height + 1 {
        return Err(ChainError::InvalidHeight {
            expected: parent.header.height + 1,
            found: block.header.height,
        });
    }

    validate_contents(block)
}

/// Checks that need no parent: payload commitment and proof of work.
pub fn validate_contents(block: &Block) -> Result<()> {
    if let Some(payload) = &block.payload {
        payload.validate_size()?;
    }

    if block.payload_hash() != block.header.payload_hash {
        return Err(ChainError::PayloadMismatch);
    }

    if !verify_pow(block) {
        return Err(ChainError::InvalidProofOfWork);
    }

    Ok(())
}

pub fn verify_pow(block: &Block) -> bool {
    let target = Block::hash_to_target(block.header.difficulty);
    block.hash() <= target
}
