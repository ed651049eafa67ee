// ============================================
// Affinity Module
// ============================================
//
// Per-user tag affinity:
// 1. AffinityTable - ranked weight store with bounded zero-weight FIFO
// 2. ReactionProcessor - reinforcement/decay rules for user reactions
//
// Weights live on a [0, 1] scale. Growth rules approach 1 asymptotically,
// decay rules snap to 0 below DECAY_FLOOR, which feeds the zero FIFO.

pub mod reaction;
pub mod table;

pub use reaction::{ReactionProcessor, ReactionRule, ReactionSummary, WeightUpdate, DECAY_FLOOR};
pub use table::AffinityTable;

use crate::models::TagId;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum AffinityError {
    #[error("Tag not found: {0}")]
    TagNotFound(TagId),

    #[error("Rank index {index} out of range for {len} ranked tags")]
    RankOutOfRange { index: isize, len: usize },

    #[error("Invalid weight {weight} for tag {tag}")]
    InvalidWeight { tag: TagId, weight: f64 },
}

pub type Result<T> = std::result::Result<T, AffinityError>;
