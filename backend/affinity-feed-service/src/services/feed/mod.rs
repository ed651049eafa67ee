// ============================================
// Feed Scheduler
// ============================================
//
// Per-profile prefetch of the next entries to show:
// 1. Serve ids from the upcoming queue, recording each into seen
// 2. Refill on an empty queue: draw event -> compose query -> rank catalog
// 3. When nothing unseen remains, reset seen and retry
//
// Operations on one profile must be serialized by the caller
// (see services::session).

pub mod history;
pub mod profile;
pub mod scheduler;

pub use history::IdQueue;
pub use profile::{FeedState, UserProfile};
pub use scheduler::{FeedScheduler, RefillReport};

use crate::models::InvalidReaction;
use crate::services::affinity::AffinityError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Affinity(#[from] AffinityError),

    #[error("Catalog entry not found: {0}")]
    CatalogEntryNotFound(String),

    #[error(transparent)]
    InvalidReaction(#[from] InvalidReaction),

    #[error("No further candidates")]
    Exhausted,
}

pub type Result<T> = std::result::Result<T, FeedError>;
