use super::history::IdQueue;
use super::Result;
use crate::config::{AffinityConfig, FeedConfig};
use crate::models::{CatalogEntry, Reaction, Sentinel, StoredProfile};
use crate::services::affinity::{AffinityTable, ReactionProcessor, ReactionSummary};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Scheduler state of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Idle,
    Refilling,
}

/// In-memory profile for an online user
#[derive(Debug, Clone)]
pub struct UserProfile {
    user_id: String,
    pub(crate) table: AffinityTable,
    pub(crate) sentinels: BTreeSet<Sentinel>,
    pub(crate) seen: IdQueue,
    pub(crate) upcoming: IdQueue,
    pub(crate) positive_history: IdQueue,
    pub(crate) state: FeedState,
}

impl UserProfile {
    pub fn fresh(user_id: impl Into<String>, affinity: &AffinityConfig, feed: &FeedConfig) -> Self {
        Self::with_table(user_id.into(), AffinityTable::fresh(affinity), feed)
    }

    /// Rebuild a profile from its persisted form
    pub fn from_stored(
        user_id: impl Into<String>,
        stored: &StoredProfile,
        affinity: &AffinityConfig,
        feed: &FeedConfig,
    ) -> Result<Self> {
        let user_id = user_id.into();
        if stored.weights.len() != affinity.vocabulary_size {
            warn!(
                user_id = %user_id,
                stored = stored.weights.len(),
                vocabulary = affinity.vocabulary_size,
                "Stored weight vector does not match vocabulary size"
            );
        }

        let table = AffinityTable::from_dense(&stored.weights, affinity)?;
        let mut profile = Self::with_table(user_id, table, feed);
        profile.sentinels = stored
            .sentinels
            .iter()
            .filter_map(|&id| Sentinel::from_legacy_tag_id(id))
            .collect();
        for id in &stored.positive_history {
            profile.positive_history.push(id.clone());
        }
        Ok(profile)
    }

    fn with_table(user_id: String, table: AffinityTable, feed: &FeedConfig) -> Self {
        Self {
            user_id,
            table,
            sentinels: BTreeSet::new(),
            seen: IdQueue::bounded(feed.seen_capacity),
            upcoming: IdQueue::unbounded(),
            positive_history: IdQueue::bounded(feed.positive_history_capacity),
            state: FeedState::Idle,
        }
    }

    /// Persisted form; seen/upcoming queues are session-only
    pub fn to_stored(&self, vocabulary_size: usize) -> StoredProfile {
        StoredProfile {
            weights: self.table.dense_vector(vocabulary_size).to_vec(),
            sentinels: self.sentinels.iter().map(Sentinel::legacy_tag_id).collect(),
            positive_history: self.positive_history.iter().cloned().collect(),
        }
    }

    /// Apply a reaction to the affinity table. Likes and donations are
    /// remembered for the repeat event.
    pub fn react(&mut self, entry: &CatalogEntry, reaction: &Reaction) -> Result<ReactionSummary> {
        let summary = ReactionProcessor::apply(&mut self.table, entry, reaction)?;
        if reaction.is_positive() {
            self.positive_history.push(entry.id.clone());
        }
        if let Reaction::Donate { amount } = reaction {
            debug!(
                user_id = %self.user_id,
                entry_id = %entry.id,
                amount = amount,
                "Donation reaction recorded"
            );
        }
        Ok(summary)
    }

    pub fn enable_sentinel(&mut self, sentinel: Sentinel) {
        self.sentinels.insert(sentinel);
    }

    pub fn disable_sentinel(&mut self, sentinel: Sentinel) {
        self.sentinels.remove(&sentinel);
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn table(&self) -> &AffinityTable {
        &self.table
    }

    pub fn sentinels(&self) -> &BTreeSet<Sentinel> {
        &self.sentinels
    }

    pub fn seen(&self) -> &IdQueue {
        &self.seen
    }

    pub fn upcoming(&self) -> &IdQueue {
        &self.upcoming
    }

    pub fn positive_history(&self) -> &IdQueue {
        &self.positive_history
    }

    pub fn state(&self) -> FeedState {
        self.state
    }
}
