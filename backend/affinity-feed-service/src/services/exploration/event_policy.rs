use crate::models::{Badge, DenseVector, Sentinel, TagId};
use crate::services::affinity::{AffinityTable, Result};
use crate::services::recall::CandidateFilter;
use crate::utils::sparse_to_dense;
use rand::Rng;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Size of the uniform draw space
pub const DRAW_SPACE: u32 = 99;

/// Rank pairs swapped by the disrupt event
const DISRUPT_PAIRS: usize = 3;

/// Exploration event for one refill
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Top tags unchanged
    Basic,
    /// Swap the lowest and highest ranked tags on a clone
    Disrupt,
    /// Bring the oldest zeroed tag back to the top on a clone
    Return,
    /// Restrict candidates to gem entries
    Gem,
    /// Restrict candidates to trending entries
    Trending,
    /// Restrict candidates to entries the user reacted to positively
    Repeat { history: HashSet<String> },
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Basic => "basic",
            Event::Disrupt => "disrupt",
            Event::Return => "return",
            Event::Gem => "gem",
            Event::Trending => "trending",
            Event::Repeat { .. } => "repeat",
        }
    }

    pub fn candidate_filter(&self) -> CandidateFilter {
        match self {
            Event::Gem => CandidateFilter::Badge(Badge::Gem),
            Event::Trending => CandidateFilter::Badge(Badge::Trending),
            Event::Repeat { history } => CandidateFilter::Only(history.clone()),
            Event::Basic | Event::Disrupt | Event::Return => CandidateFilter::All,
        }
    }
}

/// Transient tag-weight subset used to score the catalog for one refill,
/// highest weight first
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedQuery {
    pub tags: Vec<(TagId, f64)>,
}

impl ComposedQuery {
    pub fn to_dense(&self, vocabulary_size: usize) -> DenseVector {
        sparse_to_dense(&self.tags, vocabulary_size)
    }
}

#[derive(Debug, Clone)]
pub struct EventPolicy {
    query_tags: usize,
}

impl EventPolicy {
    pub fn new(query_tags: usize) -> Self {
        Self { query_tags }
    }

    /// Draw an event for a profile
    pub fn choose<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        sentinels: &BTreeSet<Sentinel>,
        positive_history: &HashSet<String>,
    ) -> Event {
        let draw = rng.gen_range(0..DRAW_SPACE);
        let event = Self::event_for_draw(draw, sentinels, positive_history);
        debug!(draw = draw, event = event.as_str(), "Exploration event drawn");
        event
    }

    /// Map a draw in `[0, DRAW_SPACE)` to its event. Draws outside the
    /// space fall back to basic.
    pub fn event_for_draw(
        draw: u32,
        sentinels: &BTreeSet<Sentinel>,
        positive_history: &HashSet<String>,
    ) -> Event {
        match draw {
            0 => Event::Disrupt,
            1 => Event::Return,
            2..=75 => Event::Basic,
            76..=85 if sentinels.contains(&Sentinel::Gem) => Event::Gem,
            86..=95 if sentinels.contains(&Sentinel::Trending) => Event::Trending,
            96..=98 if sentinels.contains(&Sentinel::Repeat) && !positive_history.is_empty() => {
                Event::Repeat {
                    history: positive_history.clone(),
                }
            }
            _ => Event::Basic,
        }
    }

    /// Build the composed query for `event`. The profile's table is never
    /// mutated; perturbing events work on a clone.
    pub fn compose(&self, event: &Event, table: &AffinityTable) -> Result<ComposedQuery> {
        let k = self.query_tags.min(table.len());
        let tags = match event {
            Event::Disrupt => {
                let mut scratch = table.clone();
                let pairs = DISRUPT_PAIRS.min(scratch.active_len() / 2);
                for i in 0..pairs as isize {
                    let low = scratch.rank_from_end(i)?;
                    let high = scratch.rank_from_end(-i - 1)?;
                    scratch.swap(low, high)?;
                }
                scratch.top_k(k)
            }
            Event::Return => {
                let mut scratch = table.clone();
                if let Some(tag) = scratch.resurface_oldest_zero()? {
                    debug!(tag = tag, "Zeroed tag resurfaced for return event");
                }
                scratch.top_k(k)
            }
            Event::Basic | Event::Gem | Event::Trending | Event::Repeat { .. } => table.top_k(k),
        };

        Ok(ComposedQuery { tags })
    }
}

impl Default for EventPolicy {
    fn default() -> Self {
        Self::new(20)
    }
}
