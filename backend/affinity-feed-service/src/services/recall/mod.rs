use crate::models::{Badge, CatalogEntry, DenseVector};
use crate::utils::cosine_similarity;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Restriction applied to the catalog scan for one refill
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateFilter {
    All,
    /// Only entries carrying the badge
    Badge(Badge),
    /// Only the listed entry ids
    Only(HashSet<String>),
}

impl CandidateFilter {
    pub fn admits(&self, entry: &CatalogEntry) -> bool {
        match self {
            CandidateFilter::All => true,
            CandidateFilter::Badge(badge) => entry.has_badge(*badge),
            CandidateFilter::Only(ids) => ids.contains(&entry.id),
        }
    }

    pub fn is_restrictive(&self) -> bool {
        !matches!(self, CandidateFilter::All)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateFilter::All => "all",
            CandidateFilter::Badge(Badge::Gem) => "gem",
            CandidateFilter::Badge(Badge::Trending) => "trending",
            CandidateFilter::Only(_) => "only",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub id: String,
    pub score: f32,
}

/// Cosine-similarity ranking over a catalog snapshot
#[derive(Debug, Clone)]
pub struct CandidateRanker {
    limit: usize,
}

impl CandidateRanker {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Top `limit` entries by similarity to `query`, descending, ties by
    /// id ascending. Entries in any `excluded` set or rejected by `filter`
    /// are skipped.
    pub fn rank(
        &self,
        query: &DenseVector,
        entries: &[Arc<CatalogEntry>],
        excluded: &[&HashSet<String>],
        filter: &CandidateFilter,
    ) -> Vec<ScoredCandidate> {
        let mut scored: Vec<ScoredCandidate> = entries
            .iter()
            .filter(|entry| !excluded.iter().any(|set| set.contains(&entry.id)))
            .filter(|entry| filter.admits(entry))
            .map(|entry| ScoredCandidate {
                id: entry.id.clone(),
                score: cosine_similarity(query, entry.vector()),
            })
            .collect();

        scored.sort_by(Self::compare);
        scored.truncate(self.limit);

        debug!(
            catalog_size = entries.len(),
            filter = filter.as_str(),
            returned = scored.len(),
            "Candidates ranked"
        );

        scored
    }

    fn compare(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
        b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id))
    }
}

impl Default for CandidateRanker {
    fn default() -> Self {
        Self::new(10)
    }
}
