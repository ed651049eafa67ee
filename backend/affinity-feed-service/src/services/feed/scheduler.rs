use super::history::IdQueue;
use super::profile::{FeedState, UserProfile};
use super::{FeedError, Result};
use crate::config::{AffinityConfig, FeedConfig};
use crate::models::Reaction;
use crate::services::affinity::ReactionSummary;
use crate::services::catalog::CatalogProvider;
use crate::services::exploration::{Event, EventPolicy};
use crate::services::recall::{CandidateFilter, CandidateRanker, ScoredCandidate};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one refill
#[derive(Debug, Clone, PartialEq)]
pub struct RefillReport {
    pub event: &'static str,
    pub added: usize,
    /// The event's candidate filter matched nothing and was dropped
    pub filter_relaxed: bool,
    /// Seen history was cleared to make progress
    pub seen_reset: bool,
}

pub struct FeedScheduler {
    catalog: Arc<dyn CatalogProvider>,
    policy: EventPolicy,
    ranker: CandidateRanker,
    vocabulary_size: usize,
}

impl FeedScheduler {
    pub fn new(catalog: Arc<dyn CatalogProvider>, affinity: &AffinityConfig, feed: &FeedConfig) -> Self {
        Self {
            catalog,
            policy: EventPolicy::new(affinity.query_tags),
            ranker: CandidateRanker::new(feed.refill_batch),
            vocabulary_size: affinity.vocabulary_size,
        }
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogProvider> {
        &self.catalog
    }

    /// Draw an event and append fresh candidates to the upcoming queue
    pub fn refill<R: Rng + ?Sized>(&self, profile: &mut UserProfile, rng: &mut R) -> Result<RefillReport> {
        self.refill_excluding(profile, rng, &IdQueue::unbounded())
    }

    /// Serve up to `n` entry ids. Returns fewer when the catalog runs dry.
    pub fn next_n<R: Rng + ?Sized>(
        &self,
        profile: &mut UserProfile,
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<String>> {
        // Ids served by this call, in serving order
        let mut served = IdQueue::unbounded();

        while served.len() < n {
            if profile.upcoming.is_empty() {
                match self.refill_excluding(profile, rng, &served) {
                    Ok(_) => {}
                    Err(FeedError::Exhausted) => {
                        debug!(
                            user_id = %profile.user_id(),
                            requested = n,
                            served = served.len(),
                            "Feed exhausted"
                        );
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }

            let Some(id) = profile.upcoming.pop_front() else {
                break;
            };
            profile.seen.push(id.clone());
            served.push(id);
        }

        Ok(served.iter().cloned().collect())
    }

    /// Apply a reaction to a catalog entry
    pub fn react(
        &self,
        profile: &mut UserProfile,
        entry_id: &str,
        reaction: &Reaction,
    ) -> Result<ReactionSummary> {
        let entry = self
            .catalog
            .get(entry_id)
            .ok_or_else(|| FeedError::CatalogEntryNotFound(entry_id.to_string()))?;
        profile.react(&entry, reaction)
    }

    fn refill_excluding<R: Rng + ?Sized>(
        &self,
        profile: &mut UserProfile,
        rng: &mut R,
        in_flight: &IdQueue,
    ) -> Result<RefillReport> {
        let event = self.policy.choose(rng, &profile.sentinels, profile.positive_history.members());
        self.fill(profile, &event, in_flight)
    }

    fn fill(&self, profile: &mut UserProfile, event: &Event, in_flight: &IdQueue) -> Result<RefillReport> {
        profile.state = FeedState::Refilling;
        let result = self.fill_inner(profile, event, in_flight);
        profile.state = FeedState::Idle;
        result
    }

    fn fill_inner(&self, profile: &mut UserProfile, event: &Event, in_flight: &IdQueue) -> Result<RefillReport> {
        let entries = self.catalog.all_entries();
        if entries.is_empty() {
            return Err(FeedError::Exhausted);
        }

        let query = self.policy.compose(event, &profile.table)?.to_dense(self.vocabulary_size);
        let filter = event.candidate_filter();
        let mut report = RefillReport {
            event: event.as_str(),
            added: 0,
            filter_relaxed: false,
            seen_reset: false,
        };

        let mut candidates = self.ranker.rank(
            &query,
            &entries,
            &[profile.seen.members(), profile.upcoming.members(), in_flight.members()],
            &filter,
        );

        if candidates.is_empty() && filter.is_restrictive() {
            report.filter_relaxed = true;
            candidates = self.ranker.rank(
                &query,
                &entries,
                &[profile.seen.members(), profile.upcoming.members(), in_flight.members()],
                &CandidateFilter::All,
            );
        }

        if candidates.is_empty() {
            warn!(
                user_id = %profile.user_id(),
                seen = profile.seen.len(),
                catalog_size = entries.len(),
                "Catalog fully seen, resetting seen history"
            );
            report.seen_reset = true;
            profile.seen.clear();
            for id in in_flight.iter() {
                profile.seen.push(id.clone());
            }
            candidates = self.ranker.rank(
                &query,
                &entries,
                &[profile.seen.members(), profile.upcoming.members()],
                &CandidateFilter::All,
            );
        }

        if candidates.is_empty() {
            return Err(FeedError::Exhausted);
        }

        report.added = candidates.len();
        for ScoredCandidate { id, .. } in candidates {
            profile.upcoming.push(id);
        }

        info!(
            user_id = %profile.user_id(),
            event = report.event,
            added = report.added,
            filter_relaxed = report.filter_relaxed,
            seen_reset = report.seen_reset,
            "Feed refilled"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Badge, CatalogEntry, Sentinel};
    use crate::services::catalog::InMemoryCatalog;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    const VOCAB: usize = 100;

    fn scheduler(entries: Vec<CatalogEntry>) -> FeedScheduler {
        let catalog: Arc<dyn CatalogProvider> = Arc::new(InMemoryCatalog::from_entries(entries));
        FeedScheduler::new(catalog, &AffinityConfig::default(), &FeedConfig::default())
    }

    fn numbered(count: usize) -> Vec<CatalogEntry> {
        (0..count)
            .map(|i| CatalogEntry::new(format!("np-{:03}", i), [(i % VOCAB) as u32], [], VOCAB))
            .collect()
    }

    fn profile() -> UserProfile {
        UserProfile::fresh("user-1", &AffinityConfig::default(), &FeedConfig::default())
    }

    #[test]
    fn test_refill_adds_batch() {
        let scheduler = scheduler(numbered(40));
        let mut profile = profile();
        let mut rng = StdRng::seed_from_u64(1);

        let report = scheduler.refill(&mut profile, &mut rng).unwrap();

        assert_eq!(report.added, 10);
        assert!(!report.seen_reset);
        assert_eq!(profile.upcoming().len(), 10);
        assert_eq!(profile.state(), FeedState::Idle);
    }

    #[test]
    fn test_basic_fill_ranks_by_similarity() {
        let scheduler = scheduler(vec![
            CatalogEntry::new("np-low", [0], [], VOCAB),
            CatalogEntry::new("np-top", [99], [], VOCAB),
            CatalogEntry::new("np-mixed", [98], [0], VOCAB),
        ]);
        let mut profile = profile();

        scheduler.fill(&mut profile, &Event::Basic, &IdQueue::unbounded()).unwrap();

        let queued: Vec<&str> = profile.upcoming().iter().map(String::as_str).collect();
        assert_eq!(queued, vec!["np-top", "np-mixed", "np-low"]);
    }

    #[test]
    fn test_next_n_never_duplicates() {
        let scheduler = scheduler(numbered(25));
        let mut profile = profile();
        let mut rng = StdRng::seed_from_u64(2);

        let served = scheduler.next_n(&mut profile, 30, &mut rng).unwrap();

        assert_eq!(served.len(), 25);
        let unique: HashSet<&String> = served.iter().collect();
        assert_eq!(unique.len(), served.len());
    }

    #[test]
    fn test_seen_history_evicts_oldest() {
        let scheduler = scheduler(numbered(80));
        let mut profile = profile();
        let mut rng = StdRng::seed_from_u64(3);

        let served = scheduler.next_n(&mut profile, 51, &mut rng).unwrap();

        assert_eq!(served.len(), 51);
        assert_eq!(profile.seen().len(), 50);
        assert!(!profile.seen().contains(&served[0]));
        assert!(served[1..].iter().all(|id| profile.seen().contains(id)));
    }

    #[test]
    fn test_fully_seen_catalog_resets_history() {
        let scheduler = scheduler(vec![
            CatalogEntry::new("np-a", [99], [], VOCAB),
            CatalogEntry::new("np-b", [98], [], VOCAB),
            CatalogEntry::new("np-c", [1], [], VOCAB),
        ]);
        let mut profile = profile();
        for id in ["np-a", "np-b", "np-c"] {
            profile.seen.push(id.to_string());
        }

        let report = scheduler.fill(&mut profile, &Event::Basic, &IdQueue::unbounded()).unwrap();

        assert!(report.seen_reset);
        assert_eq!(report.added, 3);
        assert!(profile.seen().is_empty());
        let queued: Vec<&str> = profile.upcoming().iter().map(String::as_str).collect();
        assert_eq!(queued, vec!["np-a", "np-b", "np-c"]);
    }

    #[test]
    fn test_repeated_pages_tour_small_catalog() {
        let scheduler = scheduler(numbered(3));
        let mut profile = profile();
        let mut rng = StdRng::seed_from_u64(4);

        let first = scheduler.next_n(&mut profile, 3, &mut rng).unwrap();
        let second = scheduler.next_n(&mut profile, 3, &mut rng).unwrap();

        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 3);
        let mut sorted = second.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["np-000", "np-001", "np-002"]);
    }

    #[test]
    fn test_empty_catalog() {
        let scheduler = scheduler(Vec::new());
        let mut profile = profile();
        let mut rng = StdRng::seed_from_u64(5);

        assert!(matches!(
            scheduler.refill(&mut profile, &mut rng),
            Err(FeedError::Exhausted)
        ));
        assert!(scheduler.next_n(&mut profile, 3, &mut rng).unwrap().is_empty());
        assert_eq!(profile.state(), FeedState::Idle);
    }

    #[test]
    fn test_gem_event_prefers_gem_entries() {
        let mut entries = numbered(20);
        entries.push(CatalogEntry::new("np-gem", [5], [], VOCAB).with_badges([Badge::Gem]));
        let scheduler = scheduler(entries);
        let mut profile = profile();
        profile.enable_sentinel(Sentinel::Gem);

        let report = scheduler.fill(&mut profile, &Event::Gem, &IdQueue::unbounded()).unwrap();

        assert!(!report.filter_relaxed);
        assert_eq!(report.added, 1);
        assert!(profile.upcoming().contains("np-gem"));
    }

    #[test]
    fn test_unmatched_filter_is_relaxed() {
        let scheduler = scheduler(numbered(20));
        let mut profile = profile();

        let report = scheduler.fill(&mut profile, &Event::Trending, &IdQueue::unbounded()).unwrap();

        assert!(report.filter_relaxed);
        assert_eq!(report.added, 10);
    }

    #[test]
    fn test_repeat_event_skips_seen_history() {
        let scheduler = scheduler(numbered(20));
        let mut profile = profile();
        profile.seen.push("np-001".to_string());
        let history: HashSet<String> = ["np-001".to_string(), "np-002".to_string()].into();

        let report = scheduler
            .fill(&mut profile, &Event::Repeat { history }, &IdQueue::unbounded())
            .unwrap();

        assert_eq!(report.added, 1);
        assert!(profile.upcoming().contains("np-002"));
        assert!(!profile.upcoming().contains("np-001"));
    }

    #[test]
    fn test_react_looks_up_catalog() {
        let scheduler = scheduler(vec![CatalogEntry::new("np-a", [7], [8], VOCAB)]);
        let mut profile = profile();

        let summary = scheduler.react(&mut profile, "np-a", &Reaction::Like).unwrap();
        assert_eq!(summary.updated, 2);
        assert!(profile.table().get(7).unwrap() > 0.5);

        assert!(matches!(
            scheduler.react(&mut profile, "np-missing", &Reaction::Like),
            Err(FeedError::CatalogEntryNotFound(id)) if id == "np-missing"
        ));
    }

    #[test]
    fn test_seen_reset_keeps_serving_order() {
        let scheduler = scheduler(numbered(4));
        let mut profile = profile();
        for id in ["np-000", "np-001", "np-002", "np-003"] {
            profile.seen.push(id.to_string());
        }
        let mut in_flight = IdQueue::unbounded();
        for id in ["np-003", "np-001", "np-000"] {
            in_flight.push(id.to_string());
        }

        let report = scheduler.fill(&mut profile, &Event::Basic, &in_flight).unwrap();

        assert!(report.seen_reset);
        let seen: Vec<&str> = profile.seen().iter().map(String::as_str).collect();
        assert_eq!(seen, vec!["np-003", "np-001", "np-000"]);
        let queued: Vec<&str> = profile.upcoming().iter().map(String::as_str).collect();
        assert_eq!(queued, vec!["np-002"]);
    }

    #[test]
    fn test_next_page_avoids_recent_history() {
        let scheduler = scheduler(numbered(80));
        let mut profile = profile();
        let mut rng = StdRng::seed_from_u64(6);

        let first = scheduler.next_n(&mut profile, 50, &mut rng).unwrap();
        let second = scheduler.next_n(&mut profile, 10, &mut rng).unwrap();

        assert_eq!(first.len(), 50);
        assert_eq!(second.len(), 10);
        assert!(second.iter().all(|id| !first.contains(id)));
        assert_eq!(profile.seen().len(), 50);
        assert!(!profile.seen().contains(&first[9]));
        assert!(profile.seen().contains(&first[10]));
    }
}
