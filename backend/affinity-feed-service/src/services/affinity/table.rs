// ============================================
// Affinity Table
// ============================================
//
// Per-user interest weights over the tag vocabulary, scale [0, 1].
//
// Layout:
// - weights:    tag -> weight (every known tag)
// - rank:       ordered (weight, tag) for every tag with non-zero weight
// - zero_tags:  FIFO of tags whose weight is exactly 0, bounded by
//               `zero_capacity`; overflow revives the oldest entry
//
// Mutations are O(log n). Rank lookups walk the ordered set, so
// `rank_from_end(k)` is O(k); fine for vocabulary-sized tables.

use super::{AffinityError, Result};
use crate::config::AffinityConfig;
use crate::models::{DenseVector, TagId};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

/// Rank-index key, ordered by weight then tag id
#[derive(Debug, Clone, Copy)]
struct RankKey {
    weight: f64,
    tag: TagId,
}

impl PartialEq for RankKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RankKey {}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RankKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight
            .total_cmp(&other.weight)
            .then_with(|| self.tag.cmp(&other.tag))
    }
}

#[derive(Debug, Clone)]
pub struct AffinityTable {
    weights: BTreeMap<TagId, f64>,
    rank: BTreeSet<RankKey>,
    zero_tags: VecDeque<TagId>,
    zero_capacity: usize,
    revival_weight: f64,
}

impl AffinityTable {
    fn empty(config: &AffinityConfig) -> Self {
        Self {
            weights: BTreeMap::new(),
            rank: BTreeSet::new(),
            zero_tags: VecDeque::with_capacity(config.zero_capacity + 1),
            zero_capacity: config.zero_capacity,
            revival_weight: config.revival_weight,
        }
    }

    /// Fresh table: every vocabulary tag at the default weight
    pub fn fresh(config: &AffinityConfig) -> Self {
        let mut table = Self::empty(config);
        for tag in 0..config.vocabulary_size as TagId {
            table.weights.insert(tag, config.default_weight);
            table.rank.insert(RankKey {
                weight: config.default_weight,
                tag,
            });
        }
        table
    }

    /// Rebuild a table from a persisted dense vector (index = tag id).
    ///
    /// Zero entries join the zero FIFO in index order; if there are more
    /// than the FIFO holds, the oldest are revived immediately.
    pub fn from_dense(vector: &[f32], config: &AffinityConfig) -> Result<Self> {
        let mut table = Self::empty(config);
        for (index, &value) in vector.iter().enumerate() {
            table.set(index as TagId, f64::from(value))?;
        }
        debug!(
            tags = table.len(),
            zero_tags = table.zero_tags.len(),
            "Affinity table restored from dense vector"
        );
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Number of tags in the rank index (non-zero weight)
    pub fn active_len(&self) -> usize {
        self.rank.len()
    }

    pub fn contains(&self, tag: TagId) -> bool {
        self.weights.contains_key(&tag)
    }

    /// Zero-weight tags, oldest first
    pub fn zero_tags(&self) -> impl Iterator<Item = TagId> + '_ {
        self.zero_tags.iter().copied()
    }

    pub fn get(&self, tag: TagId) -> Result<f64> {
        self.weights
            .get(&tag)
            .copied()
            .ok_or(AffinityError::TagNotFound(tag))
    }

    /// Upsert a weight, keeping the rank index and zero FIFO in sync.
    pub fn set(&mut self, tag: TagId, weight: f64) -> Result<()> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(AffinityError::InvalidWeight { tag, weight });
        }

        if let Some(old) = self.weights.insert(tag, weight) {
            if old == 0.0 {
                if weight != 0.0 {
                    self.zero_tags.retain(|&t| t != tag);
                }
            } else {
                self.rank.remove(&RankKey { weight: old, tag });
            }
            if old == 0.0 && weight == 0.0 {
                // Already tracked as zero; keep its FIFO position
                return Ok(());
            }
        }

        if weight == 0.0 {
            self.zero_tags.push_back(tag);
            self.evict_overflow();
        } else {
            self.rank.insert(RankKey { weight, tag });
        }

        Ok(())
    }

    /// Revive the oldest zero tags until the FIFO fits its capacity.
    fn evict_overflow(&mut self) {
        while self.zero_tags.len() > self.zero_capacity {
            let Some(oldest) = self.zero_tags.pop_front() else {
                break;
            };
            self.weights.insert(oldest, self.revival_weight);
            self.rank.insert(RankKey {
                weight: self.revival_weight,
                tag: oldest,
            });
            debug!(
                tag = oldest,
                revival_weight = self.revival_weight,
                "Zero tag evicted and revived"
            );
        }
    }

    /// Tag at ascending rank `n` for `n >= 0`, or descending rank `|n|`
    /// for `n < 0` (`-1` is the highest weight, `-len` the lowest).
    ///
    /// Walks the rank index from the nearer end: O(|n|).
    pub fn rank_from_end(&self, n: isize) -> Result<TagId> {
        let len = self.rank.len();
        let magnitude = n.unsigned_abs();
        let out_of_range = if n >= 0 { magnitude >= len } else { magnitude > len };
        if out_of_range {
            return Err(AffinityError::RankOutOfRange { index: n, len });
        }

        let key = if n >= 0 {
            self.rank.iter().nth(magnitude)
        } else {
            self.rank.iter().rev().nth(magnitude - 1)
        };

        key.map(|k| k.tag)
            .ok_or(AffinityError::RankOutOfRange { index: n, len })
    }

    /// Exchange two tags' weights.
    pub fn swap(&mut self, a: TagId, b: TagId) -> Result<()> {
        let weight_a = self.get(a)?;
        let weight_b = self.get(b)?;
        if a == b {
            return Ok(());
        }

        // Assign the non-zero weight first so the FIFO never overflows
        // transiently when a zero weight moves between tags.
        if weight_a == 0.0 {
            self.set(a, weight_b)?;
            self.set(b, weight_a)?;
        } else {
            self.set(b, weight_a)?;
            self.set(a, weight_b)?;
        }
        Ok(())
    }

    /// Pop the oldest zero tag and swap it with the highest-ranked tag.
    ///
    /// Returns the resurfaced tag, or `None` when nothing is zeroed or no
    /// tag is ranked.
    pub fn resurface_oldest_zero(&mut self) -> Result<Option<TagId>> {
        if self.zero_tags.is_empty() || self.rank.is_empty() {
            return Ok(None);
        }
        let top = self.rank_from_end(-1)?;
        let Some(zeroed) = self.zero_tags.front().copied() else {
            return Ok(None);
        };
        self.swap(top, zeroed)?;
        Ok(Some(zeroed))
    }

    /// The `k` highest-weight tags, highest first.
    pub fn top_k(&self, k: usize) -> Vec<(TagId, f64)> {
        self.rank
            .iter()
            .rev()
            .take(k)
            .map(|key| (key.tag, key.weight))
            .collect()
    }

    /// Full weight vector over `size` tags; tags beyond `size` are dropped.
    pub fn dense_vector(&self, size: usize) -> DenseVector {
        let mut vector = DenseVector::zeros(size);
        for key in &self.rank {
            if let Some(slot) = vector.get_mut(key.tag as usize) {
                *slot = key.weight as f32;
            }
        }
        for &tag in &self.zero_tags {
            if let Some(slot) = vector.get_mut(tag as usize) {
                *slot = 0.0;
            }
        }
        vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AffinityConfig {
        AffinityConfig::default()
    }

    fn assert_consistent(table: &AffinityTable) {
        for (&tag, &weight) in &table.weights {
            let ranked = table.rank.contains(&RankKey { weight, tag });
            let zeroed = table.zero_tags.iter().filter(|&&t| t == tag).count();
            if weight == 0.0 {
                assert!(!ranked, "zero tag {} still ranked", tag);
                assert_eq!(zeroed, 1, "zero tag {} tracked {} times", tag, zeroed);
            } else {
                assert!(ranked, "tag {} missing from rank index", tag);
                assert_eq!(zeroed, 0, "live tag {} in zero FIFO", tag);
            }
        }
        assert_eq!(table.rank.len() + table.zero_tags.len(), table.weights.len());
        assert!(table.zero_tags.len() <= table.zero_capacity);
    }

    #[test]
    fn test_fresh_table() {
        let table = AffinityTable::fresh(&config());

        assert_eq!(table.len(), 100);
        assert_eq!(table.active_len(), 100);
        assert_eq!(table.get(42).unwrap(), 0.5);
        assert!(matches!(table.get(100), Err(AffinityError::TagNotFound(100))));
        assert_consistent(&table);
    }

    #[test]
    fn test_set_zero_moves_tag_to_fifo() {
        let mut table = AffinityTable::fresh(&config());
        table.set(7, 0.0).unwrap();

        assert_eq!(table.get(7).unwrap(), 0.0);
        assert_eq!(table.active_len(), 99);
        assert_eq!(table.zero_tags().collect::<Vec<_>>(), vec![7]);
        assert_consistent(&table);

        // Setting zero twice does not duplicate the FIFO entry
        table.set(7, 0.0).unwrap();
        assert_eq!(table.zero_tags().count(), 1);
    }

    #[test]
    fn test_nonzero_weight_leaves_fifo() {
        let mut table = AffinityTable::fresh(&config());
        table.set(3, 0.0).unwrap();
        table.set(3, 0.2).unwrap();

        assert_eq!(table.zero_tags().count(), 0);
        assert_eq!(table.active_len(), 100);
        assert_consistent(&table);
    }

    #[test]
    fn test_zero_fifo_overflow_revives_oldest() {
        let cfg = config();
        let mut table = AffinityTable::fresh(&cfg);
        for tag in 0..26 {
            table.set(tag, 0.0).unwrap();
        }

        assert_eq!(table.get(0).unwrap(), cfg.revival_weight);
        assert_ne!(table.get(0).unwrap(), 0.0);
        assert_eq!(table.zero_tags().count(), 25);
        assert_eq!(table.zero_tags().next(), Some(1));
        assert_consistent(&table);
    }

    #[test]
    fn test_rank_from_end() {
        let mut table = AffinityTable::fresh(&config());
        table.set(10, 0.9).unwrap();
        table.set(20, 0.1).unwrap();

        assert_eq!(table.rank_from_end(0).unwrap(), 20);
        assert_eq!(table.rank_from_end(-1).unwrap(), 10);
        assert!(matches!(
            table.rank_from_end(100),
            Err(AffinityError::RankOutOfRange { index: 100, len: 100 })
        ));
        assert_eq!(table.rank_from_end(-100).unwrap(), 20);
        assert!(table.rank_from_end(-101).is_err());
    }

    #[test]
    fn test_rank_from_end_singleton() {
        let table = AffinityTable::from_dense(&[0.4], &config()).unwrap();

        assert_eq!(table.rank_from_end(0).unwrap(), 0);
        assert_eq!(table.rank_from_end(-1).unwrap(), 0);
        assert!(table.rank_from_end(1).is_err());
        assert!(table.rank_from_end(-2).is_err());
    }

    #[test]
    fn test_rank_from_end_empty() {
        let table = AffinityTable::from_dense(&[0.0], &config()).unwrap();

        assert!(table.rank_from_end(0).is_err());
        assert!(table.rank_from_end(-1).is_err());
    }

    #[test]
    fn test_rank_from_end_two_tags() {
        let table = AffinityTable::from_dense(&[0.4, 0.6], &config()).unwrap();

        assert_eq!(table.rank_from_end(0).unwrap(), 0);
        assert_eq!(table.rank_from_end(-1).unwrap(), 1);
    }

    #[test]
    fn test_swap_exchanges_weights() {
        let mut table = AffinityTable::fresh(&config());
        table.set(1, 0.9).unwrap();
        table.set(2, 0.0).unwrap();
        table.swap(1, 2).unwrap();

        assert_eq!(table.get(1).unwrap(), 0.0);
        assert_eq!(table.get(2).unwrap(), 0.9);
        assert_eq!(table.rank_from_end(-1).unwrap(), 2);
        assert_eq!(table.zero_tags().collect::<Vec<_>>(), vec![1]);
        assert_consistent(&table);

        assert!(matches!(
            table.swap(1, 500),
            Err(AffinityError::TagNotFound(500))
        ));
    }

    #[test]
    fn test_swap_with_full_fifo_does_not_revive() {
        let cfg = config();
        let mut table = AffinityTable::fresh(&cfg);
        for tag in 0..25 {
            table.set(tag, 0.0).unwrap();
        }
        table.swap(50, 0).unwrap();

        assert_eq!(table.get(50).unwrap(), 0.0);
        assert_eq!(table.get(0).unwrap(), 0.5);
        assert_eq!(table.zero_tags().count(), 25);
        assert_eq!(table.get(1).unwrap(), 0.0);
        assert_consistent(&table);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = AffinityTable::fresh(&config());
        original.set(5, 0.0).unwrap();
        original.set(6, 0.8).unwrap();

        let mut copy = original.clone();
        copy.set(6, 0.0).unwrap();
        copy.set(9, 0.95).unwrap();
        copy.resurface_oldest_zero().unwrap();

        assert_eq!(original.get(6).unwrap(), 0.8);
        assert_eq!(original.get(9).unwrap(), 0.5);
        assert_eq!(original.get(5).unwrap(), 0.0);
        assert_eq!(original.zero_tags().collect::<Vec<_>>(), vec![5]);
        assert_eq!(original.rank_from_end(-1).unwrap(), 6);
        assert_consistent(&original);
        assert_consistent(&copy);
    }

    #[test]
    fn test_resurface_oldest_zero() {
        let mut table = AffinityTable::fresh(&config());
        table.set(4, 0.0).unwrap();
        table.set(8, 0.0).unwrap();
        table.set(30, 0.99).unwrap();

        assert_eq!(table.resurface_oldest_zero().unwrap(), Some(4));
        assert_eq!(table.get(4).unwrap(), 0.99);
        assert_eq!(table.get(30).unwrap(), 0.0);
        assert_eq!(table.zero_tags().collect::<Vec<_>>(), vec![8, 30]);
        assert_eq!(table.top_k(1), vec![(4, 0.99)]);
        assert_consistent(&table);

        let mut clean = AffinityTable::fresh(&config());
        assert_eq!(clean.resurface_oldest_zero().unwrap(), None);
    }

    #[test]
    fn test_top_k_highest_first() {
        let mut table = AffinityTable::fresh(&config());
        table.set(11, 0.9).unwrap();
        table.set(12, 0.8).unwrap();
        table.set(13, 0.0).unwrap();

        let top = table.top_k(3);
        assert_eq!(top[0], (11, 0.9));
        assert_eq!(top[1], (12, 0.8));
        assert_eq!(top[2].1, 0.5);
        assert_eq!(table.top_k(20).len(), 20);
        assert_eq!(table.top_k(1000).len(), 99);
    }

    #[test]
    fn test_dense_vector_round_trip() {
        let cfg = config();
        let mut table = AffinityTable::fresh(&cfg);
        table.set(2, 0.0).unwrap();
        table.set(3, 0.75).unwrap();

        let vector = table.dense_vector(cfg.vocabulary_size);
        assert_eq!(vector.len(), 100);
        assert_eq!(vector[2], 0.0);
        assert_eq!(vector[3], 0.75);
        assert_eq!(vector[4], 0.5);

        let restored = AffinityTable::from_dense(&vector.to_vec(), &cfg).unwrap();
        assert_eq!(restored.zero_tags().collect::<Vec<_>>(), vec![2]);
        assert_eq!(restored.get(3).unwrap(), 0.75);
        assert_consistent(&restored);
    }

    #[test]
    fn test_from_dense_with_too_many_zeros() {
        let cfg = config();
        let vector = vec![0.0f32; 30];
        let table = AffinityTable::from_dense(&vector, &cfg).unwrap();

        assert_eq!(table.zero_tags().count(), 25);
        for tag in 0..5 {
            assert_eq!(table.get(tag).unwrap(), cfg.revival_weight);
        }
        assert_consistent(&table);
    }

    #[test]
    fn test_invalid_weight_rejected() {
        let mut table = AffinityTable::fresh(&config());

        assert!(matches!(
            table.set(1, f64::NAN),
            Err(AffinityError::InvalidWeight { tag: 1, .. })
        ));
        assert!(table.set(1, -0.1).is_err());
        assert_eq!(table.get(1).unwrap(), 0.5);
    }
}
