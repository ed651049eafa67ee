use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Index into the tag vocabulary (cause categories).
pub type TagId = u32;

/// Dense vector over the tag vocabulary, indexed by tag id.
pub type DenseVector = Array1<f32>;

/// Vector weight of a primary tag in a catalog entry.
pub const PRIMARY_TAG_WEIGHT: f32 = 10.0;
/// Vector weight of a secondary tag in a catalog entry.
pub const SECONDARY_TAG_WEIGHT: f32 = 1.0;

/// Catalog marker used by the gem/trending exploration events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Badge {
    Gem,
    Trending,
}

impl Badge {
    pub fn as_str(&self) -> &'static str {
        match self {
            Badge::Gem => "gem",
            Badge::Trending => "trending",
        }
    }
}

/// Per-profile opt-in marker that unlocks a special exploration event.
///
/// The legacy app stored these as negative tag ids inside the tag table;
/// they are kept on the profile here and persisted by their legacy id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentinel {
    Gem,
    Trending,
    Repeat,
}

impl Sentinel {
    pub fn legacy_tag_id(&self) -> i32 {
        match self {
            Sentinel::Gem => -1,
            Sentinel::Trending => -2,
            Sentinel::Repeat => -3,
        }
    }

    pub fn from_legacy_tag_id(id: i32) -> Option<Self> {
        match id {
            -1 => Some(Sentinel::Gem),
            -2 => Some(Sentinel::Trending),
            -3 => Some(Sentinel::Repeat),
            _ => None,
        }
    }
}

/// Raw catalog record as ingested from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: String,
    #[serde(default)]
    pub primary: Vec<TagId>,
    #[serde(default)]
    pub secondary: Vec<TagId>,
    #[serde(default)]
    pub badges: Vec<Badge>,
}

/// A recommendable nonprofit with its derived dense vector
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub id: String,
    pub primary_tags: BTreeSet<TagId>,
    pub secondary_tags: BTreeSet<TagId>,
    pub badges: BTreeSet<Badge>,
    vector: DenseVector,
}

impl CatalogEntry {
    pub fn new(
        id: impl Into<String>,
        primary: impl IntoIterator<Item = TagId>,
        secondary: impl IntoIterator<Item = TagId>,
        vocabulary_size: usize,
    ) -> Self {
        let primary_tags: BTreeSet<TagId> = primary.into_iter().collect();
        let secondary_tags: BTreeSet<TagId> = secondary.into_iter().collect();

        let mut vector = DenseVector::zeros(vocabulary_size);
        // Primary weight wins when a tag is listed in both sets
        for &tag in &secondary_tags {
            if let Some(slot) = vector.get_mut(tag as usize) {
                *slot = SECONDARY_TAG_WEIGHT;
            }
        }
        for &tag in &primary_tags {
            if let Some(slot) = vector.get_mut(tag as usize) {
                *slot = PRIMARY_TAG_WEIGHT;
            }
        }

        Self {
            id: id.into(),
            primary_tags,
            secondary_tags,
            badges: BTreeSet::new(),
            vector,
        }
    }

    pub fn with_badges(mut self, badges: impl IntoIterator<Item = Badge>) -> Self {
        self.badges.extend(badges);
        self
    }

    pub fn from_record(record: CatalogRecord, vocabulary_size: usize) -> Self {
        Self::new(record.id, record.primary, record.secondary, vocabulary_size)
            .with_badges(record.badges)
    }

    /// Recover primary/secondary tags from a stored dense vector
    /// (10 → primary, 1 → secondary, anything else ignored).
    pub fn from_dense_vector(id: impl Into<String>, vector: &[f32]) -> Self {
        let mut primary = Vec::new();
        let mut secondary = Vec::new();
        for (tag, &value) in vector.iter().enumerate() {
            if (value - PRIMARY_TAG_WEIGHT).abs() < 1e-6 {
                primary.push(tag as TagId);
            } else if (value - SECONDARY_TAG_WEIGHT).abs() < 1e-6 {
                secondary.push(tag as TagId);
            }
        }
        Self::new(id, primary, secondary, vector.len())
    }

    pub fn vector(&self) -> &DenseVector {
        &self.vector
    }

    pub fn has_badge(&self, badge: Badge) -> bool {
        self.badges.contains(&badge)
    }
}

/// Persisted form of a user profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredProfile {
    /// Dense weight vector, index = tag id
    pub weights: Vec<f32>,
    /// Legacy sentinel tag ids (-1 gem, -2 trending, -3 repeat)
    #[serde(default)]
    pub sentinels: Vec<i32>,
    /// Positively reacted entry ids, oldest first
    #[serde(default)]
    pub positive_history: Vec<String>,
}

/// User reaction to a shown catalog entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reaction {
    Like,
    Dislike,
    Ignore,
    Donate { amount: f64 },
}

#[derive(Debug, Error, PartialEq)]
#[error("invalid reaction: {0}")]
pub struct InvalidReaction(pub String);

impl Reaction {
    /// Decode the legacy wire code (0 like, 1 dislike, 2 ignore, 3 donate).
    pub fn from_code(code: i32, amount: f64) -> Result<Self, InvalidReaction> {
        match code {
            0 => Ok(Reaction::Like),
            1 => Ok(Reaction::Dislike),
            2 => Ok(Reaction::Ignore),
            3 => Ok(Reaction::Donate { amount }),
            other => Err(InvalidReaction(other.to_string())),
        }
    }

    /// Like and donate count as positive signals
    pub fn is_positive(&self) -> bool {
        matches!(self, Reaction::Like | Reaction::Donate { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Reaction::Like => "like",
            Reaction::Dislike => "dislike",
            Reaction::Ignore => "ignore",
            Reaction::Donate { .. } => "donate",
        }
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reaction {
    type Err = InvalidReaction;

    /// Names map to reactions; donations parsed this way carry no amount.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "like" => Ok(Reaction::Like),
            "dislike" => Ok(Reaction::Dislike),
            "ignore" => Ok(Reaction::Ignore),
            "donate" => Ok(Reaction::Donate { amount: 0.0 }),
            _ => Err(InvalidReaction(s.to_string())),
        }
    }
}
