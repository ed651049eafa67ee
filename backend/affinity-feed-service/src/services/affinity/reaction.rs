// ============================================
// Reaction Processor
// ============================================
//
// | Reaction | Primary          | Secondary         | Floor |
// |----------|------------------|-------------------|-------|
// | like     | w += (1-w)*0.10  | w += (1-w)*0.01   | -     |
// | donate   | w += (1-w)*0.25  | w += (1-w)*0.025  | -     |
// | ignore   | w *= 0.90        | w *= 0.99         | 0     |
// | dislike  | w *= 0.75        | w *= 0.975        | 0     |
//
// Decayed weights under DECAY_FLOOR are snapped to exactly 0.

use super::{AffinityError, AffinityTable, Result};
use crate::models::{CatalogEntry, Reaction, TagId};
use tracing::debug;

/// Decayed weights below this value become exactly zero
pub const DECAY_FLOOR: f64 = 0.0005;

/// Single-tag weight update
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightUpdate {
    /// Move `rate` of the remaining distance toward 1
    Grow(f64),
    /// Multiply by `factor`, snapping to 0 below DECAY_FLOOR
    Decay(f64),
}

impl WeightUpdate {
    pub fn apply(self, weight: f64) -> f64 {
        match self {
            WeightUpdate::Grow(rate) => weight + (1.0 - weight) * rate,
            WeightUpdate::Decay(factor) => {
                let decayed = weight * factor;
                if decayed < DECAY_FLOOR {
                    0.0
                } else {
                    decayed
                }
            }
        }
    }
}

/// Update applied to an entry's primary and secondary tags
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReactionRule {
    pub primary: WeightUpdate,
    pub secondary: WeightUpdate,
}

impl ReactionRule {
    pub fn for_reaction(reaction: &Reaction) -> Self {
        match reaction {
            Reaction::Like => Self {
                primary: WeightUpdate::Grow(0.10),
                secondary: WeightUpdate::Grow(0.01),
            },
            Reaction::Donate { .. } => Self {
                primary: WeightUpdate::Grow(0.25),
                secondary: WeightUpdate::Grow(0.025),
            },
            Reaction::Ignore => Self {
                primary: WeightUpdate::Decay(0.90),
                secondary: WeightUpdate::Decay(0.99),
            },
            Reaction::Dislike => Self {
                primary: WeightUpdate::Decay(0.75),
                secondary: WeightUpdate::Decay(0.975),
            },
        }
    }
}

/// Tags touched by one reaction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReactionSummary {
    pub updated: usize,
    pub zeroed: Vec<TagId>,
}

/// Stateless reaction rules over an affinity table
pub struct ReactionProcessor;

impl ReactionProcessor {
    /// Apply `reaction` to every tag of `entry`.
    ///
    /// All tags are checked before any weight changes, so an unknown tag
    /// leaves the table untouched.
    pub fn apply(
        table: &mut AffinityTable,
        entry: &CatalogEntry,
        reaction: &Reaction,
    ) -> Result<ReactionSummary> {
        if let Some(&missing) = entry
            .primary_tags
            .iter()
            .chain(entry.secondary_tags.iter())
            .find(|&&tag| !table.contains(tag))
        {
            return Err(AffinityError::TagNotFound(missing));
        }

        let rule = ReactionRule::for_reaction(reaction);
        let mut summary = ReactionSummary::default();

        let updates = entry
            .primary_tags
            .iter()
            .map(|&tag| (tag, rule.primary))
            .chain(entry.secondary_tags.iter().map(|&tag| (tag, rule.secondary)));

        for (tag, update) in updates {
            let current = table.get(tag)?;
            let next = update.apply(current);
            table.set(tag, next)?;
            summary.updated += 1;
            if next == 0.0 && current != 0.0 {
                summary.zeroed.push(tag);
            }
        }

        debug!(
            entry_id = %entry.id,
            reaction = %reaction,
            updated = summary.updated,
            zeroed = summary.zeroed.len(),
            "Reaction applied to affinity table"
        );

        Ok(summary)
    }
}
