// ============================================
// Exploration Module
// ============================================
//
// Explore-exploit balance for feed refills:
// 1. One uniform draw picks an exploration event
// 2. The event perturbs a clone of the affinity table (disrupt/return)
//    or narrows the catalog scan (gem/trending/repeat)
// 3. The composed query drives candidate ranking for that refill
//
// Draw partition over [0, 99):
//   0        disrupt
//   1        return
//   2..=75   basic
//   76..=85  gem       (gem sentinel, else basic)
//   86..=95  trending  (trending sentinel, else basic)
//   96..=98  repeat    (repeat sentinel and positive history, else basic)

pub mod event_policy;

pub use event_policy::{ComposedQuery, Event, EventPolicy, DRAW_SPACE};
