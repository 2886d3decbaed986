//! # Podium Index
//!
//! The in-memory ordered index behind the leaderboard: a sorted set backed
//! by a span-augmented skip list plus a member hash index.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        SortedSet                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  member ──> HashMap ──> node          Skip List             │
//! │               O(1)        │                                 │
//! │                           ▼   Level 3: H ──────────> 25     │
//! │                               Level 2: H ──> 8 ────> 25     │
//! │                               Level 1: H ──> 8 > 19 > 25    │
//! │                               Level 0: H > 5 > 8 > 19 > 25  │
//! │                                                             │
//! │  Every forward pointer carries a span (level-0 nodes it     │
//! │  skips), so rank queries cost O(log n) instead of O(n).     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Ordering is by (score, member): scores ascending, ties broken by member
//! bytes ascending. Members are unique within a set.

mod skiplist;
pub mod sorted_set;

pub use sorted_set::{AddOutcome, RangeByScoreOptions, SortedSet};
