//! # Podium Engine
//!
//! The embeddable leaderboard surface: a `Ranker` couples the in-memory
//! sorted set with the durable score store and serializes access behind one
//! exclusive lock.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Ranker                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Write Path                                                 │
//! │                                                             │
//! │  update ──> ScoreStore (disk) ──> SortedSet (memory)        │
//! │                                                             │
//! │  Query Path                                                 │
//! │                                                             │
//! │  rank / range ──> SortedSet ──> span-augmented skip list    │
//! │                                                             │
//! │  Startup                                                    │
//! │                                                             │
//! │  start ──> open store ──> replay records ──> SortedSet      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use podium_engine::{Ranker, RankerOptions};
//!
//! # fn main() -> podium_engine::Result<()> {
//! let ranker = Ranker::new(RankerOptions::default().with_storage_dir("/var/lib/league"));
//! ranker.start()?;
//!
//! ranker.update("alice", 1530.0)?;
//! ranker.update("bob", 1610.0)?;
//!
//! let entry = ranker.rank(b"alice")?;
//! println!("alice is #{} with {}", entry.rank + 1, entry.score);
//!
//! for row in ranker.range(0, 9)? {
//!     println!("#{} {:?} {}", row.rank, row.member, row.score);
//! }
//! ranker.close()?;
//! # Ok(())
//! # }
//! ```

pub mod ranker;

pub use ranker::Ranker;

pub use podium_core::{Entry, Error, Metrics, MetricsSnapshot, RankerOptions, Result, StoreConfig};
pub use podium_index::RangeByScoreOptions;
