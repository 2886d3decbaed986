//! # Podium Storage
//!
//! The durable mirror behind the in-memory leaderboard: a directory of
//! append-only segment files recording every (member, score) mutation, so
//! the sorted set can be rebuilt on startup by replaying them in arrival
//! order.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Score Store                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Write Path                                                 │
//! │                                                             │
//! │  put/remove ──> active segment (BufWriter) ──> rotate at    │
//! │                                                size limit   │
//! │                                                             │
//! │  Replay Path                                                │
//! │                                                             │
//! │  00000000000000000000.seg ──┐                               │
//! │  00000000000000000001.seg ──┼──> ReplayIter ──> sorted set  │
//! │  00000000000000000002.seg ──┘    (arrival order,            │
//! │                                   last writer wins)         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Records are CRC32-checked. Writes are buffered with a no-sync default;
//! `flush()` and `close()` drain and fsync.

mod segment;
pub mod store;

pub use segment::{Record, RecordKind};
pub use store::{ReplayIter, ScoreStore};
