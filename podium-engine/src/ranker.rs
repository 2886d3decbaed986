//! The `Ranker` facade.
//!
//! Lifecycle is `New -> Started -> Closed`; every data operation requires
//! `Started`. Mutations persist to the score store before touching the
//! sorted set, so a crash between the two leaves the on-disk truth ahead of
//! memory and the next `start()` re-reflects it.

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::info;

use podium_core::config::RankerOptions;
use podium_core::error::{Error, Result};
use podium_core::metrics::Metrics;
use podium_core::types::{ensure_valid_member, ensure_valid_score, Entry};
use podium_index::{RangeByScoreOptions, SortedSet};
use podium_storage::{RecordKind, ScoreStore};

enum State {
    New,
    Started(Inner),
    Closed,
}

struct Inner {
    set: SortedSet,
    store: ScoreStore,
}

/// An embeddable leaderboard bound to one storage directory.
///
/// All methods take `&self`: a single exclusive lock serializes the sorted
/// set and the store handle, so a `Ranker` can be shared across threads
/// directly or behind an `Arc`.
pub struct Ranker {
    options: RankerOptions,
    metrics: Metrics,
    state: Mutex<State>,
}

impl Ranker {
    /// Build an instance from options. Does not touch disk.
    pub fn new(options: RankerOptions) -> Self {
        Self {
            options,
            metrics: Metrics::new(),
            state: Mutex::new(State::New),
        }
    }

    pub fn options(&self) -> &RankerOptions {
        &self.options
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Open the score store and, when prior state exists, replay every
    /// record into a fresh sorted set. Calling `start` on a running ranker
    /// is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        if let State::Started(_) = *state {
            return Ok(());
        }

        let had_state = self.options.storage_dir.exists();
        let store = ScoreStore::open(
            &self.options.storage_dir,
            self.options.store.clone(),
            self.metrics.clone(),
        )?;

        let mut set = SortedSet::new();
        let mut replayed = 0;
        if had_state {
            replayed = store.reload(|record| {
                match record.kind {
                    RecordKind::Set => {
                        set.add(record.score, record.member)?;
                    }
                    RecordKind::Tombstone => {
                        set.remove(&record.member);
                    }
                }
                Ok(())
            })?;
        }

        info!(
            id = %self.options.id,
            dir = %self.options.storage_dir.display(),
            replayed,
            members = set.len(),
            "ranker started"
        );
        *state = State::Started(Inner { set, store });
        Ok(())
    }

    /// Flush and close the score store and drop the sorted set. Idempotent.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        if let State::Started(inner) = &*state {
            inner.store.close()?;
            info!(id = %self.options.id, "ranker closed");
            *state = State::Closed;
        }
        Ok(())
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock();
        match &mut *state {
            State::Started(inner) => f(inner),
            _ => Err(Error::NotStarted),
        }
    }

    /// Set a member's score, inserting the member if absent.
    pub fn update(&self, member: impl Into<Bytes>, score: f64) -> Result<()> {
        let member = member.into();
        ensure_valid_member(&member)?;
        ensure_valid_score(score)?;

        self.with_inner(|inner| {
            inner.store.put(member.clone(), score)?;
            inner.set.add(score, member)?;
            Ok(())
        })?;
        self.metrics.record_update();
        Ok(())
    }

    /// The member's entry with its 0-based descending rank.
    pub fn rank(&self, member: &[u8]) -> Result<Entry> {
        let entry = self.with_inner(|inner| {
            let score = inner.set.score(member).ok_or(Error::KeyNotFound)?;
            let rank = inner.set.rank_desc(member).ok_or(Error::KeyNotFound)?;
            Ok(Entry::new(rank as i64, score, Bytes::copy_from_slice(member)))
        })?;
        self.metrics.record_rank_query();
        Ok(entry)
    }

    /// Descending rows in the inclusive 0-based slice [start, end].
    /// Negative indices count from the end.
    pub fn range(&self, start: i64, end: i64) -> Result<Vec<Entry>> {
        let entries = self.with_inner(|inner| {
            let (from, _) = match inner.set.resolve_range(start, end) {
                Some(range) => range,
                None => return Ok(Vec::new()),
            };
            let rows = inner.set.range_by_rank(start, end, true);
            Ok(rows
                .into_iter()
                .enumerate()
                .map(|(i, (member, score))| Entry::new((from + i) as i64, score, member))
                .collect())
        })?;
        self.metrics.record_range_query();
        Ok(entries)
    }

    pub fn score(&self, member: &[u8]) -> Result<f64> {
        let score = self.with_inner(|inner| inner.set.score(member).ok_or(Error::KeyNotFound))?;
        self.metrics.record_rank_query();
        Ok(score)
    }

    /// 0-based rank in ascending (score, member) order.
    pub fn rank_asc(&self, member: &[u8]) -> Result<usize> {
        let rank =
            self.with_inner(|inner| inner.set.rank_asc(member).ok_or(Error::KeyNotFound))?;
        self.metrics.record_rank_query();
        Ok(rank)
    }

    /// 0-based rank in descending order; the largest score ranks 0.
    pub fn rank_desc(&self, member: &[u8]) -> Result<usize> {
        let rank =
            self.with_inner(|inner| inner.set.rank_desc(member).ok_or(Error::KeyNotFound))?;
        self.metrics.record_rank_query();
        Ok(rank)
    }

    /// Add `delta` to the member's score (absent members start from zero),
    /// persist and return the new score.
    pub fn incr_by(&self, delta: f64, member: impl Into<Bytes>) -> Result<f64> {
        let member = member.into();
        ensure_valid_member(&member)?;
        ensure_valid_score(delta)?;

        let new_score = self.with_inner(|inner| {
            let new_score = match inner.set.score(&member) {
                Some(old) => old + delta,
                None => delta,
            };
            // inf + -inf would otherwise persist NaN before memory rejects it.
            ensure_valid_score(new_score)?;
            inner.store.put(member.clone(), new_score)?;
            inner.set.add(new_score, member)?;
            Ok(new_score)
        })?;
        self.metrics.record_update();
        Ok(new_score)
    }

    /// Remove a member, persisting a tombstone. Returns the removed score.
    pub fn remove(&self, member: &[u8]) -> Result<f64> {
        let score = self.with_inner(|inner| {
            if !inner.set.contains(member) {
                return Err(Error::KeyNotFound);
            }
            inner.store.remove(Bytes::copy_from_slice(member))?;
            inner.set.remove(member).ok_or(Error::KeyNotFound)
        })?;
        self.metrics.record_removal();
        Ok(score)
    }

    pub fn cardinality(&self) -> Result<usize> {
        self.with_inner(|inner| Ok(inner.set.len()))
    }

    /// Rows in the inclusive rank slice [start, stop] as (member, score)
    /// pairs, ascending or descending.
    pub fn range_with_scores(
        &self,
        start: i64,
        stop: i64,
        reverse: bool,
    ) -> Result<Vec<(Bytes, f64)>> {
        let rows = self.with_inner(|inner| Ok(inner.set.range_by_rank(start, stop, reverse)))?;
        self.metrics.record_range_query();
        Ok(rows)
    }

    /// Rows whose score falls in [min, max]; see [`RangeByScoreOptions`].
    pub fn range_by_score(
        &self,
        min: f64,
        max: f64,
        options: RangeByScoreOptions,
    ) -> Result<Vec<(Bytes, f64)>> {
        let rows = self.with_inner(|inner| inner.set.range_by_score(min, max, options))?;
        self.metrics.record_range_query();
        Ok(rows)
    }

    /// Remove and return the row with the smallest (score, member).
    pub fn pop_min(&self) -> Result<(Bytes, f64)> {
        let row = self.with_inner(|inner| {
            let (member, score) = inner.set.peek_min().ok_or(Error::KeyNotFound)?;
            inner.store.remove(member.clone())?;
            inner.set.remove(&member);
            Ok((member, score))
        })?;
        self.metrics.record_removal();
        Ok(row)
    }

    /// Remove and return the row with the largest (score, member).
    pub fn pop_max(&self) -> Result<(Bytes, f64)> {
        let row = self.with_inner(|inner| {
            let (member, score) = inner.set.peek_max().ok_or(Error::KeyNotFound)?;
            inner.store.remove(member.clone())?;
            inner.set.remove(&member);
            Ok((member, score))
        })?;
        self.metrics.record_removal();
        Ok(row)
    }

    /// Cursor-paged walk over the set; see `SortedSet::scan` for the
    /// count-down cursor contract. Not a snapshot: rows added or removed
    /// between calls may be skipped or repeated.
    pub fn scan(&self, cursor: u64, count: usize) -> Result<(Vec<(Bytes, f64)>, u64)> {
        let page = self.with_inner(|inner| Ok(inner.set.scan(cursor, count)))?;
        self.metrics.record_range_query();
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_operations_require_start() {
        let tmp = TempDir::new().unwrap();
        let ranker = Ranker::new(RankerOptions::default().with_storage_dir(tmp.path()));

        assert!(matches!(
            ranker.update("alice", 1.0),
            Err(Error::NotStarted)
        ));
        assert!(matches!(ranker.rank(b"alice"), Err(Error::NotStarted)));
        assert!(matches!(ranker.range(0, 10), Err(Error::NotStarted)));
    }

    #[test]
    fn test_close_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let ranker = Ranker::new(RankerOptions::default().with_storage_dir(tmp.path()));

        // Closing a never-started ranker is fine too.
        ranker.close().unwrap();

        ranker.start().unwrap();
        ranker.start().unwrap();
        ranker.close().unwrap();
        ranker.close().unwrap();

        assert!(matches!(ranker.cardinality(), Err(Error::NotStarted)));
    }
}
