//! Sorted set: a span-augmented skip list coupled with a member hash index.
//!
//! The skip list owns every node; the index maps member bytes to arena
//! indices for O(1) point lookup. Members are unique, scores are not.

use std::collections::HashMap;

use bytes::Bytes;

use podium_core::error::Result;
use podium_core::types::{ensure_valid_member, ensure_valid_score};

use crate::skiplist::SkipList;

/// Whether an `add` created a new member or touched an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    Updated,
}

/// Flags for [`SortedSet::range_by_score`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeByScoreOptions {
    /// Emit rows from high score to low.
    pub reverse: bool,
    /// Treat the interval as open at the minimum.
    pub exclude_min: bool,
    /// Treat the interval as open at the maximum.
    pub exclude_max: bool,
    /// Stop after this many rows.
    pub limit: Option<usize>,
}

/// An ordered multimap of (score, member) with unique members.
pub struct SortedSet {
    index: HashMap<Bytes, usize>,
    list: SkipList,
}

impl Default for SortedSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SortedSet {
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            list: SkipList::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Insert or reposition a member. A score change deletes the old node
    /// and re-inserts; an identical score leaves the structure untouched.
    pub fn add(&mut self, score: f64, member: impl Into<Bytes>) -> Result<AddOutcome> {
        let member = member.into();
        ensure_valid_member(&member)?;
        ensure_valid_score(score)?;

        if let Some(&id) = self.index.get(&member) {
            let old_score = self.list.score(id);
            if old_score != score {
                self.list.delete(old_score, &member);
                let id = self.list.insert(score, member.clone());
                self.index.insert(member, id);
            }
            return Ok(AddOutcome::Updated);
        }

        let id = self.list.insert(score, member.clone());
        self.index.insert(member, id);
        Ok(AddOutcome::Added)
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.index.get(member).map(|&id| self.list.score(id))
    }

    pub fn contains(&self, member: &[u8]) -> bool {
        self.index.contains_key(member)
    }

    /// 0-based rank in ascending (score, member) order.
    pub fn rank_asc(&self, member: &[u8]) -> Option<usize> {
        let &id = self.index.get(member)?;
        let rank = self.list.rank(self.list.score(id), member)?;
        Some(rank - 1)
    }

    /// 0-based rank in descending order; the largest score ranks 0.
    pub fn rank_desc(&self, member: &[u8]) -> Option<usize> {
        let &id = self.index.get(member)?;
        let rank = self.list.rank(self.list.score(id), member)?;
        Some(self.list.len() - rank)
    }

    /// Remove a member, returning its score.
    pub fn remove(&mut self, member: &[u8]) -> Option<f64> {
        let id = self.index.remove(member)?;
        let score = self.list.score(id);
        self.list.delete(score, member);
        Some(score)
    }

    /// Add `delta` to the member's score (missing members start from zero)
    /// and return the new score.
    pub fn incr_by(&mut self, delta: f64, member: impl Into<Bytes>) -> Result<f64> {
        let member = member.into();
        ensure_valid_score(delta)?;
        let new_score = match self.score(&member) {
            Some(old) => old + delta,
            None => delta,
        };
        // inf + -inf lands here as NaN and is rejected before any mutation.
        self.add(new_score, member)?;
        Ok(new_score)
    }

    /// Resolve a 0-based inclusive [start, stop] slice against the current
    /// length. Negative indices count from the end (-1 is the last row).
    /// Returns None when the normalized slice is empty.
    pub fn resolve_range(&self, start: i64, stop: i64) -> Option<(usize, usize)> {
        let length = self.len() as i64;
        let mut start = start;
        let mut stop = stop;
        if start < 0 {
            start += length;
            if start < 0 {
                start = 0;
            }
        }
        if stop < 0 {
            stop += length;
        }
        if start > stop || start >= length {
            return None;
        }
        if stop >= length {
            stop = length - 1;
        }
        Some((start as usize, stop as usize))
    }

    /// Rows in the inclusive rank slice [start, stop], ascending by default
    /// or descending with `reverse`.
    pub fn range_by_rank(&self, start: i64, stop: i64, reverse: bool) -> Vec<(Bytes, f64)> {
        let (start, stop) = match self.resolve_range(start, stop) {
            Some(range) => range,
            None => return Vec::new(),
        };
        let count = stop - start + 1;
        let mut out = Vec::with_capacity(count);

        let mut cursor = if reverse {
            if start == 0 {
                self.list.tail()
            } else {
                self.list.node_by_rank(self.list.len() - start)
            }
        } else if start == 0 {
            self.list.first()
        } else {
            self.list.node_by_rank(start + 1)
        };

        for _ in 0..count {
            let id = match cursor {
                Some(id) => id,
                None => break,
            };
            out.push((self.list.member(id).clone(), self.list.score(id)));
            cursor = if reverse {
                self.list.prev(id)
            } else {
                self.list.next(id)
            };
        }
        out
    }

    /// Rows whose score falls in [min, max], honoring exclusion flags, an
    /// optional row limit and direction. Reversed bounds are normalized by
    /// swapping both the bounds and their exclusion flags.
    pub fn range_by_score(
        &self,
        min: f64,
        max: f64,
        options: RangeByScoreOptions,
    ) -> Result<Vec<(Bytes, f64)>> {
        ensure_valid_score(min)?;
        ensure_valid_score(max)?;

        let (min, max, exclude_min, exclude_max) = if min > max {
            (max, min, options.exclude_max, options.exclude_min)
        } else {
            (min, max, options.exclude_min, options.exclude_max)
        };

        let mut out = Vec::new();
        if self.is_empty() {
            return Ok(out);
        }
        let limit = options.limit.unwrap_or(usize::MAX);
        if limit == 0 {
            return Ok(out);
        }

        if options.reverse {
            let mut cursor = self.list.last_in_score_range(max, exclude_max);
            while let Some(id) = cursor {
                let score = self.list.score(id);
                let in_range = if exclude_min {
                    score > min
                } else {
                    score >= min
                };
                if !in_range {
                    break;
                }
                out.push((self.list.member(id).clone(), score));
                if out.len() == limit {
                    break;
                }
                cursor = self.list.prev(id);
            }
        } else {
            let mut cursor = self.list.first_in_score_range(min, exclude_min);
            while let Some(id) = cursor {
                let score = self.list.score(id);
                let in_range = if exclude_max {
                    score < max
                } else {
                    score <= max
                };
                if !in_range {
                    break;
                }
                out.push((self.list.member(id).clone(), score));
                if out.len() == limit {
                    break;
                }
                cursor = self.list.next(id);
            }
        }
        Ok(out)
    }

    /// The row with the smallest (score, member), without removing it.
    pub fn peek_min(&self) -> Option<(Bytes, f64)> {
        let id = self.list.first()?;
        Some((self.list.member(id).clone(), self.list.score(id)))
    }

    /// The row with the largest (score, member), without removing it.
    pub fn peek_max(&self) -> Option<(Bytes, f64)> {
        let id = self.list.tail()?;
        Some((self.list.member(id).clone(), self.list.score(id)))
    }

    /// Remove and return the row with the smallest (score, member).
    pub fn pop_min(&mut self) -> Option<(Bytes, f64)> {
        let (member, score) = self.peek_min()?;
        self.list.delete(score, &member);
        self.index.remove(&member);
        Some((member, score))
    }

    /// Remove and return the row with the largest (score, member).
    pub fn pop_max(&mut self) -> Option<(Bytes, f64)> {
        let (member, score) = self.peek_max()?;
        self.list.delete(score, &member);
        self.index.remove(&member);
        Some((member, score))
    }

    /// Cursor-paged walk over the set, low ranks last.
    ///
    /// The cursor counts down: it names one past the next row to return,
    /// starting from the length. Pass 0 to begin; a returned cursor of 0
    /// means the walk is done. This is not a snapshot: rows added or removed
    /// between calls may be skipped or repeated.
    pub fn scan(&self, cursor: u64, count: usize) -> (Vec<(Bytes, f64)>, u64) {
        let end = if cursor == 0 { self.len() } else { cursor as usize };
        let start = end.saturating_sub(count);

        let items = self.range_by_rank(start as i64, end as i64 - 1, false);
        if items.is_empty() {
            return (items, 0);
        }
        (items, start as u64)
    }
}
