//! # Core Types
//!
//! The public `Entry` record and the validation rules shared by the index
//! and the engine facade.
//!
//! Members are opaque non-empty byte strings compared byte-wise. Scores are
//! 64-bit IEEE-754 floats; NaN is rejected at every mutation entry point,
//! -0.0 and +0.0 compare equal, and ties between equal scores are broken by
//! member bytes ascending.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single leaderboard row as returned by rank and range queries.
///
/// `rank` is 0-based descending: the largest score holds rank 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub rank: i64,
    pub score: f64,
    pub member: Bytes,
}

impl Entry {
    pub fn new(rank: i64, score: f64, member: impl Into<Bytes>) -> Self {
        Self {
            rank,
            score,
            member: member.into(),
        }
    }
}

/// Reject scores that would poison the total order.
pub fn ensure_valid_score(score: f64) -> Result<()> {
    if score.is_nan() {
        return Err(Error::invalid("score must not be NaN"));
    }
    Ok(())
}

/// Reject members the data model does not admit.
pub fn ensure_valid_member(member: &[u8]) -> Result<()> {
    if member.is_empty() {
        return Err(Error::invalid("member must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_validation() {
        assert!(ensure_valid_score(0.0).is_ok());
        assert!(ensure_valid_score(-0.0).is_ok());
        assert!(ensure_valid_score(f64::INFINITY).is_ok());
        assert!(ensure_valid_score(f64::NAN).is_err());
    }

    #[test]
    fn test_member_validation() {
        assert!(ensure_valid_member(b"alice").is_ok());
        assert!(ensure_valid_member(b"").is_err());
    }
}
