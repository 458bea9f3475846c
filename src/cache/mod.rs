//! Fast validation cache: redemption code → last known ticket state.
//!
//! The cache is a derived, disposable view. It may be stale, evicted, or
//! offline; none of that affects correctness because no admission is ever
//! granted without the atomic insert in the inventory store. It only saves
//! gate scanners a database round trip for codes already known to be used.

pub mod memory;
pub mod redis;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::RedemptionCode;

pub use memory::InMemoryCache;
pub use self::redis::RedisCache;

/// Cached projection of a sale's admission state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheState {
    /// Nothing cached for this code.
    Unknown,
    /// Sale exists, payment not confirmed.
    Pending,
    /// Payment confirmed, not yet admitted.
    Paid,
    /// Already admitted.
    Used,
}

impl CacheState {
    /// Wire representation used by remote backends.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Used => "USED",
        }
    }
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheState {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNKNOWN" => Ok(Self::Unknown),
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "USED" => Ok(Self::Used),
            other => Err(CacheError::Corrupt(other.to_string())),
        }
    }
}

/// Cache failures. Callers log them and fall back to the store.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Backend could not be reached.
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// Backend returned a value that is not a [`CacheState`].
    #[error("corrupt cache value: {0}")]
    Corrupt(String),
}

/// Key-value view consulted by gate validation.
#[async_trait]
pub trait ValidationCache: Send + Sync + fmt::Debug {
    /// Returns the cached state, or [`CacheState::Unknown`] when absent or
    /// expired.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend is unreachable.
    async fn get(&self, code: &RedemptionCode) -> Result<CacheState, CacheError>;

    /// Stores a state for the code.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend is unreachable.
    async fn set(&self, code: &RedemptionCode, state: CacheState) -> Result<(), CacheError>;

    /// Drops any cached state for the code.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend is unreachable.
    async fn invalidate(&self, code: &RedemptionCode) -> Result<(), CacheError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_string_round_trip() {
        for state in [
            CacheState::Unknown,
            CacheState::Pending,
            CacheState::Paid,
            CacheState::Used,
        ] {
            assert_eq!(state.as_str().parse::<CacheState>().ok(), Some(state));
        }
        assert!("ADMITTED".parse::<CacheState>().is_err());
    }
}
