//! Replay protection: rejects stale and duplicated signed messages.
//!
//! Each incoming signature carries a ReplayProtect block (timestamp plus
//! random nonce). The guard enforces two rules: the timestamp must fall
//! inside a configurable freshness window, and the (timestamp, nonce)
//! pair must never have been accepted before. State is kept in memory
//! per trust principal and entries older than the window are evicted on
//! the way through, so the table stays bounded by recent traffic.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::trace;

use crate::error::ValidationError;
use crate::messages::ReplayProtect;

/// Default freshness window for signed messages.
pub const DEFAULT_REPLAY_WINDOW: Duration = Duration::from_secs(300);

/// Tracks accepted (timestamp, nonce) pairs per trust principal.
///
/// `check_and_consume` is atomic per principal: the dashmap entry lock
/// is held across the lookup and the insert, so two concurrent arrivals
/// of the same pair cannot both pass.
#[derive(Debug)]
pub struct ReplayGuard {
    /// Accepted pairs, keyed by principal. Timestamps in microseconds
    /// since the epoch.
    seen: DashMap<String, HashSet<(i64, String)>>,
    max_age: chrono::Duration,
}

impl ReplayGuard {
    /// Creates a guard with the default five-minute window.
    pub fn new() -> Self {
        Self::with_window(DEFAULT_REPLAY_WINDOW)
    }

    /// Creates a guard with a custom freshness window.
    pub fn with_window(window: Duration) -> Self {
        Self {
            seen: DashMap::new(),
            max_age: chrono::Duration::from_std(window)
                .unwrap_or_else(|_| chrono::Duration::seconds(300)),
        }
    }

    /// Validates a ReplayProtect block for `principal` and, if it
    /// passes, records it so the same pair can never pass again.
    ///
    /// Checks run in a fixed order so each malformed input maps to its
    /// specific rejection reason: missing block parts first, then
    /// freshness, then uniqueness.
    pub fn check_and_consume(
        &self,
        principal: &str,
        replay: Option<&ReplayProtect>,
    ) -> Result<(), ValidationError> {
        let replay = replay.ok_or(ValidationError::MalformedReplayProtect)?;
        let nonce = replay
            .nonce
            .as_deref()
            .ok_or(ValidationError::MissingNonce)?;
        let timestamp = replay
            .timestamp
            .ok_or(ValidationError::MalformedReplayProtect)?;

        let now = Utc::now();
        if now.signed_duration_since(timestamp) > self.max_age {
            return Err(ValidationError::SignedTooLongAgo);
        }

        let mut entries = self.seen.entry(principal.to_string()).or_default();
        let horizon = now - self.max_age;
        entries.retain(|(micros, _)| !is_expired(*micros, horizon));

        let pair = (timestamp.timestamp_micros(), nonce.to_string());
        if !entries.insert(pair) {
            return Err(ValidationError::NonceAlreadyUsed);
        }
        trace!(principal, retained = entries.len(), "nonce recorded");
        Ok(())
    }

    /// Number of principals with live entries, for diagnostics.
    pub fn tracked_principals(&self) -> usize {
        self.seen.len()
    }
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new()
    }
}

fn is_expired(micros: i64, horizon: DateTime<Utc>) -> bool {
    DateTime::<Utc>::from_timestamp_micros(micros)
        .map(|t| t < horizon)
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn block(timestamp: DateTime<Utc>, nonce: &str) -> ReplayProtect {
        ReplayProtect {
            timestamp: Some(timestamp),
            nonce: Some(nonce.to_string()),
        }
    }

    #[test]
    fn test_fresh_block_accepted() {
        let guard = ReplayGuard::new();
        let replay = ReplayProtect::fresh();
        assert!(guard.check_and_consume("ven123", Some(&replay)).is_ok());
    }

    #[test]
    fn test_repeated_pair_rejected() {
        let guard = ReplayGuard::new();
        let replay = block(Utc::now(), "abcdef0123456789");
        guard.check_and_consume("ven123", Some(&replay)).unwrap();
        assert_eq!(
            guard.check_and_consume("ven123", Some(&replay)),
            Err(ValidationError::NonceAlreadyUsed)
        );
    }

    #[test]
    fn test_same_nonce_different_principal_accepted() {
        // Tables are per principal; one VEN's nonce does not poison
        // another's.
        let guard = ReplayGuard::new();
        let replay = block(Utc::now(), "abcdef0123456789");
        guard.check_and_consume("ven123", Some(&replay)).unwrap();
        assert!(guard.check_and_consume("ven456", Some(&replay)).is_ok());
    }

    #[test]
    fn test_same_nonce_different_timestamp_accepted() {
        let guard = ReplayGuard::new();
        let now = Utc::now();
        guard
            .check_and_consume("ven123", Some(&block(now, "aa")))
            .unwrap();
        assert!(guard
            .check_and_consume("ven123", Some(&block(now - ChronoDuration::seconds(1), "aa")))
            .is_ok());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let guard = ReplayGuard::new();
        let old = Utc::now() - ChronoDuration::seconds(301);
        let err = guard
            .check_and_consume("ven123", Some(&block(old, "aa")))
            .unwrap_err();
        assert_eq!(err, ValidationError::SignedTooLongAgo);
        assert_eq!(err.to_string(), "The message was signed too long ago.");
    }

    #[test]
    fn test_missing_block_rejected() {
        let guard = ReplayGuard::new();
        assert_eq!(
            guard.check_and_consume("ven123", None),
            Err(ValidationError::MalformedReplayProtect)
        );
    }

    #[test]
    fn test_missing_nonce_rejected() {
        let guard = ReplayGuard::new();
        let replay = ReplayProtect {
            timestamp: Some(Utc::now()),
            nonce: None,
        };
        let err = guard
            .check_and_consume("ven123", Some(&replay))
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingNonce);
        assert_eq!(
            err.to_string(),
            "Missing 'nonce' element in ReplayProtect in incoming message."
        );
    }

    #[test]
    fn test_missing_timestamp_rejected() {
        let guard = ReplayGuard::new();
        let replay = ReplayProtect {
            timestamp: None,
            nonce: Some("aa".to_string()),
        };
        assert_eq!(
            guard.check_and_consume("ven123", Some(&replay)),
            Err(ValidationError::MalformedReplayProtect)
        );
    }

    #[test]
    fn test_expired_entries_evicted() {
        let guard = ReplayGuard::with_window(Duration::from_secs(1));
        let old = Utc::now() - ChronoDuration::milliseconds(1500);

        // Seed an entry directly, then trigger eviction with a fresh one.
        guard
            .seen
            .entry("ven123".to_string())
            .or_default()
            .insert((old.timestamp_micros(), "old".to_string()));

        guard
            .check_and_consume("ven123", Some(&block(Utc::now(), "new")))
            .unwrap();
        let entries = guard.seen.get("ven123").unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries.iter().all(|(_, n)| n == "new"));
    }

    #[test]
    fn test_custom_window() {
        let guard = ReplayGuard::with_window(Duration::from_secs(600));
        let replay = block(Utc::now() - ChronoDuration::seconds(400), "aa");
        assert!(guard.check_and_consume("ven123", Some(&replay)).is_ok());
    }
}
