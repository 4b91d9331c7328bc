//! Global emission counter shared by partition workers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Result of asking the counter for one more emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The record may be delivered. `reached_limit` is set for the claim
    /// that consumed the last slot.
    Granted { reached_limit: bool },
    /// The limit was already reached; the record must not be delivered.
    Refused,
}

/// Counts delivered records against an optional cap.
///
/// Claiming is a single compare-and-increment, so concurrent workers can
/// never push the total past the cap.
#[derive(Debug)]
pub struct LimitCounter {
    emitted: AtomicU64,
    limit: Option<u64>,
}

impl LimitCounter {
    pub fn new(limit: Option<u64>) -> Self {
        Self {
            emitted: AtomicU64::new(0),
            limit,
        }
    }

    pub fn try_claim(&self) -> Claim {
        let Some(limit) = self.limit else {
            self.emitted.fetch_add(1, Ordering::AcqRel);
            return Claim::Granted {
                reached_limit: false,
            };
        };

        match self
            .emitted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            }) {
            Ok(previous) => Claim::Granted {
                reached_limit: previous + 1 >= limit,
            },
            Err(_) => Claim::Refused,
        }
    }

    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Acquire)
    }

    pub fn is_exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.emitted() >= limit)
    }
}
