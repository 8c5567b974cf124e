//! Optimistic boolean toggles.
//!
//! A toggle flips the local flag immediately, then confirms it against the
//! backend. Failed confirmations roll the flag back. Every flag carries a
//! sequence number bumped on each toggle; a response belonging to an older
//! toggle than the latest one is discarded, so overlapping toggles on the
//! same listing settle on the most recent user intent.
//!
//! Rollback goes to the last value the backend accepted, not to the value
//! seen when the toggle started, which may itself have been optimistic.

use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default)]
struct Flag {
    /// What the user sees
    value: bool,
    /// Last value the backend accepted
    confirmed: bool,
    /// Toggle that produced `confirmed`
    confirmed_seq: u64,
    seq: u64,
    /// The latest toggle has received its response
    settled: bool,
}

impl Flag {
    fn settle(&mut self, value: bool) {
        self.seq += 1;
        self.value = value;
        self.confirmed = value;
        self.confirmed_seq = self.seq;
        self.settled = true;
    }
}

/// How a toggle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The backend accepted the change; the flag holds the new value
    Confirmed(bool),
    /// The backend rejected the change; the flag is back to its last confirmed value
    Reverted { restored: bool, error: String },
    /// A newer toggle was issued meanwhile; this response was not applied
    Superseded { error: Option<String> },
}

impl ToggleOutcome {
    pub fn failed(&self) -> bool {
        matches!(
            self,
            ToggleOutcome::Reverted { .. } | ToggleOutcome::Superseded { error: Some(_) }
        )
    }
}

/// A set of per-listing boolean flags with optimistic updates
#[derive(Debug, Default)]
pub struct OptimisticFlags {
    flags: Mutex<HashMap<String, Flag>>,
}

impl OptimisticFlags {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Flag>> {
        self.flags.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, id: &str) -> bool {
        self.lock().get(id).map(|f| f.value).unwrap_or(false)
    }

    /// Identifiers whose flag is set
    pub fn ids(&self) -> HashSet<String> {
        self.lock()
            .iter()
            .filter(|(_, flag)| flag.value)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Replace all flags with the given set, e.g. after loading from the backend.
    /// In-flight toggles become stale.
    pub fn reset<I: IntoIterator<Item = String>>(&self, ids: I) {
        let set: HashSet<String> = ids.into_iter().collect();
        let mut flags = self.lock();
        for (id, flag) in flags.iter_mut() {
            flag.settle(set.contains(id));
        }
        for id in set {
            flags.entry(id).or_default().settle(true);
        }
    }

    /// Record a value the backend already accepted outside a toggle
    pub fn set_confirmed(&self, id: &str, value: bool) {
        self.lock().entry(id.to_string()).or_default().settle(value);
    }

    pub fn clear(&self) {
        self.reset(std::iter::empty());
    }

    /// Flip the flag for `id`, then run `apply` (new value true) or `undo`
    /// (new value false) against the backend.
    pub async fn toggle<A, U, FA, FU>(&self, id: &str, apply: A, undo: U) -> ToggleOutcome
    where
        A: FnOnce() -> FA,
        U: FnOnce() -> FU,
        FA: Future<Output = Result<()>>,
        FU: Future<Output = Result<()>>,
    {
        let (target, seq) = {
            let mut flags = self.lock();
            let flag = flags.entry(id.to_string()).or_default();
            flag.value = !flag.value;
            flag.seq += 1;
            flag.settled = false;
            (flag.value, flag.seq)
        };
        debug!("Toggled {} to {} (seq {})", id, target, seq);

        let result = if target { apply().await } else { undo().await };

        let mut flags = self.lock();
        let flag = flags.entry(id.to_string()).or_default();
        if result.is_ok() && seq >= flag.confirmed_seq {
            flag.confirmed = target;
            flag.confirmed_seq = seq;
        }

        if flag.seq != seq {
            debug!("Discarding stale response for {} (seq {} < {})", id, seq, flag.seq);
            // Once the latest toggle has settled, show what the backend holds
            if flag.settled {
                flag.value = flag.confirmed;
            }
            return ToggleOutcome::Superseded {
                error: result.err().map(|e| format!("{:#}", e)),
            };
        }

        flag.settled = true;
        match result {
            Ok(()) => ToggleOutcome::Confirmed(target),
            Err(e) => {
                warn!("Reverting {} to {}: {:#}", id, flag.confirmed, e);
                flag.value = flag.confirmed;
                ToggleOutcome::Reverted {
                    restored: flag.confirmed,
                    error: format!("{:#}", e),
                }
            }
        }
    }
}
