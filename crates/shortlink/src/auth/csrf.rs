//! Pending OAuth login attempts keyed by their anti-forgery state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::debug;
use rand::RngCore;
use tokio::task::JoinHandle;

/// Random bytes per state token. Hex encoding doubles the length.
const STATE_BYTES: usize = 32;

#[derive(Debug)]
struct PendingAttempt {
    originating_path: String,
    created_at: Instant,
}

/// Single-use state tokens mapped to the path the login started from.
///
/// Each token can be completed at most once; entries older than `max_age`
/// are treated as unknown and are purged by [`CsrfStateStore::purge_expired`].
#[derive(Debug)]
pub struct CsrfStateStore {
    pending: DashMap<String, PendingAttempt>,
    max_age: Duration,
}

impl CsrfStateStore {
    pub fn new(max_age: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            max_age,
        }
    }

    /// Register a new login attempt and return its state token.
    pub fn begin(&self, originating_path: &str) -> String {
        loop {
            let state = random_state();
            if let Entry::Vacant(slot) = self.pending.entry(state.clone()) {
                slot.insert(PendingAttempt {
                    originating_path: originating_path.to_string(),
                    created_at: Instant::now(),
                });
                return state;
            }
        }
    }

    /// Consume `state`, returning the originating path.
    ///
    /// Returns `None` for unknown, already completed or expired states.
    pub fn complete(&self, state: &str) -> Option<String> {
        let (_, attempt) = self.pending.remove(state)?;
        if attempt.created_at.elapsed() > self.max_age {
            debug!("login state expired before completion");
            return None;
        }
        Some(attempt.originating_path)
    }

    /// Drop every attempt older than `max_age`. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|_, attempt| attempt.created_at.elapsed() <= self.max_age);
        before.saturating_sub(self.pending.len())
    }

    /// Number of pending attempts.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Periodically purge expired attempts until the task is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let purged = store.purge_expired();
                if purged > 0 {
                    debug!("purged {} expired login attempts", purged);
                }
            }
        })
    }
}

fn random_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
