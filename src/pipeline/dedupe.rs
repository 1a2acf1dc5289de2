//! Recently-seen transaction hashes
//!
//! Feeds re-deliver the same pending transaction after a reconnect or a
//! replacement broadcast. A hash seen within the window is reacted to once.

use alloy::primitives::TxHash;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub struct RecentHashes {
    window: Duration,
    seen: HashMap<TxHash, Instant>,
    last_prune: Option<Instant>,
}

impl RecentHashes {
    pub fn new(window: Duration) -> Self {
        Self { window, seen: HashMap::new(), last_prune: None }
    }

    /// True the first time `hash` is seen within the window. A zero window
    /// disables suppression.
    pub fn first_sighting(&mut self, hash: TxHash, now: Instant) -> bool {
        if self.window.is_zero() {
            return true;
        }

        self.prune(now);

        match self.seen.get(&hash) {
            Some(at) if now.duration_since(*at) < self.window => false,
            _ => {
                self.seen.insert(hash, now);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Drop expired entries at most once per window
    fn prune(&mut self, now: Instant) {
        let due = match self.last_prune {
            Some(at) => now.duration_since(at) >= self.window,
            None => true,
        };
        if due {
            let window = self.window;
            self.seen.retain(|_, at| now.duration_since(*at) < window);
            self.last_prune = Some(now);
        }
    }
}
