//! Ban registry
//!
//! Per-recipient sets of blocked sender names. Keys and members are
//! display names, compared exactly; two sessions sharing a name share
//! one entry.

use std::collections::{HashMap, HashSet};

/// Recipient display name -> blocked sender display names
#[derive(Debug, Default)]
pub struct BanRegistry {
    blocked: HashMap<String, HashSet<String>>,
}

impl BanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block `target` for `recipient`, creating the entry if needed
    pub fn ban(&mut self, recipient: &str, target: &str) {
        self.blocked
            .entry(recipient.to_string())
            .or_default()
            .insert(target.to_string());
    }

    /// Lift a block
    ///
    /// Returns true only if `recipient` had an entry containing `target`.
    pub fn unban(&mut self, recipient: &str, target: &str) -> bool {
        self.blocked
            .get_mut(recipient)
            .is_some_and(|set| set.remove(target))
    }

    /// Whether `recipient` has blocked `sender`
    pub fn is_blocked(&self, recipient: &str, sender: &str) -> bool {
        self.blocked
            .get(recipient)
            .is_some_and(|set| set.contains(sender))
    }
}
