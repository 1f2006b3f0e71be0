//! Membership cache.
//!
//! In-memory mirror of each identity's activity stats and privilege-flag
//! string. Seeded from the durable store at startup and mutated only by the
//! engine task: activity events bump the counters, flag-change notifications
//! from the directory service rewrite the flag string. The directory remains
//! authoritative; this is the engine's local belief.

use super::UnixTime;
use std::collections::HashMap;

/// Cached state for one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub first_seen: UnixTime,
    pub last_seen: UnixTime,
    pub lines: u64,
    /// Single-character privilege flags, e.g. "VO".
    pub flags: String,
}

/// What the store should do after an activity event.
///
/// Identity rows are flushed in batches of five lines to keep write load
/// down; `shutdown_flush` catches the remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityPersist {
    /// New identity, persist the row now.
    NewRow,
    /// Batch boundary reached, persist the row now.
    Flush,
    /// Counter-only change, persisting can wait.
    Defer,
}

const FLUSH_EVERY_LINES: u64 = 5;

#[derive(Debug, Default)]
pub struct MembershipCache {
    members: HashMap<String, MemberInfo>,
}

impl MembershipCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the cache from persisted identity rows.
    pub fn seed(&mut self, rows: Vec<(String, MemberInfo)>) {
        self.members = rows.into_iter().collect();
    }

    pub fn get(&self, name: &str) -> Option<&MemberInfo> {
        self.members.get(name)
    }

    pub fn flags(&self, name: &str) -> &str {
        self.members.get(name).map(|m| m.flags.as_str()).unwrap_or("")
    }

    /// Whether the member currently holds voting privilege.
    pub fn is_enfranchised(&self, name: &str) -> bool {
        let flags = self.flags(name);
        flags.contains('V') || flags.contains('O')
    }

    /// Number of cached identities currently holding the staff flag.
    pub fn staff_count(&self) -> u32 {
        self.members
            .values()
            .filter(|m| m.flags.contains('O'))
            .count() as u32
    }

    /// Record one observed channel message from `name`.
    pub fn record_activity(&mut self, name: &str, now: UnixTime) -> ActivityPersist {
        match self.members.get_mut(name) {
            Some(member) => {
                member.last_seen = now;
                member.lines += 1;
                if member.lines % FLUSH_EVERY_LINES == 0 {
                    ActivityPersist::Flush
                } else {
                    ActivityPersist::Defer
                }
            }
            None => {
                self.members.insert(
                    name.to_string(),
                    MemberInfo {
                        first_seen: now,
                        last_seen: now,
                        lines: 1,
                        flags: String::new(),
                    },
                );
                ActivityPersist::NewRow
            }
        }
    }

    /// Apply a structured flag delta from the directory service.
    ///
    /// Unknown identities are created on first flag report, with empty
    /// activity history.
    pub fn apply_flag_change(&mut self, name: &str, added: &str, removed: &str, now: UnixTime) {
        let member = self.members.entry(name.to_string()).or_insert(MemberInfo {
            first_seen: now,
            last_seen: now,
            lines: 0,
            flags: String::new(),
        });
        for flag in added.chars() {
            if !member.flags.contains(flag) {
                member.flags.push(flag);
            }
        }
        for flag in removed.chars() {
            member.flags.retain(|f| f != flag);
        }
    }

    /// Replace a member's flag string from a full directory listing.
    pub fn set_flags(&mut self, name: &str, flags: &str, now: UnixTime) {
        let member = self.members.entry(name.to_string()).or_insert(MemberInfo {
            first_seen: now,
            last_seen: now,
            lines: 0,
            flags: String::new(),
        });
        member.flags = flags.to_string();
    }

    /// Snapshot of every cached identity, for the shutdown flush.
    pub fn all(&self) -> impl Iterator<Item = (&str, &MemberInfo)> {
        self.members.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_activity_creates_identity() {
        let mut cache = MembershipCache::new();
        assert_eq!(cache.record_activity("alice", 100), ActivityPersist::NewRow);
        let member = cache.get("alice").unwrap();
        assert_eq!(member.first_seen, 100);
        assert_eq!(member.lines, 1);
    }

    #[test]
    fn flush_every_fifth_line() {
        let mut cache = MembershipCache::new();
        cache.record_activity("alice", 1);
        for n in 2..=4 {
            assert_eq!(cache.record_activity("alice", n), ActivityPersist::Defer);
        }
        assert_eq!(cache.record_activity("alice", 5), ActivityPersist::Flush);
        assert_eq!(cache.get("alice").unwrap().lines, 5);
    }

    #[test]
    fn flag_deltas_are_character_wise() {
        let mut cache = MembershipCache::new();
        cache.apply_flag_change("bob", "VO", "", 10);
        assert_eq!(cache.flags("bob"), "VO");
        cache.apply_flag_change("bob", "b", "O", 11);
        assert_eq!(cache.flags("bob"), "Vb");
        // adding an already-held flag does not duplicate it
        cache.apply_flag_change("bob", "V", "", 12);
        assert_eq!(cache.flags("bob"), "Vb");
    }

    #[test]
    fn enfranchisement_covers_staff() {
        let mut cache = MembershipCache::new();
        cache.set_flags("v", "V", 0);
        cache.set_flags("o", "O", 0);
        cache.set_flags("none", "b", 0);
        assert!(cache.is_enfranchised("v"));
        assert!(cache.is_enfranchised("o"));
        assert!(!cache.is_enfranchised("none"));
        assert!(!cache.is_enfranchised("stranger"));
        assert_eq!(cache.staff_count(), 1);
    }
}
