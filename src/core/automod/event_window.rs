// Keyed sliding windows of timestamped events.
//
// Shared by the spam, duplicate and anti-raid detectors. Entries are pruned
// lazily whenever a key is touched, and `sweep` is a coarse background purge
// that bounds memory for keys nobody touches again.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::hash::Hash;

/// A single event inside a window.
#[derive(Debug, Clone)]
pub struct WindowEntry<T> {
    pub at: DateTime<Utc>,
    pub payload: T,
}

/// Composite key for per-user windows.
#[derive(Hash, Eq, PartialEq, Clone, Copy, Debug)]
pub struct UserKey {
    pub guild_id: u64,
    pub user_id: u64,
}

impl UserKey {
    pub fn new(guild_id: u64, user_id: u64) -> Self {
        Self { guild_id, user_id }
    }
}

/// Map from key to the events recorded for it.
///
/// Every operation on a single key runs under that key's shard lock with no
/// suspension point, so two events for the same key cannot interleave halfway
/// through a record-prune-count sequence.
pub struct EventWindow<K, T = ()>
where
    K: Eq + Hash,
{
    entries: DashMap<K, Vec<WindowEntry<T>>>,
}

impl<K, T> Default for EventWindow<K, T>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<K, T> EventWindow<K, T>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and drop everything older than `window`.
    ///
    /// Returns how many events remain for the key.
    pub fn record(&self, key: K, at: DateTime<Utc>, payload: T, window: Duration) -> usize {
        let mut events = self.entries.entry(key).or_default();
        events.push(WindowEntry { at, payload });
        events.retain(|e| at - e.at < window);
        events.len()
    }

    /// Record an event and, if the matching count reaches `limit`, empty the
    /// key's window in the same step.
    ///
    /// Returns the count that tripped the limit, or `None` while under it.
    pub fn record_and_trip<F>(
        &self,
        key: K,
        at: DateTime<Utc>,
        payload: T,
        window: Duration,
        limit: usize,
        matches: F,
    ) -> Option<usize>
    where
        F: Fn(&T) -> bool,
    {
        let tripped = {
            let mut events = self.entries.entry(key.clone()).or_default();
            events.push(WindowEntry { at, payload });
            events.retain(|e| at - e.at < window);
            let count = events.iter().filter(|e| matches(&e.payload)).count();
            if count >= limit {
                events.clear();
                Some(count)
            } else {
                None
            }
        };

        if tripped.is_some() {
            self.entries.remove_if(&key, |_, events| events.is_empty());
        }
        tripped
    }

    /// Drop events older than `window` relative to `now`.
    ///
    /// The key is removed once its window is empty. Returns the remaining count.
    #[allow(dead_code)]
    pub fn prune(&self, key: &K, now: DateTime<Utc>, window: Duration) -> usize {
        let remaining = match self.entries.get_mut(key) {
            Some(mut events) => {
                events.retain(|e| now - e.at < window);
                events.len()
            }
            None => return 0,
        };

        if remaining == 0 {
            self.entries.remove_if(key, |_, events| events.is_empty());
        }
        remaining
    }

    /// Purge every event older than `max_age`, deleting keys left empty.
    ///
    /// Returns how many keys were removed. Events recorded concurrently may
    /// or may not be seen; the result is approximate.
    pub fn sweep(&self, now: DateTime<Utc>, max_age: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, events| {
            events.retain(|e| now - e.at < max_age);
            !events.is_empty()
        });
        before.saturating_sub(self.entries.len())
    }
}

#[cfg(test)]
impl<K, T> EventWindow<K, T>
where
    K: Eq + Hash,
{
    /// Number of events currently stored for a key (without pruning).
    pub fn len(&self, key: &K) -> usize {
        self.entries.get(key).map(|events| events.len()).unwrap_or(0)
    }

    pub fn key_count(&self) -> usize {
        self.entries.len()
    }
}

/// All in-memory automod state, owned by the automod service.
#[derive(Default)]
pub struct ModerationState {
    /// Message timestamps per user, for spam detection.
    pub messages: EventWindow<UserKey>,
    /// Message contents per user, for duplicate detection.
    pub duplicates: EventWindow<UserKey, String>,
    /// Join timestamps per guild, for anti-raid.
    pub joins: EventWindow<u64>,
}

impl ModerationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Purge all windows older than `max_age`. Returns the number of keys removed.
    pub fn sweep(&self, now: DateTime<Utc>, max_age: Duration) -> usize {
        self.messages.sweep(now, max_age)
            + self.duplicates.sweep(now, max_age)
            + self.joins.sweep(now, max_age)
    }
}
