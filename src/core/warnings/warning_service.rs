// Warnings - moderator and automod warnings with optional expiry.
//
// Warnings are kept oldest to newest per (guild, user). Expired warnings are
// dropped the next time a user's list is read, and the pruned list is written
// back so the file doesn't grow forever.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;

// ============================================================================
// DATA TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub id: u64,
    pub reason: String,
    pub moderator_id: u64,
    pub timestamp: DateTime<Utc>,
    /// `None` means the warning never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Warning {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expiry) => expiry > now,
            None => true,
        }
    }
}

#[derive(Debug, Error)]
pub enum WarningError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Invalid duration '{0}', use a number followed by s, m, h or d (e.g. 7d)")]
    InvalidDuration(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

#[async_trait]
pub trait WarningStore: Send + Sync {
    /// All stored warnings for a user, oldest first. Empty when unknown.
    async fn get_warnings(&self, guild_id: u64, user_id: u64)
        -> Result<Vec<Warning>, WarningError>;

    /// Replace a user's warning list.
    async fn save_warnings(
        &self,
        guild_id: u64,
        user_id: u64,
        warnings: Vec<Warning>,
    ) -> Result<(), WarningError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct WarningService<S: WarningStore> {
    store: S,
    next_id: AtomicU64,
    /// Held for every load-modify-save of a warning list.
    write_gate: Mutex<()>,
}

impl<S: WarningStore> WarningService<S> {
    pub fn new(store: S) -> Self {
        // Seeded from the clock so ids stay unique across restarts
        let seed = Utc::now().timestamp_millis().max(0) as u64;
        Self {
            store,
            next_id: AtomicU64::new(seed),
            write_gate: Mutex::new(()),
        }
    }

    pub async fn add_warning(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
        moderator_id: u64,
        expires_in: Option<Duration>,
    ) -> Result<usize, WarningError> {
        self.add_warning_at(guild_id, user_id, reason, moderator_id, expires_in, Utc::now())
            .await
    }

    /// Record a warning and return the user's active warning count,
    /// including the new one.
    pub async fn add_warning_at(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
        moderator_id: u64,
        expires_in: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Result<usize, WarningError> {
        let _guard = self.write_gate.lock().await;
        let mut warnings = self.store.get_warnings(guild_id, user_id).await?;
        warnings.retain(|w| w.is_active_at(now));

        warnings.push(Warning {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            reason: reason.to_string(),
            moderator_id,
            timestamp: now,
            expires_at: expires_in.map(|d| now + d),
        });
        let count = warnings.len();

        self.store.save_warnings(guild_id, user_id, warnings).await?;
        tracing::info!(guild_id, user_id, moderator_id, count, "Warning recorded");
        Ok(count)
    }

    pub async fn active_warnings(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Vec<Warning>, WarningError> {
        self.active_warnings_at(guild_id, user_id, Utc::now()).await
    }

    /// Unexpired warnings, oldest first. Persists the list when anything
    /// expired.
    pub async fn active_warnings_at(
        &self,
        guild_id: u64,
        user_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Warning>, WarningError> {
        let _guard = self.write_gate.lock().await;
        let warnings = self.store.get_warnings(guild_id, user_id).await?;
        let total = warnings.len();
        let active: Vec<Warning> = warnings.into_iter().filter(|w| w.is_active_at(now)).collect();

        if active.len() != total {
            self.store
                .save_warnings(guild_id, user_id, active.clone())
                .await?;
        }
        Ok(active)
    }

    /// Remove one warning by id. Returns false when it didn't exist.
    pub async fn remove_warning(
        &self,
        guild_id: u64,
        user_id: u64,
        warning_id: u64,
    ) -> Result<bool, WarningError> {
        let _guard = self.write_gate.lock().await;
        let mut warnings = self.store.get_warnings(guild_id, user_id).await?;
        let before = warnings.len();
        warnings.retain(|w| w.id != warning_id);

        if warnings.len() == before {
            return Ok(false);
        }
        self.store.save_warnings(guild_id, user_id, warnings).await?;
        Ok(true)
    }

    /// Drop every warning for a user. Returns how many there were.
    pub async fn clear_warnings(&self, guild_id: u64, user_id: u64) -> Result<usize, WarningError> {
        let _guard = self.write_gate.lock().await;
        let warnings = self.store.get_warnings(guild_id, user_id).await?;
        if warnings.is_empty() {
            return Ok(0);
        }

        self.store.save_warnings(guild_id, user_id, Vec::new()).await?;
        Ok(warnings.len())
    }
}

// ============================================================================
// DURATION HELPERS
// ============================================================================

/// Parse durations like `30s`, `10m`, `12h`, `7d`.
pub fn parse_duration(input: &str) -> Result<Duration, WarningError> {
    let input = input.trim();
    let invalid = || WarningError::InvalidDuration(input.to_string());

    let unit = input.chars().last().ok_or_else(invalid)?;
    let value: i64 = input[..input.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| invalid())?;
    if value <= 0 {
        return Err(invalid());
    }

    let seconds = match unit {
        's' => value,
        'm' => value.checked_mul(60).ok_or_else(invalid)?,
        'h' => value.checked_mul(60 * 60).ok_or_else(invalid)?,
        'd' => value.checked_mul(24 * 60 * 60).ok_or_else(invalid)?,
        _ => return Err(invalid()),
    };
    Duration::try_seconds(seconds).ok_or_else(invalid)
}

/// Largest two units, e.g. "7d 0h" or "45m 10s".
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.num_seconds().max(0);
    let (days, hours, minutes, seconds) = (secs / 86_400, secs / 3_600 % 24, secs / 60 % 60, secs % 60);

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use dashmap::DashMap;

    #[derive(Default)]
    struct MockWarningStore {
        warnings: DashMap<(u64, u64), Vec<Warning>>,
        saves: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl WarningStore for MockWarningStore {
        async fn get_warnings(
            &self,
            guild_id: u64,
            user_id: u64,
        ) -> Result<Vec<Warning>, WarningError> {
            let warnings = self
                .warnings
                .get(&(guild_id, user_id))
                .map(|w| w.clone())
                .unwrap_or_default();
            tokio::task::yield_now().await;
            Ok(warnings)
        }

        async fn save_warnings(
            &self,
            guild_id: u64,
            user_id: u64,
            warnings: Vec<Warning>,
        ) -> Result<(), WarningError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.warnings.insert((guild_id, user_id), warnings);
            Ok(())
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn add_returns_active_count() {
        let service = WarningService::new(MockWarningStore::default());

        assert_eq!(service.add_warning_at(1, 2, "spam", 9, None, t0()).await.unwrap(), 1);
        assert_eq!(service.add_warning_at(1, 2, "caps", 9, None, t0()).await.unwrap(), 2);
        assert_eq!(service.add_warning_at(1, 3, "spam", 9, None, t0()).await.unwrap(), 1);

        let warnings = service.active_warnings_at(1, 2, t0()).await.unwrap();
        assert_eq!(warnings[0].reason, "spam");
        assert_eq!(warnings[1].reason, "caps");
        assert_ne!(warnings[0].id, warnings[1].id);
    }

    #[tokio::test]
    async fn expired_warnings_are_pruned_on_read() {
        let store = MockWarningStore::default();
        let service = WarningService::new(store);

        service
            .add_warning_at(1, 2, "temp", 9, Some(Duration::hours(1)), t0())
            .await
            .unwrap();
        service.add_warning_at(1, 2, "perm", 9, None, t0()).await.unwrap();

        assert_eq!(service.active_warnings_at(1, 2, t0()).await.unwrap().len(), 2);

        let later = t0() + Duration::hours(1);
        let active = service.active_warnings_at(1, 2, later).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].reason, "perm");
        assert_eq!(service.store.warnings.get(&(1, 2)).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reading_without_expiry_does_not_write() {
        let service = WarningService::new(MockWarningStore::default());
        service.add_warning_at(1, 2, "perm", 9, None, t0()).await.unwrap();
        let saves = service.store.saves.load(Ordering::SeqCst);

        service.active_warnings_at(1, 2, t0()).await.unwrap();
        assert_eq!(service.store.saves.load(Ordering::SeqCst), saves);
    }

    #[tokio::test]
    async fn remove_by_id() {
        let service = WarningService::new(MockWarningStore::default());
        service.add_warning_at(1, 2, "a", 9, None, t0()).await.unwrap();
        service.add_warning_at(1, 2, "b", 9, None, t0()).await.unwrap();
        let id = service.active_warnings_at(1, 2, t0()).await.unwrap()[0].id;

        assert!(service.remove_warning(1, 2, id).await.unwrap());
        assert!(!service.remove_warning(1, 2, id).await.unwrap());

        let left = service.active_warnings_at(1, 2, t0()).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].reason, "b");
    }

    #[tokio::test]
    async fn clear_returns_previous_count() {
        let service = WarningService::new(MockWarningStore::default());
        assert_eq!(service.clear_warnings(1, 2).await.unwrap(), 0);

        service.add_warning_at(1, 2, "a", 9, None, t0()).await.unwrap();
        service.add_warning_at(1, 2, "b", 9, None, t0()).await.unwrap();
        assert_eq!(service.clear_warnings(1, 2).await.unwrap(), 2);
        assert!(service.active_warnings_at(1, 2, t0()).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_warnings_are_all_kept() {
        let service = std::sync::Arc::new(WarningService::new(MockWarningStore::default()));

        let mut handles = Vec::new();
        for i in 0..64 {
            let service = std::sync::Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                service
                    .add_warning_at(1, 2, &format!("warning {}", i), 9, None, t0())
                    .await
                    .unwrap()
            }));
        }
        let mut counts = Vec::new();
        for handle in handles {
            counts.push(handle.await.unwrap());
        }
        counts.sort_unstable();

        assert_eq!(counts, (1..=64).collect::<Vec<_>>());
        assert_eq!(service.active_warnings_at(1, 2, t0()).await.unwrap().len(), 64);
    }

    #[test]
    fn parses_durations() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::seconds(30));
        assert_eq!(parse_duration("10m").unwrap(), Duration::minutes(10));
        assert_eq!(parse_duration("12h").unwrap(), Duration::hours(12));
        assert_eq!(parse_duration(" 7d ").unwrap(), Duration::days(7));

        for bad in ["", "d", "7", "7w", "-1d", "0h", "1.5h"] {
            assert!(parse_duration(bad).is_err(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(Duration::days(7)), "7d 0h");
        assert_eq!(format_duration(Duration::minutes(90)), "1h 30m");
        assert_eq!(format_duration(Duration::seconds(75)), "1m 15s");
        assert_eq!(format_duration(Duration::seconds(5)), "5s");
    }
}
