// Model cooldown registry.
//
// When a model answers with a rate-limit error it is parked until an expiry
// instant. Stale entries are removed lazily when checked; there is no
// background eviction since the map is bounded by the number of models.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Cooldown used when the provider gives no retry-after hint.
pub const DEFAULT_COOLDOWN_SECS: u64 = 60 * 60;

/// Provider retry-after hints above this are clamped.
const MAX_RETRY_AFTER_SECS: u64 = 24 * 60 * 60;

pub struct ModelCooldowns {
    until: DashMap<String, DateTime<Utc>>,
    default_cooldown: Duration,
}

impl Default for ModelCooldowns {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelCooldowns {
    pub fn new() -> Self {
        Self::with_default_cooldown(Duration::seconds(DEFAULT_COOLDOWN_SECS as i64))
    }

    pub fn with_default_cooldown(default_cooldown: Duration) -> Self {
        Self {
            until: DashMap::new(),
            default_cooldown,
        }
    }

    /// True while `now` is before the stored expiry. An expired entry is
    /// deleted as a side effect.
    pub fn is_limited_at(&self, model: &str, now: DateTime<Utc>) -> bool {
        if self
            .until
            .remove_if(model, |_, expiry| now >= *expiry)
            .is_some()
        {
            return false;
        }
        self.until.contains_key(model)
    }

    /// Park `model` for `retry_after_secs`, or the default cooldown when no
    /// (or a zero) hint is given. Returns the expiry.
    pub fn mark_limited_at(
        &self,
        model: &str,
        retry_after_secs: Option<u64>,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let cooldown = match retry_after_secs {
            Some(secs) if secs > 0 => Duration::seconds(secs.min(MAX_RETRY_AFTER_SECS) as i64),
            _ => self.default_cooldown,
        };
        let expiry = now + cooldown;
        self.until.insert(model.to_string(), expiry);

        tracing::info!(
            model,
            cooldown_minutes = (cooldown.num_seconds() + 59) / 60,
            "Model marked as rate limited"
        );
        expiry
    }

    /// Clear a model's cooldown early.
    #[allow(dead_code)]
    pub fn reset(&self, model: &str) {
        self.until.remove(model);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn unknown_model_is_not_limited() {
        let cooldowns = ModelCooldowns::new();
        assert!(!cooldowns.is_limited_at("llama", at(0)));
    }

    #[test]
    fn retry_after_controls_expiry() {
        let cooldowns = ModelCooldowns::new();
        let expiry = cooldowns.mark_limited_at("llama", Some(30), at(0));

        assert_eq!(expiry, at(30));
        assert!(cooldowns.is_limited_at("llama", at(29)));
        assert!(!cooldowns.is_limited_at("llama", at(30)));
    }

    #[test]
    fn missing_or_zero_retry_after_uses_default() {
        let cooldowns = ModelCooldowns::new();
        assert_eq!(cooldowns.mark_limited_at("a", None, at(0)), at(3_600));
        assert_eq!(cooldowns.mark_limited_at("b", Some(0), at(0)), at(3_600));
    }

    #[test]
    fn expired_entries_are_removed_lazily() {
        let cooldowns = ModelCooldowns::new();
        cooldowns.mark_limited_at("llama", Some(10), at(0));

        assert_eq!(cooldowns.until.len(), 1);
        assert!(!cooldowns.is_limited_at("llama", at(10)));
        assert!(cooldowns.until.is_empty());
    }

    #[test]
    fn reset_clears_cooldown() {
        let cooldowns = ModelCooldowns::new();
        cooldowns.mark_limited_at("llama", None, at(0));
        cooldowns.reset("llama");
        assert!(!cooldowns.is_limited_at("llama", at(1)));
    }

    #[test]
    fn huge_retry_after_is_clamped() {
        let cooldowns = ModelCooldowns::new();
        let expiry = cooldowns.mark_limited_at("a", Some(u64::MAX), at(0));
        assert_eq!(expiry, at(24 * 60 * 60));
    }
}
