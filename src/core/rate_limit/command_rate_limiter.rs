// Per-user rate limiting for AI chat requests.
//
// Fixed windows that reset wholesale once they expire, unlike the sliding
// automod windows: the first request after expiry starts a brand new window.

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per window for regular members.
    pub messages: u32,
    /// Requests per window for admins and the bot owner.
    pub elevated_messages: u32,
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            messages: 5,
            elevated_messages: 15,
            window_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: u32 },
    /// Rejected; the window resets in this many seconds (rounded up).
    Limited { reset_in_secs: u64 },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct FixedWindow {
    count: u32,
    reset_at: DateTime<Utc>,
}

pub struct CommandRateLimiter {
    config: RateLimitConfig,
    windows: DashMap<u64, FixedWindow>,
}

impl CommandRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    pub fn check(&self, user_id: u64, elevated: bool) -> RateLimitDecision {
        self.check_at(user_id, elevated, Utc::now())
    }

    /// Count one request for `user_id` at `now`.
    pub fn check_at(&self, user_id: u64, elevated: bool, now: DateTime<Utc>) -> RateLimitDecision {
        let limit = if elevated {
            self.config.elevated_messages
        } else {
            self.config.messages
        };
        let window = Duration::milliseconds(i64::try_from(self.config.window_ms).unwrap_or(i64::MAX));

        match self.windows.entry(user_id) {
            Entry::Vacant(vacant) => {
                vacant.insert(FixedWindow {
                    count: 1,
                    reset_at: now + window,
                });
                RateLimitDecision::Allowed {
                    remaining: limit.saturating_sub(1),
                }
            }
            Entry::Occupied(mut occupied) => {
                let state = occupied.get_mut();

                if now > state.reset_at {
                    state.count = 1;
                    state.reset_at = now + window;
                    return RateLimitDecision::Allowed {
                        remaining: limit.saturating_sub(1),
                    };
                }

                if state.count >= limit {
                    let millis_left = (state.reset_at - now).num_milliseconds().max(0) as u64;
                    return RateLimitDecision::Limited {
                        reset_in_secs: millis_left.div_ceil(1000),
                    };
                }

                state.count += 1;
                RateLimitDecision::Allowed {
                    remaining: limit - state.count,
                }
            }
        }
    }

    /// Forget windows that have already expired. Returns how many were dropped.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, state| now <= state.reset_at);
        before.saturating_sub(self.windows.len())
    }
}

impl Default for CommandRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
    }

    #[test]
    fn allows_exactly_the_limit_then_rejects() {
        let limiter = CommandRateLimiter::default();

        for i in 0..5 {
            let decision = limiter.check_at(1, false, at(i * 1_000));
            assert_eq!(
                decision,
                RateLimitDecision::Allowed {
                    remaining: 4 - i as u32
                }
            );
        }

        match limiter.check_at(1, false, at(10_000)) {
            RateLimitDecision::Limited { reset_in_secs } => {
                assert!(reset_in_secs > 0);
                assert!(reset_in_secs <= 60);
                assert_eq!(reset_in_secs, 50);
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn reset_in_rounds_up() {
        let limiter = CommandRateLimiter::default();
        for _ in 0..5 {
            limiter.check_at(1, false, at(0));
        }
        // 59.5 seconds left rounds up to 60
        assert_eq!(
            limiter.check_at(1, false, at(500)),
            RateLimitDecision::Limited { reset_in_secs: 60 }
        );
    }

    #[test]
    fn window_resets_wholesale_after_expiry() {
        let limiter = CommandRateLimiter::default();
        for _ in 0..6 {
            limiter.check_at(1, false, at(0));
        }

        // Still inside the window at exactly the reset time
        assert!(!limiter.check_at(1, false, at(60_000)).is_allowed());

        for i in 0..5 {
            assert!(
                limiter.check_at(1, false, at(60_001 + i)).is_allowed(),
                "request {} in the new window",
                i
            );
        }
        assert!(!limiter.check_at(1, false, at(60_010)).is_allowed());
    }

    #[test]
    fn elevated_users_get_a_higher_limit() {
        let limiter = CommandRateLimiter::default();
        for i in 0..15 {
            assert!(limiter.check_at(9, true, at(i)).is_allowed());
        }
        assert!(!limiter.check_at(9, true, at(20)).is_allowed());
    }

    #[test]
    fn users_are_tracked_separately() {
        let limiter = CommandRateLimiter::default();
        for _ in 0..5 {
            limiter.check_at(1, false, at(0));
        }
        assert!(!limiter.check_at(1, false, at(1)).is_allowed());
        assert!(limiter.check_at(2, false, at(1)).is_allowed());
    }

    #[test]
    fn purge_drops_only_expired_windows() {
        let limiter = CommandRateLimiter::default();
        limiter.check_at(1, false, at(0));
        limiter.check_at(2, false, at(30_000));

        assert_eq!(limiter.purge_expired(at(70_000)), 1);
        assert_eq!(limiter.purge_expired(at(70_000)), 0);
        // User 2 still counts against the same window
        assert_eq!(
            limiter.check_at(2, false, at(70_001)),
            RateLimitDecision::Allowed { remaining: 3 }
        );
    }
}
