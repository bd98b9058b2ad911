pub mod command_rate_limiter;

pub use command_rate_limiter::{CommandRateLimiter, RateLimitConfig, RateLimitDecision};
