// The core module contains all business logic.
// Each feature gets its own submodule. Nothing in here knows about Discord.

#[path = "ai/mod.rs"]
pub mod ai;

#[path = "automod/mod.rs"]
pub mod automod;

#[path = "rate_limit/mod.rs"]
pub mod rate_limit;

#[path = "warnings/warning_service.rs"]
pub mod warnings;
