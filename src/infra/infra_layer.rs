// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "ai/mod.rs"]
pub mod ai;

#[path = "automod/json_store.rs"]
pub mod automod;

#[path = "storage/mod.rs"]
pub mod storage;

#[path = "warnings/json_store.rs"]
pub mod warnings;
