// Discord layer - commands and event handlers.
//
// Everything here translates between serenity types and the core services.
// Decisions about what counts as a violation or which AI backend to use live
// in `core`.

#[path = "ai/mod.rs"]
pub mod ai;

#[path = "automod/mod.rs"]
pub mod automod;

#[path = "commands/command_catalog.rs"]
pub mod commands;

use crate::core::ai::AiService;
use crate::core::automod::AutomodService;
use crate::core::rate_limit::CommandRateLimiter;
use crate::core::warnings::WarningService;
use crate::infra::automod::JsonAutomodConfigStore;
use crate::infra::warnings::JsonWarningStore;
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared state handed to every command and event.
pub struct Data {
    pub automod: Arc<AutomodService<JsonAutomodConfigStore>>,
    pub warnings: Arc<WarningService<JsonWarningStore>>,
    pub ai: Arc<AiService>,
    pub rate_limiter: Arc<CommandRateLimiter>,
    /// Always treated as elevated by the AI rate limiter.
    pub owner_id: Option<u64>,
    /// Channel messages fetched as context for AI replies.
    pub max_history: u8,
}
