pub mod ai_service;
pub mod context;
pub mod cooldown;
pub mod models;

pub use ai_service::{AiProvider, AiService, ProviderTier};
pub use context::{build_context, strip_mention, ContextMessage};
pub use models::{AiMessage, GenerationParams, ProviderError};
