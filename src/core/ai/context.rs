// =============================================================================
// CONVERSATION CONTEXT
// =============================================================================
//
// Turns recent channel messages into the context sent to the AI. Messages by
// the bot become "assistant" turns; everyone else is a "user" turn prefixed
// with their name so the model can tell speakers apart.

use super::models::AiMessage;

/// A channel message, stripped of platform types.
#[derive(Debug, Clone)]
pub struct ContextMessage {
    pub author_name: String,
    pub content: String,
    /// Written by the bot itself.
    pub from_bot: bool,
}

impl ContextMessage {
    pub fn new(author_name: impl Into<String>, content: impl Into<String>, from_bot: bool) -> Self {
        Self {
            author_name: author_name.into(),
            content: content.into(),
            from_bot,
        }
    }

    /// Converts to an AiMessage for the API
    pub fn to_ai_message(&self) -> AiMessage {
        if self.from_bot {
            AiMessage::assistant(self.content.clone())
        } else {
            AiMessage::user(format!("{}: {}", self.author_name, self.content))
        }
    }
}

/// Remove `<@id>` and `<@!id>` mentions of the bot and trim the result.
pub fn strip_mention(content: &str, bot_id: u64) -> String {
    content
        .replace(&format!("<@{}>", bot_id), "")
        .replace(&format!("<@!{}>", bot_id), "")
        .trim()
        .to_string()
}

/// Build the AI context from messages in chronological order. Empty messages
/// (embeds, attachments only) are skipped.
pub fn build_context(messages: &[ContextMessage]) -> Vec<AiMessage> {
    messages
        .iter()
        .filter(|m| !m.content.trim().is_empty())
        .map(ContextMessage::to_ai_message)
        .collect()
}
