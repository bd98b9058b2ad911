// Mod-log embeds for automatic actions.

use crate::core::automod::Violation;
use poise::serenity_prelude as serenity;

const LOG_COLOR: u32 = 0xFF0000;

/// Post an automod action to the guild's log channel, if one is set.
/// Failures are logged and swallowed; the action itself already happened.
pub async fn send_automod_log(
    http: &serenity::Http,
    log_channel: Option<u64>,
    user_id: u64,
    channel_id: Option<u64>,
    violation: &Violation,
) {
    let Some(log_channel) = log_channel else {
        return;
    };

    let mut embed = serenity::CreateEmbed::new()
        .title("🛡️ Auto-Moderation Action")
        .color(LOG_COLOR)
        .field("User", format!("<@{}> ({})", user_id, user_id), true)
        .field("Violation", violation.kind().to_string(), true)
        .field("Action", violation.action().to_string(), true)
        .field("Reason", violation.reason(), false)
        .timestamp(serenity::Timestamp::now());

    if let Some(channel_id) = channel_id {
        embed = embed.field("Channel", format!("<#{}>", channel_id), false);
    }
    if violation.lockdown() {
        embed = embed.field("Lockdown", "🔒 Text channels locked for @everyone", false);
    }

    if let Err(e) = serenity::ChannelId::new(log_channel)
        .send_message(http, serenity::CreateMessage::new().embed(embed))
        .await
    {
        tracing::warn!(log_channel, "Failed to send automod log: {}", e);
    }
}
