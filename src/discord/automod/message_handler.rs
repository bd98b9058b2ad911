// Automod for guild messages - translates core violations to Discord actions.

use super::mod_log::send_automod_log;
use crate::core::automod::{InboundMessage, ModAction, Violation};
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

/// Check a message against the guild's automod rules and act on it.
///
/// Returns `true` when a violation was found, so callers can skip any further
/// processing of the message.
pub async fn handle_message(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
) -> Result<bool, Error> {
    if msg.author.bot {
        return Ok(false);
    }

    // Only check guild messages
    let guild_id = match msg.guild_id {
        Some(id) => id,
        None => return Ok(false),
    };

    let author_roles: Vec<u64> = msg
        .member
        .as_ref()
        .map(|m| m.roles.iter().map(|r| r.get()).collect())
        .unwrap_or_default();

    let inbound = InboundMessage {
        guild_id: guild_id.get(),
        channel_id: msg.channel_id.get(),
        author_id: msg.author.id.get(),
        author_roles,
        content: msg.content.clone(),
        user_mentions: msg.mentions.len() as u32,
        role_mentions: msg.mention_roles.len() as u32,
        timestamp: chrono::Utc::now(),
    };

    let violation = match data.automod.check_message(&inbound).await? {
        Some(v) => v,
        None => return Ok(false),
    };

    tracing::info!(
        guild_id = inbound.guild_id,
        user_id = inbound.author_id,
        violation = %violation.kind(),
        action = %violation.action(),
        "Auto-mod violation"
    );

    apply_violation(ctx, msg, guild_id, &violation, data).await;

    let config = data.automod.get_config(inbound.guild_id).await?;
    send_automod_log(
        &ctx.http,
        config.log_channel,
        inbound.author_id,
        Some(inbound.channel_id),
        &violation,
    )
    .await;

    Ok(true)
}

/// Carry out the violation's action. Each step logs its own failure; a
/// missing permission shouldn't stop the mod log from being written.
///
/// Delete and a successful mute also remove the triggering message.
async fn apply_violation(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    guild_id: serenity::GuildId,
    violation: &Violation,
    data: &Data,
) {
    let reason = violation.reason();
    let action = violation.action();

    let applied = match action {
        ModAction::Delete => true,

        ModAction::Warn => {
            let bot_id = ctx.cache.current_user().id.get();
            match data
                .warnings
                .add_warning(
                    guild_id.get(),
                    msg.author.id.get(),
                    &format!("Auto-mod: {}", reason),
                    bot_id,
                    None,
                )
                .await
            {
                Ok(count) => {
                    let notice = format!(
                        "⚠️ <@{}> {} (warning #{})",
                        msg.author.id, reason, count
                    );
                    if let Err(e) = msg.channel_id.say(&ctx.http, notice).await {
                        tracing::warn!("Failed to send warning notice: {}", e);
                    }
                    true
                }
                Err(e) => {
                    tracing::error!("Failed to record automod warning: {}", e);
                    false
                }
            }
        }

        ModAction::Mute => timeout_author(ctx, msg, guild_id, violation, &reason).await,

        ModAction::Kick => match guild_id
            .kick_with_reason(&ctx.http, msg.author.id, &reason)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to kick user: {}", e);
                false
            }
        },

        ModAction::Ban => match guild_id
            .ban_with_reason(&ctx.http, msg.author.id, 0, &reason)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to ban user: {}", e);
                false
            }
        },
    };

    if applied && action.removes_message() {
        if let Err(e) = msg.delete(&ctx.http).await {
            tracing::warn!("Failed to delete message ({}): {}", reason, e);
        }
    }
}

/// Time the author out for the violation's duration. Returns whether the
/// timeout was applied.
async fn timeout_author(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    guild_id: serenity::GuildId,
    violation: &Violation,
    reason: &str,
) -> bool {
    // A mute without a duration has nothing to apply
    let Some(duration) = violation.duration() else {
        tracing::debug!("Mute violation without duration, skipping timeout");
        return false;
    };

    let timeout_until = match serenity::Timestamp::from_unix_timestamp(
        chrono::Utc::now().timestamp() + duration.as_secs() as i64,
    ) {
        Ok(ts) => ts,
        Err(e) => {
            tracing::error!("Failed to create timeout timestamp: {}", e);
            return false;
        }
    };

    if let Err(e) = guild_id
        .edit_member(
            &ctx.http,
            msg.author.id,
            serenity::EditMember::new()
                .disable_communication_until_datetime(timeout_until)
                .audit_log_reason(reason),
        )
        .await
    {
        tracing::error!("Failed to timeout user: {}", e);
        return false;
    }

    let timeout_msg = format!(
        "🔇 <@{}> has been timed out for {} minutes: {}",
        msg.author.id,
        duration.as_secs().div_ceil(60),
        reason
    );
    if let Err(e) = msg.channel_id.say(&ctx.http, &timeout_msg).await {
        tracing::warn!("Failed to send timeout notification: {}", e);
    }
    true
}
