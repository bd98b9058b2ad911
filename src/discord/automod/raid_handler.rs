// Anti-raid handling for member joins.

use super::lockdown::set_guild_locked;
use super::mod_log::send_automod_log;
use crate::core::automod::{MemberJoin, ModAction};
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

const RAID_REASON: &str = "Anti-raid: Suspicious join pattern";

/// Record a join and respond if it pushes the guild over the raid threshold.
///
/// Returns `true` when the join was treated as part of a raid.
pub async fn handle_member_join(
    ctx: &serenity::Context,
    member: &serenity::Member,
    data: &Data,
) -> Result<bool, Error> {
    if member.user.bot {
        return Ok(false);
    }

    let guild_id = member.guild_id;
    let join = MemberJoin {
        guild_id: guild_id.get(),
        user_id: member.user.id.get(),
        timestamp: chrono::Utc::now(),
    };

    let violation = match data.automod.check_join(&join).await? {
        Some(v) => v,
        None => return Ok(false),
    };

    tracing::warn!(
        guild_id = join.guild_id,
        user_id = join.user_id,
        reason = %violation.reason(),
        "Raid detected"
    );

    match violation.action() {
        ModAction::Kick => {
            if let Err(e) = guild_id
                .kick_with_reason(&ctx.http, member.user.id, RAID_REASON)
                .await
            {
                tracing::error!("Error kicking during raid: {}", e);
            }
        }
        ModAction::Ban => {
            if let Err(e) = guild_id
                .ban_with_reason(&ctx.http, member.user.id, 0, RAID_REASON)
                .await
            {
                tracing::error!("Error banning during raid: {}", e);
            }
        }
        // Message-level actions have nothing to act on for a join
        other => tracing::debug!(action = %other, "No member action for raid"),
    }

    if violation.lockdown() {
        let locked = set_guild_locked(&ctx.http, guild_id, true).await;
        tracing::warn!(guild_id = join.guild_id, locked, "Guild locked down");
    }

    let config = data.automod.get_config(join.guild_id).await?;
    send_automod_log(&ctx.http, config.log_channel, join.user_id, None, &violation).await;

    Ok(true)
}
