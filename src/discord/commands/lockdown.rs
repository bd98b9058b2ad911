// Manual channel lock commands.

use crate::discord::automod::lockdown::set_channel_locked;
use crate::discord::{Context, Error};

async fn set_current_channel_locked(ctx: Context<'_>, locked: bool) -> Result<(), Error> {
    let channel = ctx
        .guild_channel()
        .await
        .ok_or("Must be used in a server channel")?;

    set_channel_locked(ctx.http(), &channel, locked).await?;
    tracing::info!(
        channel_id = channel.id.get(),
        moderator_id = ctx.author().id.get(),
        locked,
        "Channel lock changed"
    );

    ctx.say(if locked {
        "🔒 Channel locked!"
    } else {
        "🔓 Channel unlocked!"
    })
    .await?;
    Ok(())
}

/// Stop @everyone from sending messages in this channel.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_CHANNELS")]
pub async fn lock(ctx: Context<'_>) -> Result<(), Error> {
    set_current_channel_locked(ctx, true).await
}

/// Let @everyone send messages in this channel again.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_CHANNELS")]
pub async fn unlock(ctx: Context<'_>) -> Result<(), Error> {
    set_current_channel_locked(ctx, false).await
}
