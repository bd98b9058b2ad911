// Auto-moderation slash commands.
//
// Thin wrappers around `AutomodService`: parse options, call the service,
// format the result.

use crate::core::automod::{AutomodConfig, AutomodError, AutomodFeature};
use crate::discord::automod::lockdown::set_guild_locked;
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum FeatureChoice {
    #[name = "All (master switch)"]
    All,
    #[name = "Spam"]
    Spam,
    #[name = "Mass mentions"]
    MassMention,
    #[name = "Caps lock"]
    Caps,
    #[name = "Link spam"]
    LinkSpam,
    #[name = "Invite links"]
    Invites,
    #[name = "Duplicate messages"]
    Duplicate,
    #[name = "Anti-raid"]
    AntiRaid,
}

impl From<FeatureChoice> for AutomodFeature {
    fn from(value: FeatureChoice) -> Self {
        match value {
            FeatureChoice::All => AutomodFeature::All,
            FeatureChoice::Spam => AutomodFeature::Spam,
            FeatureChoice::MassMention => AutomodFeature::MassMention,
            FeatureChoice::Caps => AutomodFeature::Caps,
            FeatureChoice::LinkSpam => AutomodFeature::LinkSpam,
            FeatureChoice::Invites => AutomodFeature::Invites,
            FeatureChoice::Duplicate => AutomodFeature::Duplicate,
            FeatureChoice::AntiRaid => AutomodFeature::AntiRaid,
        }
    }
}

/// Auto-moderation settings for this server.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_GUILD",
    subcommands(
        "status",
        "toggle",
        "ignore_role",
        "ignore_channel",
        "log_channel",
        "unlock"
    )
)]
pub async fn automod(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "✅"
    } else {
        "❌"
    }
}

fn status_embed(config: &AutomodConfig) -> serenity::CreateEmbed {
    let mut embed = serenity::CreateEmbed::new()
        .title("🛡️ Auto-Moderation")
        .color(if config.enabled { 0x00FF00 } else { 0xFF0000 })
        .field("Master switch", on_off(config.enabled), false);

    let rules: Vec<(&str, Option<String>)> = vec![
        (
            "Spam",
            config.spam.as_ref().map(|r| {
                format!(
                    "{} {} msgs / {}s → {}",
                    on_off(r.enabled),
                    r.message_limit,
                    r.time_window_ms / 1000,
                    r.action
                )
            }),
        ),
        (
            "Mass mentions",
            config
                .mass_mention
                .as_ref()
                .map(|r| format!("{} {} mentions → {}", on_off(r.enabled), r.limit, r.action)),
        ),
        (
            "Caps",
            config.caps.as_ref().map(|r| {
                format!(
                    "{} {}% of {}+ chars → {}",
                    on_off(r.enabled),
                    r.percentage,
                    r.min_length,
                    r.action
                )
            }),
        ),
        (
            "Links",
            config
                .link_spam
                .as_ref()
                .map(|r| format!("{} {} links → {}", on_off(r.enabled), r.limit, r.action)),
        ),
        (
            "Invites",
            config
                .invites
                .as_ref()
                .map(|r| format!("{} → {}", on_off(r.enabled), r.action)),
        ),
        (
            "Duplicates",
            config.duplicate.as_ref().map(|r| {
                format!(
                    "{} {} repeats / {}s → {}",
                    on_off(r.enabled),
                    r.limit,
                    r.time_window_ms / 1000,
                    r.action
                )
            }),
        ),
        (
            "Anti-raid",
            config.anti_raid.as_ref().map(|r| {
                format!(
                    "{} {} joins / {}s → {}{}",
                    on_off(r.enabled),
                    r.join_limit,
                    r.time_window_ms / 1000,
                    r.action,
                    if r.lockdown { " + lockdown" } else { "" }
                )
            }),
        ),
    ];

    for (name, value) in rules {
        embed = embed.field(name, value.unwrap_or_else(|| "not configured".to_string()), true);
    }

    let ignored_roles = if config.ignored_roles.is_empty() {
        "None".to_string()
    } else {
        config
            .ignored_roles
            .iter()
            .map(|id| format!("<@&{}>", id))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let ignored_channels = if config.ignored_channels.is_empty() {
        "None".to_string()
    } else {
        config
            .ignored_channels
            .iter()
            .map(|id| format!("<#{}>", id))
            .collect::<Vec<_>>()
            .join(", ")
    };

    embed
        .field("Ignored roles", ignored_roles, false)
        .field("Ignored channels", ignored_channels, false)
        .field(
            "Log channel",
            config
                .log_channel
                .map(|id| format!("<#{}>", id))
                .unwrap_or_else(|| "Not set".to_string()),
            false,
        )
}

/// Show the current auto-moderation settings.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    let config = ctx.data().automod.get_config(guild_id.get()).await?;

    ctx.send(poise::CreateReply::default().embed(status_embed(&config)))
        .await?;
    Ok(())
}

/// Turn an auto-moderation feature on or off.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn toggle(
    ctx: Context<'_>,
    #[description = "Feature to change"] feature: FeatureChoice,
    #[description = "Enable or disable"] enabled: bool,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    let feature = AutomodFeature::from(feature);

    ctx.data()
        .automod
        .set_feature(guild_id.get(), feature, enabled)
        .await?;

    tracing::info!(guild_id = guild_id.get(), %feature, enabled, "Automod feature toggled");
    ctx.say(format!(
        "{} **{}** has been **{}**.",
        on_off(enabled),
        feature,
        if enabled { "enabled" } else { "disabled" }
    ))
    .await?;
    Ok(())
}

/// Exempt a role from auto-moderation.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn ignore_role(
    ctx: Context<'_>,
    #[description = "Role to exempt"] role: serenity::Role,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    match ctx
        .data()
        .automod
        .add_ignored_role(guild_id.get(), role.id.get())
        .await
    {
        Ok(()) => {
            ctx.say(format!("✅ <@&{}> is now exempt from auto-moderation.", role.id))
                .await?;
        }
        Err(AutomodError::RoleAlreadyIgnored(_)) => {
            ctx.say(format!("<@&{}> is already exempt.", role.id)).await?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Exempt a channel from auto-moderation.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn ignore_channel(
    ctx: Context<'_>,
    #[description = "Channel to exempt"] channel: serenity::GuildChannel,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    match ctx
        .data()
        .automod
        .add_ignored_channel(guild_id.get(), channel.id.get())
        .await
    {
        Ok(()) => {
            ctx.say(format!("✅ <#{}> is now exempt from auto-moderation.", channel.id))
                .await?;
        }
        Err(AutomodError::ChannelAlreadyIgnored(_)) => {
            ctx.say(format!("<#{}> is already exempt.", channel.id))
                .await?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Set (or clear) the channel that receives auto-moderation logs.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn log_channel(
    ctx: Context<'_>,
    #[description = "Log channel (leave empty to disable logging)"] channel: Option<
        serenity::GuildChannel,
    >,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    let channel_id = channel.as_ref().map(|c| c.id.get());

    ctx.data()
        .automod
        .set_log_channel(guild_id.get(), channel_id)
        .await?;

    match channel_id {
        Some(id) => ctx.say(format!("📝 Auto-moderation logs will go to <#{}>.", id)).await?,
        None => ctx.say("📝 Auto-moderation logging disabled.").await?,
    };
    Ok(())
}

/// Lift a raid lockdown: let @everyone talk in every text channel again.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD | MANAGE_CHANNELS")]
pub async fn unlock(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    ctx.defer().await?;

    let unlocked = set_guild_locked(ctx.http(), guild_id, false).await;
    tracing::info!(guild_id = guild_id.get(), unlocked, "Raid lockdown lifted");

    ctx.say(format!("🔓 Unlocked {} channel{}.", unlocked, if unlocked == 1 { "" } else { "s" }))
        .await?;
    Ok(())
}
