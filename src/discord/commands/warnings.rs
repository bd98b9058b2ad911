// Warning commands for moderators.

use crate::core::warnings::{format_duration, parse_duration};
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// How many warnings `/warnings` lists.
const SHOWN_WARNINGS: usize = 5;

/// Warn a user.
///
/// **Command syntax:** `/warn @user reason:spamming duration:7d`
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn warn(
    ctx: Context<'_>,
    #[description = "User to warn"] user: serenity::User,
    #[description = "Reason for the warning"] reason: Option<String>,
    #[description = "Expire after (e.g. 7d, 12h). Permanent if empty"] duration: Option<String>,
    #[description = "DM the user (default: yes)"] dm: Option<bool>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    ctx.defer().await?;

    if user.id == ctx.author().id {
        ctx.say("❌ You cannot warn yourself!").await?;
        return Ok(());
    }
    if user.bot {
        ctx.say("❌ Bots can't be warned.").await?;
        return Ok(());
    }

    let expires_in = match duration.as_deref().map(parse_duration).transpose() {
        Ok(d) => d,
        Err(e) => {
            ctx.say(format!("❌ {}", e)).await?;
            return Ok(());
        }
    };
    let expiry_text = expires_in
        .map(|d| format!("Expires in {}", format_duration(d)))
        .unwrap_or_else(|| "Permanent".to_string());
    let reason = reason.unwrap_or_else(|| "No reason provided".to_string());

    let count = ctx
        .data()
        .warnings
        .add_warning(
            guild_id.get(),
            user.id.get(),
            &reason,
            ctx.author().id.get(),
            expires_in,
        )
        .await?;

    let mut dm_failed = false;
    if dm.unwrap_or(true) {
        let guild_name = ctx
            .guild()
            .map(|g| g.name.clone())
            .unwrap_or_else(|| "the server".to_string());
        let embed = serenity::CreateEmbed::new()
            .title("⚠️ Warning")
            .description(format!("You have been warned in **{}**", guild_name))
            .color(0xFFA500)
            .field("Reason", &reason, false)
            .field("Total Warnings", count.to_string(), true)
            .field("Expiry", &expiry_text, true)
            .timestamp(serenity::Timestamp::now());

        if let Err(e) = user
            .direct_message(ctx.http(), serenity::CreateMessage::new().embed(embed))
            .await
        {
            tracing::debug!(user_id = user.id.get(), "Could not DM warned user: {}", e);
            dm_failed = true;
        }
    }

    ctx.say(format!(
        "✅ Warned <@{}> ({} total warning{}) - {}{}",
        user.id,
        count,
        if count == 1 { "" } else { "s" },
        expiry_text,
        if dm_failed { " - Could not send DM" } else { "" }
    ))
    .await?;
    Ok(())
}

/// View a user's active warnings.
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn warnings(
    ctx: Context<'_>,
    #[description = "User to check"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    let warnings = ctx
        .data()
        .warnings
        .active_warnings(guild_id.get(), user.id.get())
        .await?;

    if warnings.is_empty() {
        ctx.say(format!("<@{}> has no active warnings.", user.id))
            .await?;
        return Ok(());
    }

    let total = warnings.len();
    let mut embed = serenity::CreateEmbed::new()
        .title(format!("⚠️ Warnings for {}", user.name))
        .description(format!(
            "Total Active: {} warning{}",
            total,
            if total == 1 { "" } else { "s" }
        ))
        .color(0xFFA500);

    // Numbered newest first, matching /removewarn
    for (number, warning) in warnings.iter().rev().enumerate().take(SHOWN_WARNINGS) {
        let expiry = warning
            .expires_at
            .map(|t| format!("<t:{}:R>", t.timestamp()))
            .unwrap_or_else(|| "Never".to_string());
        embed = embed.field(
            format!("Warning #{}", number + 1),
            format!(
                "**Reason:** {}\n**By:** <@{}>\n**When:** <t:{}:R>\n**Expires:** {}",
                warning.reason,
                warning.moderator_id,
                warning.timestamp.timestamp(),
                expiry
            ),
            false,
        );
    }

    if total > SHOWN_WARNINGS {
        embed = embed.footer(serenity::CreateEmbedFooter::new(format!(
            "Showing {} most recent warnings out of {} total",
            SHOWN_WARNINGS, total
        )));
    }

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Remove one warning (numbers as shown by /warnings, 1 = most recent).
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn removewarn(
    ctx: Context<'_>,
    #[description = "User to remove a warning from"] user: serenity::User,
    #[description = "Warning number (see /warnings)"]
    #[min = 1]
    number: usize,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    let service = &ctx.data().warnings;
    let warnings = service
        .active_warnings(guild_id.get(), user.id.get())
        .await?;

    if warnings.is_empty() {
        ctx.say(format!("<@{}> has no warnings to remove.", user.id))
            .await?;
        return Ok(());
    }
    if number == 0 || number > warnings.len() {
        ctx.say(format!(
            "❌ Invalid warning number! <@{}> has {} warning(s). Use a number between 1 and {}.",
            user.id,
            warnings.len(),
            warnings.len()
        ))
        .await?;
        return Ok(());
    }

    let target = &warnings[warnings.len() - number];
    service
        .remove_warning(guild_id.get(), user.id.get(), target.id)
        .await?;

    ctx.say(format!(
        "✅ Removed warning #{} from <@{}>. They now have {} warning(s).",
        number,
        user.id,
        warnings.len() - 1
    ))
    .await?;
    Ok(())
}

/// Clear all warnings for a user.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn clearwarnings(
    ctx: Context<'_>,
    #[description = "User to clear warnings for"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    let cleared = ctx
        .data()
        .warnings
        .clear_warnings(guild_id.get(), user.id.get())
        .await?;

    if cleared == 0 {
        ctx.say(format!("<@{}> has no warnings to clear.", user.id))
            .await?;
    } else {
        ctx.say(format!(
            "✅ Cleared {} warning{} for <@{}>.",
            cleared,
            if cleared == 1 { "" } else { "s" },
            user.id
        ))
        .await?;
    }
    Ok(())
}
