// AI backend status.

use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Show today's AI usage per backend.
#[poise::command(slash_command, required_permissions = "MANAGE_GUILD")]
pub async fn aiusage(ctx: Context<'_>) -> Result<(), Error> {
    let tiers = ctx.data().ai.usage_snapshot();

    let mut embed = serenity::CreateEmbed::new()
        .title("🤖 AI Usage")
        .description("Backends are tried top to bottom. Daily counters reset at local midnight.")
        .color(0x5865F2)
        .timestamp(serenity::Timestamp::now());

    if tiers.is_empty() {
        embed = embed.field("Backends", "No AI backends configured", false);
    }

    for tier in tiers {
        let mut value = match (tier.used_today, tier.daily_quota) {
            (Some(used), Some(quota)) => format!("{}/{} today", used, quota),
            _ => "No daily cap".to_string(),
        };
        value.push_str(&format!("\nModels: {}", tier.models.join(", ")));
        if !tier.cooling_down.is_empty() {
            value.push_str(&format!("\n⏸️ Cooling down: {}", tier.cooling_down.join(", ")));
        }
        embed = embed.field(tier.name, value, true);
    }

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}
