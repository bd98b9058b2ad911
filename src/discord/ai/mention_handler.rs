// Mention-triggered AI chat.

use crate::core::ai::{build_context, strip_mention, ContextMessage};
use crate::core::rate_limit::RateLimitDecision;
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

/// Discord's message length limit.
const MAX_MESSAGE_CHARS: usize = 2000;

/// Reply to a message that mentions the bot.
///
/// Returns `false` when the message doesn't mention the bot.
pub async fn handle_mention(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
) -> Result<bool, Error> {
    if msg.author.bot {
        return Ok(false);
    }

    let bot_id = ctx.cache.current_user().id;
    if !msg.mentions.iter().any(|u| u.id == bot_id) {
        return Ok(false);
    }

    let elevated = is_elevated(ctx, msg, data);
    if let RateLimitDecision::Limited { reset_in_secs } =
        data.rate_limiter.check(msg.author.id.get(), elevated)
    {
        tracing::debug!(user_id = msg.author.id.get(), reset_in_secs, "AI request rate limited");
        msg.reply(
            &ctx.http,
            format!("⏳ Slow down! You can ask again in {}s.", reset_in_secs),
        )
        .await?;
        return Ok(true);
    }

    let _ = msg.channel_id.broadcast_typing(&ctx.http).await;

    // History before this message, newest first from the API
    let history = msg
        .channel_id
        .messages(
            &ctx.http,
            serenity::GetMessages::new()
                .before(msg.id)
                .limit(data.max_history),
        )
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to fetch channel history: {}", e);
            Vec::new()
        });

    let mut lines: Vec<ContextMessage> = history
        .iter()
        .rev()
        .map(|m| {
            ContextMessage::new(
                m.author.name.clone(),
                strip_mention(&m.content, bot_id.get()),
                m.author.id == bot_id,
            )
        })
        .collect();

    let question = strip_mention(&msg.content, bot_id.get());
    lines.push(ContextMessage::new(
        msg.author.name.clone(),
        if question.is_empty() { "hi".to_string() } else { question },
        false,
    ));

    match data.ai.chat(&build_context(&lines)).await {
        Ok(response) => {
            tracing::debug!(
                provider = %response.provider,
                model = %response.model,
                "Replying to mention"
            );
            let chars: Vec<char> = response.answer.chars().collect();
            for (i, chunk) in chars.chunks(MAX_MESSAGE_CHARS).enumerate() {
                let text: String = chunk.iter().collect();
                let sent = if i == 0 {
                    msg.reply(&ctx.http, text).await
                } else {
                    msg.channel_id.say(&ctx.http, text).await
                };
                if let Err(e) = sent {
                    tracing::error!("Failed to send AI response: {}", e);
                    break;
                }
            }
        }
        Err(e) => {
            tracing::error!("AI error: {}", e);
            // The error text is written for end users
            msg.reply(&ctx.http, format!("😔 {}", e)).await?;
        }
    }

    Ok(true)
}

/// Admins and the bot owner get the higher AI rate limit.
fn is_elevated(ctx: &serenity::Context, msg: &serenity::Message, data: &Data) -> bool {
    if data.owner_id == Some(msg.author.id.get()) {
        return true;
    }

    msg.author_permissions(&ctx.cache)
        .map(|p| p.administrator())
        .unwrap_or(false)
}
