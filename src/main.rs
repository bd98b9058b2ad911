// This is the entry point of the Discord bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (JSON files, AI HTTP clients)
// - `discord/` = Discord-specific adapters (commands, events)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands, event handlers and background tasks

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::core::ai::{AiService, GenerationParams, ProviderTier};
use crate::core::automod::AutomodService;
use crate::core::rate_limit::{CommandRateLimiter, RateLimitConfig};
use crate::core::warnings::WarningService;
use crate::discord::commands::presence;
use crate::discord::{Data, Error};
use crate::infra::ai::{GeminiClient, OpenAiCompatClient};
use crate::infra::automod::JsonAutomodConfigStore;
use crate::infra::warnings::JsonWarningStore;
use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing_subscriber::EnvFilter;

const DEFAULT_SYSTEM_PROMPT: &str = "You are Mai, a friendly and helpful Discord bot. \
Be conversational, use context from the conversation history, stay respectful \
and keep responses under 2000 characters.";

const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-lite";
const DEFAULT_GEMINI_DAILY_LIMIT: u32 = 1500;
const DEFAULT_DEEPSEEK_DAILY_LIMIT: u32 = 2000;
const DEFAULT_GROQ_MODELS: &str = "llama-3.3-70b-versatile,llama-3.1-8b-instant";
const GROQ_MAX_TOKENS: u32 = 800;

/// How often in-memory windows are swept.
const SWEEP_INTERVAL_SECS: u64 = 30;

/// Event handler for non-command Discord events.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            // Ignore bot messages (including our own)
            if new_message.author.bot {
                return Ok(());
            }

            // A message that tripped automod doesn't get an AI reply
            match discord::automod::handle_message(ctx, new_message, data).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => tracing::error!("Error running automod: {}", e),
            }

            if let Err(e) = discord::ai::handle_mention(ctx, new_message, data).await {
                tracing::error!("Error handling AI mention: {}", e);
            }
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            if let Err(e) = discord::automod::handle_member_join(ctx, new_member, data).await {
                tracing::error!("Error handling member join: {}", e);
            }
        }
        serenity::FullEvent::Ready { data_about_bot } => {
            tracing::info!("Connected as {}", data_about_bot.user.name);
        }
        _ => {}
    }

    Ok(())
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value for {}: {:?}, using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

fn env_key(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn load_system_prompt() -> String {
    if let Ok(path) = std::env::var("AI_SYSTEM_PROMPT_FILE") {
        std::fs::read_to_string(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to read system prompt file at {}: {}", path, e);
            DEFAULT_SYSTEM_PROMPT.to_string()
        })
    } else {
        std::env::var("AI_SYSTEM_PROMPT").unwrap_or_else(|_| DEFAULT_SYSTEM_PROMPT.to_string())
    }
}

/// Build the fallback chain from whichever API keys are set.
///
/// Order: Gemini (free, daily cap) → DeepSeek (daily cap) → Grok → Groq
/// (several models, each cooled down individually when rate limited).
fn build_provider_tiers() -> Vec<ProviderTier> {
    let mut tiers = Vec::new();

    if let Some(key) = env_key("GEMINI_API_KEY") {
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string());
        tiers.push(
            ProviderTier::new("Gemini", Box::new(GeminiClient::new(key)), model)
                .with_daily_quota(env_or("GEMINI_DAILY_LIMIT", DEFAULT_GEMINI_DAILY_LIMIT)),
        );
    }

    if let Some(key) = env_key("DEEPSEEK_API_KEY") {
        tiers.push(
            ProviderTier::new("DeepSeek", Box::new(OpenAiCompatClient::deepseek(key)), "deepseek-chat")
                .with_daily_quota(env_or("DEEPSEEK_DAILY_LIMIT", DEFAULT_DEEPSEEK_DAILY_LIMIT)),
        );
    }

    if let Some(key) = env_key("XAI_API_KEY") {
        tiers.push(ProviderTier::new(
            "Grok",
            Box::new(OpenAiCompatClient::xai(key)),
            "grok-2-latest",
        ));
    }

    if let Some(key) = env_key("GROQ_API_KEY") {
        let models: Vec<String> = std::env::var("GROQ_MODELS")
            .unwrap_or_else(|_| DEFAULT_GROQ_MODELS.to_string())
            .split(',')
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();

        if models.is_empty() {
            tracing::warn!("GROQ_MODELS is empty, skipping Groq");
        } else {
            tiers.push(
                ProviderTier::new("Groq", Box::new(OpenAiCompatClient::groq(key)), models[0].clone())
                    .with_models(models)
                    .with_model_cooldowns()
                    .with_params(GenerationParams {
                        max_tokens: Some(GROQ_MAX_TOKENS),
                        ..GenerationParams::default()
                    }),
            );
        }
    }

    tiers
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Initialize logging so we can see what's happening (RUST_LOG overrides)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Get Discord bot token from environment
    let token = std::env::var("DISCORD_TOKEN")
        .context("Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.")?;

    // Keep runtime data in a dedicated folder so the repo root stays tidy.
    let data_dir = PathBuf::from(std::env::var("BOT_DATA_DIR").unwrap_or_else(|_| "data".to_string()));
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let automod_store = JsonAutomodConfigStore::new(data_dir.join("automod-config.json"));
    let automod_service = Arc::new(AutomodService::new(automod_store));

    let warning_store = JsonWarningStore::new(data_dir.join("warnings.json"));
    let warning_service = Arc::new(WarningService::new(warning_store));

    let tiers = build_provider_tiers();
    if tiers.is_empty() {
        tracing::warn!("No AI API keys configured; mentions will get the unavailable message");
    } else {
        let names: Vec<&str> = tiers.iter().map(|t| t.name.as_str()).collect();
        tracing::info!("AI fallback chain: {}", names.join(" → "));
    }
    let ai_service = Arc::new(AiService::new(
        tiers,
        load_system_prompt(),
        GenerationParams::default(),
    ));

    let rate_limiter = Arc::new(CommandRateLimiter::new(RateLimitConfig::default()));

    let owner_id = std::env::var("BOT_OWNER_ID")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok());

    // Create the data structure that will be shared across all commands
    let data = Data {
        automod: Arc::clone(&automod_service),
        warnings: Arc::clone(&warning_service),
        ai: Arc::clone(&ai_service),
        rate_limiter: Arc::clone(&rate_limiter),
        owner_id,
        max_history: env_or("AI_MAX_HISTORY", 20u8).min(100),
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to read message content
        | serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS; // Required for anti-raid join events

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: discord::commands::all(),
            // Event handler for messages and other events
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                tracing::info!("Bot is starting up...");

                // Register slash commands globally (can take up to an hour to propagate)
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                tracing::info!("Commands registered");

                presence::on_ready(ctx);

                // Background sweep of automod windows and expired rate-limit windows
                let automod = Arc::clone(&data.automod);
                let limiter = Arc::clone(&data.rate_limiter);
                tokio::spawn(async move {
                    let mut interval =
                        tokio::time::interval(StdDuration::from_secs(SWEEP_INTERVAL_SECS));
                    loop {
                        interval.tick().await;
                        let now = chrono::Utc::now();
                        let windows = automod.sweep(now);
                        let limits = limiter.purge_expired(now);
                        if windows > 0 || limits > 0 {
                            tracing::debug!(windows, limits, "Swept stale tracking state");
                        }
                    }
                });

                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .context("Error creating client")?;

    client.start().await.context("Error running bot")?;
    Ok(())
}
