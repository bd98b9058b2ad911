// AI chat service - tiered provider fallback.
//
// Tiers are tried in order. Free tiers carry a daily quota that resets on the
// host's local calendar day; multi-model paid tiers park individual models in
// the cooldown registry when they hit a rate limit. The first successful
// answer wins and nothing is retried within the same request.

use super::cooldown::ModelCooldowns;
use super::models::{AiError, AiMessage, AiResponse, GenerationParams, ProviderError};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};
use dashmap::DashMap;

#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Sends a chat completion request for `model`.
    ///
    /// Failures must be classified: rate limits become
    /// `ProviderError::RateLimited`, everything else `ProviderError::Failed`.
    async fn chat_complete(
        &self,
        messages: &[AiMessage],
        model: &str,
        params: &GenerationParams,
    ) -> Result<String, ProviderError>;
}

/// One entry of the fallback chain.
pub struct ProviderTier {
    pub name: String,
    pub provider: Box<dyn AiProvider>,
    /// Tried in order within the tier.
    pub models: Vec<String>,
    /// Successful calls allowed per local calendar day.
    pub daily_quota: Option<u32>,
    /// Park a model in the cooldown registry when it is rate limited.
    pub cooldown_models: bool,
    /// Overrides the service-wide generation params for this tier.
    pub params: Option<GenerationParams>,
}

impl ProviderTier {
    pub fn new(name: impl Into<String>, provider: Box<dyn AiProvider>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider,
            models: vec![model.into()],
            daily_quota: None,
            cooldown_models: false,
            params: None,
        }
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    pub fn with_daily_quota(mut self, quota: u32) -> Self {
        self.daily_quota = Some(quota);
        self
    }

    pub fn with_model_cooldowns(mut self) -> Self {
        self.cooldown_models = true;
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = Some(params);
        self
    }
}

/// Per-tier success counter for the current day.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageCounter {
    pub count: u32,
    pub day: NaiveDate,
}

/// Snapshot of one tier for status displays.
#[derive(Debug, Clone)]
pub struct TierUsage {
    pub name: String,
    pub used_today: Option<u32>,
    pub daily_quota: Option<u32>,
    pub models: Vec<String>,
    pub cooling_down: Vec<String>,
}

fn local_day(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&Local).date_naive()
}

pub struct AiService {
    tiers: Vec<ProviderTier>,
    usage: DashMap<String, UsageCounter>,
    cooldowns: ModelCooldowns,
    system_prompt: String,
    params: GenerationParams,
}

impl AiService {
    pub fn new(tiers: Vec<ProviderTier>, system_prompt: String, params: GenerationParams) -> Self {
        Self::with_cooldowns(tiers, system_prompt, params, ModelCooldowns::new())
    }

    pub fn with_cooldowns(
        tiers: Vec<ProviderTier>,
        system_prompt: String,
        params: GenerationParams,
        cooldowns: ModelCooldowns,
    ) -> Self {
        let today = local_day(Utc::now());
        let usage = DashMap::new();
        for tier in tiers.iter().filter(|t| t.daily_quota.is_some()) {
            usage.insert(
                tier.name.clone(),
                UsageCounter {
                    count: 0,
                    day: today,
                },
            );
        }

        Self {
            tiers,
            usage,
            cooldowns,
            system_prompt,
            params,
        }
    }

    #[cfg(test)]
    pub fn cooldowns(&self) -> &ModelCooldowns {
        &self.cooldowns
    }

    pub async fn chat(&self, context_messages: &[AiMessage]) -> Result<AiResponse, AiError> {
        self.chat_at(context_messages, Utc::now()).await
    }

    /// Run the fallback chain with `now` as the reference time for quotas
    /// and cooldowns.
    pub async fn chat_at(
        &self,
        context_messages: &[AiMessage],
        now: DateTime<Utc>,
    ) -> Result<AiResponse, AiError> {
        self.roll_over_usage(now);

        // Build messages for API: System Prompt + Context
        let mut messages = Vec::with_capacity(context_messages.len() + 1);
        messages.push(AiMessage::system(self.system_prompt.clone()));
        messages.extend(context_messages.iter().cloned());

        for tier in &self.tiers {
            if self.quota_exhausted(tier) {
                tracing::debug!(provider = %tier.name, "Daily quota reached, skipping");
                continue;
            }
            let params = tier.params.as_ref().unwrap_or(&self.params);

            for model in &tier.models {
                if tier.cooldown_models && self.cooldowns.is_limited_at(model, now) {
                    tracing::debug!(provider = %tier.name, model = %model, "Model cooling down, skipping");
                    continue;
                }

                match tier
                    .provider
                    .chat_complete(&messages, model, params)
                    .await
                {
                    Ok(answer) => {
                        let used = self.record_success(tier);
                        tracing::info!(
                            provider = %tier.name,
                            model = %model,
                            used_today = ?used,
                            daily_quota = ?tier.daily_quota,
                            "AI response generated"
                        );
                        return Ok(AiResponse {
                            answer,
                            provider: tier.name.clone(),
                            model: model.clone(),
                        });
                    }
                    Err(ProviderError::RateLimited {
                        retry_after_secs,
                        message,
                    }) => {
                        tracing::warn!(
                            provider = %tier.name,
                            model = %model,
                            "Rate limited, trying next backend: {}",
                            message
                        );
                        if tier.cooldown_models {
                            self.cooldowns.mark_limited_at(model, retry_after_secs, now);
                        }
                    }
                    Err(err) => {
                        tracing::error!(
                            provider = %tier.name,
                            model = %model,
                            "AI provider failed: {}",
                            err
                        );
                    }
                }
            }
        }

        tracing::error!("All AI providers exhausted");
        Err(AiError::AllProvidersUnavailable)
    }

    pub fn usage_snapshot(&self) -> Vec<TierUsage> {
        self.usage_snapshot_at(Utc::now())
    }

    /// Current usage for every tier, after applying any day rollover.
    pub fn usage_snapshot_at(&self, now: DateTime<Utc>) -> Vec<TierUsage> {
        self.roll_over_usage(now);

        self.tiers
            .iter()
            .map(|tier| TierUsage {
                name: tier.name.clone(),
                used_today: self.usage.get(&tier.name).map(|u| u.count),
                daily_quota: tier.daily_quota,
                models: tier.models.clone(),
                cooling_down: if tier.cooldown_models {
                    tier.models
                        .iter()
                        .filter(|m| self.cooldowns.is_limited_at(m, now))
                        .cloned()
                        .collect()
                } else {
                    Vec::new()
                },
            })
            .collect()
    }

    /// Reset counters whose day marker is not today.
    fn roll_over_usage(&self, now: DateTime<Utc>) {
        let today = local_day(now);
        for mut counter in self.usage.iter_mut() {
            if counter.day != today {
                tracing::info!(provider = %counter.key(), "New day, free tier counter reset");
                counter.count = 0;
                counter.day = today;
            }
        }
    }

    fn quota_exhausted(&self, tier: &ProviderTier) -> bool {
        match tier.daily_quota {
            Some(quota) => self
                .usage
                .get(&tier.name)
                .map(|u| u.count >= quota)
                .unwrap_or(false),
            None => false,
        }
    }

    fn record_success(&self, tier: &ProviderTier) -> Option<u32> {
        tier.daily_quota?;
        let mut counter = self.usage.get_mut(&tier.name)?;
        counter.count += 1;
        Some(counter.count)
    }
}
