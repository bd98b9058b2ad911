// Auto-moderation service - evaluates messages and joins against the
// per-guild configuration.
//
// NO Discord dependencies here. The Discord layer hands us normalized events
// and applies whatever `Violation` comes back.

use super::automod_models::{AutomodConfig, AutomodFeature, InboundMessage, MemberJoin, Violation};
use super::detectors;
use super::event_window::{ModerationState, UserKey};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

/// Coarse max age used by the background sweep.
pub const SWEEP_MAX_AGE_SECS: i64 = 60;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum AutomodError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Role {0} is already exempt")]
    RoleAlreadyIgnored(u64),

    #[error("Channel {0} is already exempt")]
    ChannelAlreadyIgnored(u64),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Persistence for per-guild automod configuration.
#[async_trait]
pub trait AutomodConfigStore: Send + Sync {
    /// Stored config for a guild, if any.
    async fn get_config(&self, guild_id: u64) -> Result<Option<AutomodConfig>, AutomodError>;

    async fn save_config(&self, guild_id: u64, config: AutomodConfig)
        -> Result<(), AutomodError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct AutomodService<S: AutomodConfigStore> {
    store: S,
    state: ModerationState,
    /// Held for every load-modify-save of a stored config.
    write_gate: Mutex<()>,
}

impl<S: AutomodConfigStore> AutomodService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            state: ModerationState::new(),
            write_gate: Mutex::new(()),
        }
    }

    /// Config for a guild. Guilds seen for the first time get the defaults,
    /// which are persisted so moderators can edit them later.
    pub async fn get_config(&self, guild_id: u64) -> Result<AutomodConfig, AutomodError> {
        if let Some(config) = self.store.get_config(guild_id).await? {
            return Ok(config);
        }

        let _guard = self.write_gate.lock().await;
        self.load_or_init(guild_id).await
    }

    /// Stored config, or the persisted defaults. Caller holds `write_gate`.
    async fn load_or_init(&self, guild_id: u64) -> Result<AutomodConfig, AutomodError> {
        if let Some(config) = self.store.get_config(guild_id).await? {
            return Ok(config);
        }

        let config = AutomodConfig::default();
        self.store.save_config(guild_id, config.clone()).await?;
        Ok(config)
    }

    /// Check a guild message. At most one violation is returned.
    pub async fn check_message(
        &self,
        message: &InboundMessage,
    ) -> Result<Option<Violation>, AutomodError> {
        let config = self.get_config(message.guild_id).await?;
        Ok(self.evaluate_message(&config, message))
    }

    /// Run the message detectors in priority order and stop at the first hit:
    /// spam, mass-mention, caps, link-spam, invite-link, duplicate.
    ///
    /// Synchronous on purpose: window updates happen with no await in between.
    pub fn evaluate_message(
        &self,
        config: &AutomodConfig,
        message: &InboundMessage,
    ) -> Option<Violation> {
        if !config.enabled || config.is_ignored(message.channel_id, &message.author_roles) {
            return None;
        }

        let key = UserKey::new(message.guild_id, message.author_id);
        let content = message.content.as_str();
        let mentions = message.user_mentions.saturating_add(message.role_mentions);

        detectors::check_spam(
            &self.state.messages,
            key,
            message.timestamp,
            config.spam.as_ref(),
        )
        .or_else(|| detectors::check_mass_mention(mentions, config.mass_mention.as_ref()))
        .or_else(|| detectors::check_caps(content, config.caps.as_ref()))
        .or_else(|| detectors::check_link_spam(content, config.link_spam.as_ref()))
        .or_else(|| detectors::check_invites(content, config.invites.as_ref()))
        .or_else(|| {
            detectors::check_duplicate(
                &self.state.duplicates,
                key,
                content,
                message.timestamp,
                config.duplicate.as_ref(),
            )
        })
    }

    /// Check a member join for a raid.
    pub async fn check_join(&self, join: &MemberJoin) -> Result<Option<Violation>, AutomodError> {
        let config = self.get_config(join.guild_id).await?;
        if !config.enabled {
            return Ok(None);
        }

        Ok(detectors::check_anti_raid(
            &self.state.joins,
            join.guild_id,
            join.timestamp,
            config.anti_raid.as_ref(),
        ))
    }

    /// Purge windows older than [`SWEEP_MAX_AGE_SECS`]. Returns removed keys.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        self.state.sweep(now, Duration::seconds(SWEEP_MAX_AGE_SECS))
    }

    /// Turn a feature on or off. Enabling a rule that was never configured
    /// installs its defaults.
    pub async fn set_feature(
        &self,
        guild_id: u64,
        feature: AutomodFeature,
        enabled: bool,
    ) -> Result<AutomodConfig, AutomodError> {
        let _guard = self.write_gate.lock().await;
        let mut config = self.load_or_init(guild_id).await?;

        match feature {
            AutomodFeature::All => config.enabled = enabled,
            AutomodFeature::Spam => {
                config.spam.get_or_insert_with(Default::default).enabled = enabled
            }
            AutomodFeature::MassMention => {
                config
                    .mass_mention
                    .get_or_insert_with(Default::default)
                    .enabled = enabled
            }
            AutomodFeature::Caps => {
                config.caps.get_or_insert_with(Default::default).enabled = enabled
            }
            AutomodFeature::LinkSpam => {
                config.link_spam.get_or_insert_with(Default::default).enabled = enabled
            }
            AutomodFeature::Invites => {
                config.invites.get_or_insert_with(Default::default).enabled = enabled
            }
            AutomodFeature::Duplicate => {
                config.duplicate.get_or_insert_with(Default::default).enabled = enabled
            }
            AutomodFeature::AntiRaid => {
                config.anti_raid.get_or_insert_with(Default::default).enabled = enabled
            }
        }

        self.store.save_config(guild_id, config.clone()).await?;
        Ok(config)
    }

    /// Exempt a role from automod.
    pub async fn add_ignored_role(&self, guild_id: u64, role_id: u64) -> Result<(), AutomodError> {
        let _guard = self.write_gate.lock().await;
        let mut config = self.load_or_init(guild_id).await?;
        if config.ignored_roles.contains(&role_id) {
            return Err(AutomodError::RoleAlreadyIgnored(role_id));
        }
        config.ignored_roles.push(role_id);
        self.store.save_config(guild_id, config).await
    }

    /// Exempt a channel from automod.
    pub async fn add_ignored_channel(
        &self,
        guild_id: u64,
        channel_id: u64,
    ) -> Result<(), AutomodError> {
        let _guard = self.write_gate.lock().await;
        let mut config = self.load_or_init(guild_id).await?;
        if config.ignored_channels.contains(&channel_id) {
            return Err(AutomodError::ChannelAlreadyIgnored(channel_id));
        }
        config.ignored_channels.push(channel_id);
        self.store.save_config(guild_id, config).await
    }

    pub async fn set_log_channel(
        &self,
        guild_id: u64,
        channel_id: Option<u64>,
    ) -> Result<(), AutomodError> {
        let _guard = self.write_gate.lock().await;
        let mut config = self.load_or_init(guild_id).await?;
        config.log_channel = channel_id;
        self.store.save_config(guild_id, config).await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::automod::automod_models::{ModAction, SpamRule, ViolationKind};
    use chrono::TimeZone;
    use dashmap::DashMap;

    /// In-memory store for testing
    struct MockConfigStore {
        configs: DashMap<u64, AutomodConfig>,
    }

    impl MockConfigStore {
        fn new() -> Self {
            Self {
                configs: DashMap::new(),
            }
        }

        fn with_config(guild_id: u64, config: AutomodConfig) -> Self {
            let store = Self::new();
            store.configs.insert(guild_id, config);
            store
        }
    }

    #[async_trait]
    impl AutomodConfigStore for MockConfigStore {
        async fn get_config(&self, guild_id: u64) -> Result<Option<AutomodConfig>, AutomodError> {
            let config = self.configs.get(&guild_id).map(|c| c.clone());
            // Let other tasks run between the read and the caller's save
            tokio::task::yield_now().await;
            Ok(config)
        }

        async fn save_config(
            &self,
            guild_id: u64,
            config: AutomodConfig,
        ) -> Result<(), AutomodError> {
            self.configs.insert(guild_id, config);
            Ok(())
        }
    }

    const GUILD: u64 = 456;
    const USER: u64 = 123;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
    }

    fn message(content: &str, ms: i64) -> InboundMessage {
        InboundMessage {
            guild_id: GUILD,
            channel_id: 1,
            author_id: USER,
            author_roles: vec![],
            content: content.to_string(),
            user_mentions: 0,
            role_mentions: 0,
            timestamp: at(ms),
        }
    }

    fn join(ms: i64) -> MemberJoin {
        MemberJoin {
            guild_id: GUILD,
            user_id: 1,
            timestamp: at(ms),
        }
    }

    #[tokio::test]
    async fn normal_message_is_clean() {
        let service = AutomodService::new(MockConfigStore::new());
        let result = service
            .check_message(&message("Hello world!", 0))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn first_lookup_persists_defaults() {
        let service = AutomodService::new(MockConfigStore::new());
        let config = service.get_config(GUILD).await.unwrap();

        assert_eq!(config, AutomodConfig::default());
        assert!(service.store.configs.contains_key(&GUILD));
    }

    #[tokio::test]
    async fn spam_burst_mutes_on_fifth_message_then_starts_fresh() {
        let config = AutomodConfig {
            spam: Some(SpamRule {
                message_limit: 5,
                time_window_ms: 5_000,
                ..Default::default()
            }),
            ..Default::default()
        };
        let service = AutomodService::new(MockConfigStore::with_config(GUILD, config));

        for i in 0..4 {
            let result = service
                .check_message(&message(&format!("message {}", i), i * 500))
                .await
                .unwrap();
            assert!(result.is_none(), "message {} should pass", i);
        }

        let violation = service
            .check_message(&message("message 4", 2_000))
            .await
            .unwrap()
            .expect("fifth message is spam");
        assert_eq!(violation.kind(), ViolationKind::Spam);
        assert_eq!(violation.action(), ModAction::Mute);

        let sixth = service
            .check_message(&message("message 5", 2_100))
            .await
            .unwrap();
        assert!(sixth.is_none());
        assert_eq!(service.state.messages.len(&UserKey::new(GUILD, USER)), 1);
    }

    #[tokio::test]
    async fn first_matching_detector_wins() {
        let service = AutomodService::new(MockConfigStore::new());

        // Both caps and link spam would fire; caps is checked first.
        let mut msg = message("LOOK https://A.COM HTTPS://B.COM HTTPS://C.COM", 0);
        let violation = service.check_message(&msg).await.unwrap().unwrap();
        assert_eq!(violation.kind(), ViolationKind::Caps);

        // Mass mention comes before caps.
        msg.timestamp = at(10);
        msg.user_mentions = 3;
        msg.role_mentions = 2;
        let violation = service.check_message(&msg).await.unwrap().unwrap();
        assert_eq!(violation.kind(), ViolationKind::MassMention);
    }

    #[tokio::test]
    async fn duplicate_window_only_sees_messages_that_passed_earlier_checks() {
        let service = AutomodService::new(MockConfigStore::new());

        // A caps violation short-circuits before the duplicate detector records.
        let loud = "THIS IS VERY LOUD";
        assert_eq!(
            service
                .check_message(&message(loud, 0))
                .await
                .unwrap()
                .unwrap()
                .kind(),
            ViolationKind::Caps
        );
        assert_eq!(service.state.duplicates.len(&UserKey::new(GUILD, USER)), 0);

        // Identical quiet messages reach the duplicate detector (limit 3).
        assert!(service.check_message(&message("same", 6_000)).await.unwrap().is_none());
        assert!(service.check_message(&message("same", 7_500)).await.unwrap().is_none());
        let violation = service
            .check_message(&message("same", 9_000))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(violation.kind(), ViolationKind::Duplicate);
    }

    #[tokio::test]
    async fn disabled_automod_skips_everything() {
        let config = AutomodConfig {
            enabled: false,
            ..Default::default()
        };
        let service = AutomodService::new(MockConfigStore::with_config(GUILD, config));

        let mut msg = message("SPAM SPAM SPAM SPAM", 0);
        msg.user_mentions = 100;
        assert!(service.check_message(&msg).await.unwrap().is_none());
        assert!(service.check_join(&join(0)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ignored_channels_and_roles_are_exempt() {
        let config = AutomodConfig {
            ignored_channels: vec![1],
            ignored_roles: vec![99],
            ..Default::default()
        };
        let service = AutomodService::new(MockConfigStore::with_config(GUILD, config));

        let msg = message("ALL CAPS MESSAGE HERE", 0);
        assert!(service.check_message(&msg).await.unwrap().is_none());

        let mut other_channel = message("ALL CAPS MESSAGE HERE", 1);
        other_channel.channel_id = 2;
        other_channel.author_roles = vec![99];
        assert!(service.check_message(&other_channel).await.unwrap().is_none());

        other_channel.author_roles.clear();
        assert!(service.check_message(&other_channel).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn raid_detection_through_service() {
        let service = AutomodService::new(MockConfigStore::new());

        for i in 0..9 {
            assert!(service.check_join(&join(i * 10)).await.unwrap().is_none());
        }
        let violation = service.check_join(&join(100)).await.unwrap().unwrap();
        assert_eq!(violation.kind(), ViolationKind::Raid);
        assert!(violation.lockdown());
    }

    #[tokio::test]
    async fn set_feature_toggles_and_installs_defaults() {
        let config = AutomodConfig {
            spam: None,
            ..Default::default()
        };
        let service = AutomodService::new(MockConfigStore::with_config(GUILD, config));

        let updated = service
            .set_feature(GUILD, AutomodFeature::Spam, true)
            .await
            .unwrap();
        assert_eq!(updated.spam, Some(SpamRule::default()));

        let updated = service
            .set_feature(GUILD, AutomodFeature::Invites, true)
            .await
            .unwrap();
        assert!(updated.invites.unwrap().enabled);

        let updated = service
            .set_feature(GUILD, AutomodFeature::All, false)
            .await
            .unwrap();
        assert!(!updated.enabled);
        assert!(!service.get_config(GUILD).await.unwrap().enabled);
    }

    #[tokio::test]
    async fn ignoring_twice_is_rejected() {
        let service = AutomodService::new(MockConfigStore::new());

        service.add_ignored_role(GUILD, 5).await.unwrap();
        assert!(matches!(
            service.add_ignored_role(GUILD, 5).await,
            Err(AutomodError::RoleAlreadyIgnored(5))
        ));

        service.add_ignored_channel(GUILD, 6).await.unwrap();
        assert!(matches!(
            service.add_ignored_channel(GUILD, 6).await,
            Err(AutomodError::ChannelAlreadyIgnored(6))
        ));

        service.set_log_channel(GUILD, Some(7)).await.unwrap();
        let config = service.get_config(GUILD).await.unwrap();
        assert_eq!(config.ignored_roles, vec![5]);
        assert_eq!(config.ignored_channels, vec![6]);
        assert_eq!(config.log_channel, Some(7));
    }

    #[tokio::test]
    async fn sweep_drops_idle_windows() {
        let service = AutomodService::new(MockConfigStore::new());
        service.check_message(&message("hi", 0)).await.unwrap();
        service.check_join(&join(0)).await.unwrap();

        assert_eq!(service.sweep(at(30_000)), 0);
        assert_eq!(service.sweep(at(61_000)), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_edits_are_not_lost() {
        let service = std::sync::Arc::new(AutomodService::new(MockConfigStore::new()));

        let mut handles = Vec::new();
        for role_id in 0..32u64 {
            let service = std::sync::Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                service.add_ignored_role(GUILD, role_id).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut roles = service.get_config(GUILD).await.unwrap().ignored_roles;
        roles.sort_unstable();
        assert_eq!(roles, (0..32u64).collect::<Vec<_>>());
    }
}
