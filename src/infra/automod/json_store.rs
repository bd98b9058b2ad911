use crate::core::automod::{AutomodConfig, AutomodConfigStore, AutomodError};
use crate::infra::storage::{load_or_default, write_pretty, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tokio::sync::RwLock;

#[derive(Default)]
struct GuildConfigs {
    configs: HashMap<u64, AutomodConfig>,
    /// Raw entries that failed to deserialize. Written back untouched until a
    /// moderator saves a new config for that guild.
    unreadable: HashMap<u64, Value>,
}

impl GuildConfigs {
    /// Each guild is decoded on its own so one bad entry can't take the rest
    /// of the file down with it.
    fn from_raw(raw: HashMap<u64, Value>) -> Self {
        let mut guilds = GuildConfigs::default();
        for (guild_id, value) in raw {
            match serde_json::from_value::<AutomodConfig>(value.clone()) {
                Ok(config) => {
                    guilds.configs.insert(guild_id, config);
                }
                Err(e) => {
                    tracing::error!(
                        guild_id,
                        "Unreadable automod config, rules are off for this guild: {}",
                        e
                    );
                    guilds.unreadable.insert(guild_id, value);
                }
            }
        }
        guilds
    }

    fn to_raw(&self) -> Result<BTreeMap<u64, Value>, StoreError> {
        let mut raw: BTreeMap<u64, Value> = self
            .unreadable
            .iter()
            .map(|(id, value)| (*id, value.clone()))
            .collect();
        for (guild_id, config) in &self.configs {
            raw.insert(*guild_id, serde_json::to_value(config)?);
        }
        Ok(raw)
    }
}

/// Automod configs for every guild in one JSON object keyed by guild ID.
pub struct JsonAutomodConfigStore {
    path: PathBuf,
    cache: RwLock<GuildConfigs>,
}

impl JsonAutomodConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let raw: HashMap<u64, Value> = load_or_default(&path);
        let guilds = GuildConfigs::from_raw(raw);
        tracing::info!(
            guilds = guilds.configs.len(),
            unreadable = guilds.unreadable.len(),
            "Loaded automod config from {}",
            path.display()
        );

        Self {
            path,
            cache: RwLock::new(guilds),
        }
    }

    /// Caller holds the write lock, so two saves never write the file at once.
    fn persist(&self, guilds: &GuildConfigs) -> Result<(), StoreError> {
        write_pretty(&self.path, &guilds.to_raw()?)
    }
}

#[async_trait]
impl AutomodConfigStore for JsonAutomodConfigStore {
    async fn get_config(&self, guild_id: u64) -> Result<Option<AutomodConfig>, AutomodError> {
        let cache = self.cache.read().await;
        if cache.unreadable.contains_key(&guild_id) {
            return Ok(Some(AutomodConfig::rules_off()));
        }
        Ok(cache.configs.get(&guild_id).cloned())
    }

    async fn save_config(&self, guild_id: u64, config: AutomodConfig) -> Result<(), AutomodError> {
        let mut cache = self.cache.write().await;
        if cache.unreadable.remove(&guild_id).is_some() {
            tracing::warn!(guild_id, "Replacing unreadable automod config");
        }
        cache.configs.insert(guild_id, config);
        self.persist(&cache)
            .map_err(|e| AutomodError::StorageError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::automod::{AutomodService, ModAction};

    #[tokio::test]
    async fn saved_config_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("automod-config.json");

        let store = JsonAutomodConfigStore::new(&path);
        let mut config = AutomodConfig::default();
        config.ignored_roles.push(42);
        config.log_channel = Some(99);
        store.save_config(1, config).await.unwrap();

        let reloaded = JsonAutomodConfigStore::new(&path);
        let config = reloaded.get_config(1).await.unwrap().unwrap();
        assert_eq!(config.ignored_roles, vec![42]);
        assert_eq!(config.log_channel, Some(99));
        assert!(reloaded.get_config(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn partial_config_fills_rule_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("automod-config.json");
        std::fs::write(
            &path,
            r#"{ "5": { "enabled": true, "spam": { "messageLimit": 3 }, "ignoredRoles": [7] } }"#,
        )
        .unwrap();

        let store = JsonAutomodConfigStore::new(&path);
        let config = store.get_config(5).await.unwrap().unwrap();

        let spam = config.spam.unwrap();
        assert_eq!(spam.message_limit, 3);
        assert_eq!(spam.time_window_ms, 5_000);
        assert_eq!(spam.action, ModAction::Mute);
        // Rules absent from the file are switched off
        assert!(config.caps.is_none());
        assert!(config.anti_raid.is_none());
        assert_eq!(config.ignored_roles, vec![7]);
    }

    #[tokio::test]
    async fn bad_guild_entry_does_not_clobber_others() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("automod-config.json");
        std::fs::write(
            &path,
            r#"{
                "1": { "ignoredRoles": [42], "caps": { "percentage": 90 } },
                "2": { "spam": { "action": "timeout" } }
            }"#,
        )
        .unwrap();

        let service = AutomodService::new(JsonAutomodConfigStore::new(&path));

        let good = service.get_config(1).await.unwrap();
        assert_eq!(good.ignored_roles, vec![42]);
        assert_eq!(good.caps.unwrap().percentage, 90);
        assert!(good.spam.is_none());

        let bad = service.get_config(2).await.unwrap();
        assert_eq!(bad, AutomodConfig::rules_off());

        // A write for another guild keeps the bad entry as it was
        service.set_log_channel(3, Some(77)).await.unwrap();
        let raw: HashMap<String, Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["2"]["spam"]["action"], "timeout");
        assert_eq!(raw["1"]["ignoredRoles"][0], 42);
    }

    #[tokio::test]
    async fn concurrent_saves_all_land_in_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("automod-config.json");
        let store = std::sync::Arc::new(JsonAutomodConfigStore::new(&path));

        let mut handles = Vec::new();
        for guild_id in 0..16u64 {
            let store = std::sync::Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .save_config(guild_id, AutomodConfig::default())
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let reloaded = JsonAutomodConfigStore::new(&path);
        for guild_id in 0..16u64 {
            assert!(reloaded.get_config(guild_id).await.unwrap().is_some());
        }
    }
}
