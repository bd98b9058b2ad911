use crate::core::warnings::{Warning, WarningError, WarningStore};
use crate::infra::storage::{load_or_default, write_pretty, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

type WarningsByGuild = HashMap<u64, HashMap<u64, Vec<Warning>>>;

/// Warnings keyed by guild ID, then user ID.
pub struct JsonWarningStore {
    path: PathBuf,
    cache: RwLock<WarningsByGuild>,
}

impl JsonWarningStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let map: WarningsByGuild = load_or_default(&path);

        Self {
            path,
            cache: RwLock::new(map),
        }
    }

    /// Caller holds the write lock, so two saves never write the file at once.
    fn persist(&self, warnings: &WarningsByGuild) -> Result<(), StoreError> {
        write_pretty(&self.path, warnings)
    }
}

#[async_trait]
impl WarningStore for JsonWarningStore {
    async fn get_warnings(&self, guild_id: u64, user_id: u64) -> Result<Vec<Warning>, WarningError> {
        let cache = self.cache.read().await;
        Ok(cache
            .get(&guild_id)
            .and_then(|users| users.get(&user_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn save_warnings(
        &self,
        guild_id: u64,
        user_id: u64,
        warnings: Vec<Warning>,
    ) -> Result<(), WarningError> {
        let mut cache = self.cache.write().await;
        let users = cache.entry(guild_id).or_default();
        if warnings.is_empty() {
            users.remove(&user_id);
        } else {
            users.insert(user_id, warnings);
        }
        if users.is_empty() {
            cache.remove(&guild_id);
        }

        self.persist(&cache)
            .map_err(|e| WarningError::StorageError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::warnings::WarningService;
    use chrono::{Duration, TimeZone, Utc};

    #[tokio::test]
    async fn warnings_persist_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warnings.json");
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

        let service = WarningService::new(JsonWarningStore::new(&path));
        service
            .add_warning_at(10, 20, "Duplicate messages", 1, None, now)
            .await
            .unwrap();
        service
            .add_warning_at(10, 20, "Caps", 1, Some(Duration::days(7)), now)
            .await
            .unwrap();

        let reloaded = JsonWarningStore::new(&path);
        let warnings = reloaded.get_warnings(10, 20).await.unwrap();
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].reason, "Duplicate messages");
        assert_eq!(warnings[1].expires_at, Some(now + Duration::days(7)));
    }

    #[tokio::test]
    async fn file_uses_camel_case_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warnings.json");
        let service = WarningService::new(JsonWarningStore::new(&path));
        service.add_warning(1, 2, "test", 3, None).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"moderatorId\""));
        assert!(raw.contains("\"expiresAt\""));
    }

    #[tokio::test]
    async fn clearing_removes_empty_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warnings.json");
        let store = JsonWarningStore::new(&path);
        let service = WarningService::new(store);

        service.add_warning(1, 2, "test", 3, None).await.unwrap();
        assert_eq!(service.clear_warnings(1, 2).await.unwrap(), 1);

        let reloaded = JsonWarningStore::new(&path);
        assert!(reloaded.cache.read().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_warnings_all_reach_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warnings.json");
        let service = std::sync::Arc::new(WarningService::new(JsonWarningStore::new(&path)));

        let mut handles = Vec::new();
        for i in 0..64 {
            let service = std::sync::Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                service
                    .add_warning(1, 2, &format!("warning {}", i), 3, None)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let reloaded = JsonWarningStore::new(&path);
        assert_eq!(reloaded.get_warnings(1, 2).await.unwrap().len(), 64);
    }
}
