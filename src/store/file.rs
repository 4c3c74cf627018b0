use super::memory::InMemoryStore;
use crate::engine::{BlockListStore, BlockMap, RuleSet, SnapshotMeta, StoredBlocklistConfiguration};
use crate::error::{BlocklistError, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// In-memory store that restores from and persists to a snapshot file.
pub struct FileStore {
    inner: InMemoryStore,
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, rules: RuleSet) -> Self {
        Self {
            inner: InMemoryStore::new(rules),
            path: path.into(),
        }
    }
}

#[async_trait::async_trait]
impl BlockListStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn init(&self) -> Option<StoredBlocklistConfiguration> {
        let path = self.path.clone();
        let loaded =
            tokio::task::spawn_blocking(move || StoredBlocklistConfiguration::load(path)).await;

        match loaded {
            Ok(Ok(snapshot)) => {
                info!(
                    "Restored {} blocked names from {} (updated at {})",
                    snapshot.blocked_names.len(),
                    self.path.display(),
                    snapshot.update_timestamp
                );
                self.inner.swap_in(&snapshot);
                Some(snapshot)
            }
            Ok(Err(BlocklistError::NotFound { path })) => {
                info!("No stored blocklist at {}, starting empty", path.display());
                None
            }
            Ok(Err(e)) => {
                warn!("Ignoring stored blocklist: {}", e);
                None
            }
            Err(e) => {
                error!("Snapshot load task failed: {}", e);
                None
            }
        }
    }

    fn is_blacklisted(&self, name: &str) -> bool {
        self.inner.is_blacklisted(name)
    }

    fn is_whitelisted(&self, name: &str) -> bool {
        self.inner.is_whitelisted(name)
    }

    fn is_blocked(&self, name: &str) -> bool {
        self.inner.is_blocked(name)
    }

    fn add_blacklist_rule(&self, name: &str) -> Result<()> {
        self.inner.add_blacklist_rule(name)
    }

    fn add_whitelist_rule(&self, name: &str) -> Result<()> {
        self.inner.add_whitelist_rule(name)
    }

    fn add_regex_blacklist_rule(&self, pattern: &str) -> Result<()> {
        self.inner.add_regex_blacklist_rule(pattern)
    }

    fn add_regex_whitelist_rule(&self, pattern: &str) -> Result<()> {
        self.inner.add_regex_whitelist_rule(pattern)
    }

    fn replace_rules(&self, rules: RuleSet) {
        self.inner.replace_rules(rules)
    }

    async fn publish(&self, snapshot: StoredBlocklistConfiguration) -> Result<()> {
        self.inner.swap_in(&snapshot);

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || snapshot.persist(path))
            .await
            .map_err(|e| {
                BlocklistError::io("snapshot persist task failed", std::io::Error::other(e))
            })?
    }

    fn block_map(&self) -> Arc<BlockMap> {
        self.inner.block_map()
    }

    fn rules(&self) -> Arc<RuleSet> {
        self.inner.rules()
    }

    fn last_snapshot(&self) -> Option<SnapshotMeta> {
        self.inner.last_snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_publish_persists_and_init_restores() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("list.json.gz");

        let store = FileStore::new(&path, RuleSet::new());
        assert!(store.init().await.is_none());

        let map = BlockMap::from_entries(vec!["ads.example.com".to_string().into_boxed_str()]);
        let snapshot = StoredBlocklistConfiguration::new(7, vec!["src".to_string()], Arc::new(map));
        store.publish(snapshot.clone()).await.unwrap();
        assert!(store.is_blacklisted("ads.example.com"));

        let restarted = FileStore::new(&path, RuleSet::new());
        let restored = restarted.init().await.unwrap();
        assert_eq!(restored, snapshot);
        assert!(restarted.is_blacklisted("ads.example.com"));
        assert_eq!(restarted.last_snapshot().unwrap().update_timestamp, 7);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("list.json.gz");
        std::fs::write(&path, b"\x1f\x8bnot really").unwrap();

        let store = FileStore::new(&path, RuleSet::new());
        assert!(store.init().await.is_none());
        assert!(store.block_map().is_empty());
    }

    #[tokio::test]
    async fn test_publish_swaps_even_when_persist_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing-dir").join("list.json.gz");

        let store = FileStore::new(&path, RuleSet::new());
        let map = BlockMap::from_entries(vec!["x.com".to_string().into_boxed_str()]);
        let result = store
            .publish(StoredBlocklistConfiguration::new(1, vec![], Arc::new(map)))
            .await;

        assert!(matches!(result, Err(BlocklistError::Io { .. })));
        assert!(store.is_blacklisted("x.com"));
    }
}
