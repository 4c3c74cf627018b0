use super::blockmap::BlockMap;
use super::rules::RuleSet;
use super::snapshot::StoredBlocklistConfiguration;
use crate::error::Result;
use std::sync::Arc;

/// Capability set shared by every blocklist backing store.
///
/// Query-path reads (`is_*`) never block on writers:
/// stores hold immutable snapshots behind swappable references.
#[async_trait::async_trait]
pub trait BlockListStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Warms the store from durable state. Returns the restored snapshot, if any.
    async fn init(&self) -> Option<StoredBlocklistConfiguration>;

    /// Blocklist membership or a matching blacklist rule.
    fn is_blacklisted(&self, name: &str) -> bool;
    fn is_whitelisted(&self, name: &str) -> bool;

    /// Full verdict for a normalized name, evaluated against one consistent
    /// view of the blocklist and rules.
    fn is_blocked(&self, name: &str) -> bool;

    fn add_blacklist_rule(&self, name: &str) -> Result<()>;
    fn add_whitelist_rule(&self, name: &str) -> Result<()>;
    fn add_regex_blacklist_rule(&self, pattern: &str) -> Result<()>;
    fn add_regex_whitelist_rule(&self, pattern: &str) -> Result<()>;

    /// Replaces the whole rule set in one swap.
    fn replace_rules(&self, rules: RuleSet);

    /// Makes the snapshot's names the active blocklist, then persists it if
    /// the store is durable. The swap happens even when persisting fails.
    async fn publish(&self, snapshot: StoredBlocklistConfiguration) -> Result<()>;

    fn block_map(&self) -> Arc<BlockMap>;
    fn rules(&self) -> Arc<RuleSet>;

    /// Metadata of the most recently published or restored snapshot.
    fn last_snapshot(&self) -> Option<SnapshotMeta>;
}

/// Snapshot provenance without the name set.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SnapshotMeta {
    pub update_timestamp: u64,
    pub blocklists: Vec<String>,
    pub entries: usize,
}

impl From<&StoredBlocklistConfiguration> for SnapshotMeta {
    fn from(s: &StoredBlocklistConfiguration) -> Self {
        Self {
            update_timestamp: s.update_timestamp,
            blocklists: s.blocklists.clone(),
            entries: s.blocked_names.len(),
        }
    }
}

/// Retrieves one blocklist source and returns its normalized entries.
#[async_trait::async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, locator: &str) -> Result<Vec<Box<str>>>;
}
