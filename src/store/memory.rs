use crate::engine::decision::is_blocked;
use crate::engine::rules::compile_pattern;
use crate::engine::{BlockListStore, BlockMap, RuleSet, SnapshotMeta, StoredBlocklistConfiguration};
use crate::error::Result;
use arc_swap::{ArcSwap, ArcSwapOption};
use std::sync::Arc;
use tracing::info;

/// Keeps the active blocklist and rules in memory only.
///
/// Both are immutable values behind `ArcSwap`: readers take a snapshot with
/// `load`, writers build a new value and swap it in.
pub struct InMemoryStore {
    block_map: ArcSwap<BlockMap>,
    rules: ArcSwap<RuleSet>,
    meta: ArcSwapOption<SnapshotMeta>,
}

impl InMemoryStore {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            block_map: ArcSwap::from_pointee(BlockMap::new()),
            rules: ArcSwap::from_pointee(rules),
            meta: ArcSwapOption::empty(),
        }
    }

    pub(crate) fn swap_in(&self, snapshot: &StoredBlocklistConfiguration) {
        let previous = self.block_map.swap(snapshot.blocked_names.clone());
        self.meta.store(Some(Arc::new(SnapshotMeta::from(snapshot))));
        info!(
            "Active blocklist updated: {} entries (was {})",
            snapshot.blocked_names.len(),
            previous.len()
        );
    }

    fn update_rules<F>(&self, f: F)
    where
        F: Fn(&mut RuleSet),
    {
        self.rules.rcu(|current| {
            let mut next = RuleSet::clone(current);
            f(&mut next);
            next
        });
    }
}

#[async_trait::async_trait]
impl BlockListStore for InMemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn init(&self) -> Option<StoredBlocklistConfiguration> {
        None
    }

    fn is_blacklisted(&self, name: &str) -> bool {
        self.block_map.load().contains(name) || self.rules.load().is_blacklisted(name)
    }

    fn is_whitelisted(&self, name: &str) -> bool {
        self.rules.load().is_whitelisted(name)
    }

    fn is_blocked(&self, name: &str) -> bool {
        is_blocked(&self.rules.load(), &self.block_map.load(), name)
    }

    fn add_blacklist_rule(&self, name: &str) -> Result<()> {
        self.update_rules(|r| r.add_blacklist_rule(name));
        Ok(())
    }

    fn add_whitelist_rule(&self, name: &str) -> Result<()> {
        self.update_rules(|r| r.add_whitelist_rule(name));
        Ok(())
    }

    fn add_regex_blacklist_rule(&self, pattern: &str) -> Result<()> {
        let regex = compile_pattern(pattern)?;
        self.update_rules(|r| r.push_blacklist_pattern(regex.clone()));
        Ok(())
    }

    fn add_regex_whitelist_rule(&self, pattern: &str) -> Result<()> {
        let regex = compile_pattern(pattern)?;
        self.update_rules(|r| r.push_whitelist_pattern(regex.clone()));
        Ok(())
    }

    fn replace_rules(&self, rules: RuleSet) {
        self.rules.store(Arc::new(rules));
    }

    async fn publish(&self, snapshot: StoredBlocklistConfiguration) -> Result<()> {
        self.swap_in(&snapshot);
        Ok(())
    }

    fn block_map(&self) -> Arc<BlockMap> {
        self.block_map.load_full()
    }

    fn rules(&self) -> Arc<RuleSet> {
        self.rules.load_full()
    }

    fn last_snapshot(&self) -> Option<SnapshotMeta> {
        self.meta.load().as_deref().cloned()
    }
}
