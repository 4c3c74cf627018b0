//! Blocklist backing stores.
//!
//! Callers depend on [`BlockListStore`] only; [`create_store`] picks the
//! variant named in the configuration.

mod file;
mod memory;

pub use self::file::FileStore;
pub use self::memory::InMemoryStore;

use crate::config::StoreConfig;
use crate::engine::{BlockListStore, RuleSet};
use std::sync::Arc;
use tracing::info;

pub const STORE_KINDS: &[&str] = &["file", "memory"];

pub fn create_store(config: &StoreConfig, rules: RuleSet) -> Arc<dyn BlockListStore> {
    let store: Arc<dyn BlockListStore> = match config.kind.as_str() {
        "memory" => Arc::new(InMemoryStore::new(rules)),
        "file" => Arc::new(FileStore::new(&config.path, rules)),
        other => {
            info!(
                "Unknown store kind '{}' (known: {:?}), defaulting to file",
                other, STORE_KINDS
            );
            Arc::new(FileStore::new(&config.path, rules))
        }
    };
    info!("Using blocklist store {:?}", store.name());
    store
}
