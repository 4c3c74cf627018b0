pub mod blockmap;
pub mod decision;
mod fetcher;
pub mod rules;
pub mod snapshot;
mod traits;
pub mod updater;

pub use blockmap::{normalize_domain, BlockMap};
pub use decision::{BlockMode, BlockedResponse, DecisionEngine, Verdict};
pub use fetcher::HttpFetcher;
pub use rules::{RuleCounts, RuleSet};
pub use snapshot::StoredBlocklistConfiguration;
pub use traits::{BlockListStore, SnapshotMeta, SourceFetcher};
pub use updater::{BlocklistUpdater, RefreshReport, UpdaterOptions, UpdaterState};
