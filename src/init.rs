//! Initialization helpers for the application startup.

use crate::config::{Config, RulesConfig};
use crate::engine::{RuleSet, UpdaterOptions};
use crate::error::Result;
use tracing::info;

/// Sets up the tracing subscriber with the configured filters.
pub fn setup_logging(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = config.logging.level.clone();

        // Suppress hickory logs unless explicitly enabled/overridden
        for target in ["hickory_server", "hickory_proto", "hickory_resolver"] {
            if !filter.contains(target) {
                filter.push_str(&format!(",{}=off", target));
            }
        }

        tracing_subscriber::EnvFilter::new(filter)
    });

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Compiles the `[rules]` section. A single invalid pattern rejects the
/// whole set.
pub fn build_rule_set(config: &RulesConfig) -> Result<RuleSet> {
    let mut rules = RuleSet::new();
    for name in &config.blacklist {
        rules.add_blacklist_rule(name);
    }
    for name in &config.whitelist {
        rules.add_whitelist_rule(name);
    }
    for pattern in &config.regex_blacklist {
        rules.add_regex_blacklist_rule(pattern)?;
    }
    for pattern in &config.regex_whitelist {
        rules.add_regex_whitelist_rule(pattern)?;
    }

    let counts = rules.counts();
    info!(
        "Loaded rules: {} blacklist, {} whitelist, {} regex blacklist, {} regex whitelist",
        counts.blacklist, counts.whitelist, counts.blacklist_patterns, counts.whitelist_patterns
    );
    Ok(rules)
}

pub fn updater_options(config: &Config) -> UpdaterOptions {
    UpdaterOptions {
        sources: config.blocklists.clone(),
        interval: config.updates.interval(),
        fetch_timeout: config.updates.fetch_timeout(),
        concurrent_downloads: config.updates.concurrent_downloads,
        auto_update: config.updates.enable,
    }
}
