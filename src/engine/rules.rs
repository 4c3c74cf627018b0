use super::blockmap::normalize_domain;
use crate::error::{BlocklistError, Result};
use regex::Regex;
use rustc_hash::FxHashSet;

/// Literal and regex rules layered over the blocklist.
///
/// Whitelist rules win over blacklist rules and over `BlockMap` membership.
/// Regex rules are unanchored and matched against the normalized name.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    blacklist_rules: FxHashSet<Box<str>>,
    blacklist_patterns: Vec<Regex>,
    whitelist_rules: FxHashSet<Box<str>>,
    whitelist_patterns: Vec<Regex>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_whitelisted(&self, name: &str) -> bool {
        self.whitelist_rules.contains(name)
            || self.whitelist_patterns.iter().any(|p| p.is_match(name))
    }

    pub fn is_blacklisted(&self, name: &str) -> bool {
        self.blacklist_rules.contains(name)
            || self.blacklist_patterns.iter().any(|p| p.is_match(name))
    }

    pub fn add_blacklist_rule(&mut self, name: &str) {
        self.blacklist_rules.insert(normalize_domain(name).into_boxed_str());
    }

    pub fn add_whitelist_rule(&mut self, name: &str) {
        self.whitelist_rules.insert(normalize_domain(name).into_boxed_str());
    }

    pub fn add_regex_blacklist_rule(&mut self, pattern: &str) -> Result<()> {
        self.blacklist_patterns.push(compile_pattern(pattern)?);
        Ok(())
    }

    pub fn add_regex_whitelist_rule(&mut self, pattern: &str) -> Result<()> {
        self.whitelist_patterns.push(compile_pattern(pattern)?);
        Ok(())
    }

    pub(crate) fn push_blacklist_pattern(&mut self, pattern: Regex) {
        self.blacklist_patterns.push(pattern);
    }

    pub(crate) fn push_whitelist_pattern(&mut self, pattern: Regex) {
        self.whitelist_patterns.push(pattern);
    }

    pub fn counts(&self) -> RuleCounts {
        RuleCounts {
            blacklist: self.blacklist_rules.len(),
            blacklist_patterns: self.blacklist_patterns.len(),
            whitelist: self.whitelist_rules.len(),
            whitelist_patterns: self.whitelist_patterns.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RuleCounts {
    pub blacklist: usize,
    pub blacklist_patterns: usize,
    pub whitelist: usize,
    pub whitelist_patterns: usize,
}

/// Compiles a rule pattern, rejecting malformed ones.
pub fn compile_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| BlocklistError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}
