//! Layered cog configuration (v0.1)
//!
//! A [`CogConfig`] is a plain key/value layer; the [`ConfigManager`]
//! resolves the effective config for a cog the moment it is about to
//! execute: global defaults < per-kind defaults < per-name overrides,
//! most specific wins key-by-key. The resolved config is stored on the
//! cog and never mutated afterwards.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;

/// Concurrency mode for `map` iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parallelism {
    /// One iteration at a time (the default).
    Serial,
    /// At most `n` iterations in flight.
    Bounded(usize),
    /// No limit; every iteration is dispatched immediately.
    Unbounded,
}

/// One configuration layer: declared fields with typed accessors over
/// a plain JSON map, plus boolean toggle pairs (`enable`/`disable`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CogConfig {
    #[serde(flatten)]
    entries: BTreeMap<String, Value>,
}

impl CogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Builder-style `set` for fluent construction.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ─────────────────────────────────────────────────────────────
    // Boolean toggle pairs
    // ─────────────────────────────────────────────────────────────

    pub fn enable(&mut self, key: &str) -> &mut Self {
        self.set(key, true)
    }

    pub fn disable(&mut self, key: &str) -> &mut Self {
        self.set(key, false)
    }

    pub fn enabled(&self, key: &str) -> bool {
        matches!(self.get(key), Some(Value::Bool(true)))
    }

    // ─────────────────────────────────────────────────────────────
    // Declared fields with typed defaults
    // ─────────────────────────────────────────────────────────────

    /// Whether the cog runs as a background task (default: false).
    pub fn is_async(&self) -> bool {
        self.enabled("async")
    }

    /// Whether a failed execution aborts the enclosing scope
    /// (default: true).
    pub fn fail_on_error(&self) -> bool {
        match self.get("fail_on_error") {
            Some(Value::Bool(b)) => *b,
            _ => true,
        }
    }

    /// Concurrency for `map`: absent or 1 means serial, a positive n
    /// bounds in-flight iterations, `true` or 0 means unlimited.
    pub fn parallelism(&self) -> Parallelism {
        match self.get("parallel") {
            Some(Value::Bool(true)) => Parallelism::Unbounded,
            Some(Value::Number(n)) => match n.as_u64() {
                Some(0) => Parallelism::Unbounded,
                Some(1) | None => Parallelism::Serial,
                Some(n) => Parallelism::Bounded(n as usize),
            },
            _ => Parallelism::Serial,
        }
    }

    /// Subprocess timeout, where a cog kind supports one.
    pub fn timeout(&self) -> Option<Duration> {
        self.get("timeout_secs")
            .and_then(Value::as_u64)
            .map(Duration::from_secs)
    }

    pub fn working_dir(&self) -> Option<&str> {
        self.get("working_dir").and_then(Value::as_str)
    }

    /// Layer `overlay` on top of self; overlay wins key-by-key.
    pub fn merge(&self, overlay: &CogConfig) -> CogConfig {
        let mut merged = self.clone();
        for (key, value) in &overlay.entries {
            merged.entries.insert(key.clone(), value.clone());
        }
        merged
    }
}

/// A per-name override rule: exact cog name or regex pattern.
#[derive(Debug, Clone)]
enum NameRule {
    Exact(String),
    Pattern(Regex),
}

impl NameRule {
    fn matches(&self, name: &str) -> bool {
        match self {
            NameRule::Exact(n) => n == name,
            NameRule::Pattern(re) => re.is_match(name),
        }
    }
}

/// Resolves the merged configuration for a cog kind/name pair.
///
/// Constructed once and injected into every execution manager; there
/// is no ambient global config.
#[derive(Debug, Clone, Default)]
pub struct ConfigManager {
    global: CogConfig,
    by_kind: HashMap<String, CogConfig>,
    by_name: Vec<(NameRule, CogConfig)>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set global defaults applied to every cog.
    pub fn global(mut self, config: CogConfig) -> Self {
        self.global = config;
        self
    }

    /// Defaults for every cog of the given kind.
    pub fn for_kind(mut self, kind: impl Into<String>, config: CogConfig) -> Self {
        self.by_kind.insert(kind.into(), config);
        self
    }

    /// Override for the cog with exactly this name.
    pub fn for_name(mut self, name: impl Into<String>, config: CogConfig) -> Self {
        self.by_name.push((NameRule::Exact(name.into()), config));
        self
    }

    /// Override for every cog whose name matches the regex.
    pub fn for_matching(mut self, pattern: &str, config: CogConfig) -> Result<Self, EngineError> {
        let re = Regex::new(pattern)
            .map_err(|e| EngineError::Execution(format!("Invalid config pattern: {e}")))?;
        self.by_name.push((NameRule::Pattern(re), config));
        Ok(self)
    }

    /// Merge global < kind < name layers for this cog. Name rules are
    /// applied in declaration order, so later rules win.
    pub fn resolve(&self, kind: &str, name: &str) -> CogConfig {
        let mut config = self.global.clone();
        if let Some(kind_cfg) = self.by_kind.get(kind) {
            config = config.merge(kind_cfg);
        }
        for (rule, overlay) in &self.by_name {
            if rule.matches(name) {
                config = config.merge(overlay);
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_overlay_wins_key_by_key() {
        let base = CogConfig::new().with("timeout_secs", 30).with("async", false);
        let overlay = CogConfig::new().with("async", true);

        let merged = base.merge(&overlay);
        assert!(merged.is_async());
        assert_eq!(merged.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn fail_on_error_defaults_to_true() {
        assert!(CogConfig::new().fail_on_error());
        assert!(!CogConfig::new().with("fail_on_error", false).fail_on_error());
    }

    #[test]
    fn toggle_pairs() {
        let mut config = CogConfig::new();
        assert!(!config.enabled("verbose"));
        config.enable("verbose");
        assert!(config.enabled("verbose"));
        config.disable("verbose");
        assert!(!config.enabled("verbose"));
    }

    #[test]
    fn parallelism_parsing() {
        assert_eq!(CogConfig::new().parallelism(), Parallelism::Serial);
        assert_eq!(
            CogConfig::new().with("parallel", 1).parallelism(),
            Parallelism::Serial
        );
        assert_eq!(
            CogConfig::new().with("parallel", 4).parallelism(),
            Parallelism::Bounded(4)
        );
        assert_eq!(
            CogConfig::new().with("parallel", 0).parallelism(),
            Parallelism::Unbounded
        );
        assert_eq!(
            CogConfig::new().with("parallel", true).parallelism(),
            Parallelism::Unbounded
        );
    }

    #[test]
    fn resolve_layers_most_specific_last() {
        let manager = ConfigManager::new()
            .global(CogConfig::new().with("timeout_secs", 10).with("retries", 0))
            .for_kind("cmd", CogConfig::new().with("timeout_secs", 60))
            .for_name("slow_build", CogConfig::new().with("timeout_secs", 600));

        let generic = manager.resolve("cmd", "anything");
        assert_eq!(generic.timeout(), Some(Duration::from_secs(60)));
        assert_eq!(generic.get("retries"), Some(&json!(0)));

        let named = manager.resolve("cmd", "slow_build");
        assert_eq!(named.timeout(), Some(Duration::from_secs(600)));

        let other_kind = manager.resolve("fn", "anything");
        assert_eq!(other_kind.timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn resolve_pattern_rules() {
        let manager = ConfigManager::new()
            .for_matching("^deploy_", CogConfig::new().with("async", true))
            .unwrap();

        assert!(manager.resolve("cmd", "deploy_web").is_async());
        assert!(!manager.resolve("cmd", "build_web").is_async());
    }

    #[test]
    fn resolved_config_is_a_snapshot() {
        let manager =
            ConfigManager::new().for_kind("cmd", CogConfig::new().with("timeout_secs", 5));
        let resolved = manager.resolve("cmd", "a");
        // Later changes to a clone never affect the resolved snapshot
        let mutated = resolved.clone().with("timeout_secs", 99);
        assert_eq!(resolved.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(mutated.timeout(), Some(Duration::from_secs(99)));
    }
}
