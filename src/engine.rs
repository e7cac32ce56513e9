//! Policy engine facade
//!
//! Bundles the merge, conflict, and validation operations behind one
//! explicitly constructed instance that owns the bounded result caches.
//! Every operation is a pure function of its inputs; the caches only skip
//! recomputation for identical inputs and can be disabled without changing
//! behavior.

use crate::cache::{cache_key, BoundedCache};
use crate::config::EngineConfig;
use crate::conflict::{self, Conflict};
use crate::error::EngineResult;
use crate::merge::{self, MergeOptions, MergePreview, MergeResult};
use crate::resolve::{self, Resolution, ResolutionPolicy};
use crate::ruleset::{Level, MergeContext, RuleSet};
use crate::validate::{self, ValidationOptions, ValidationResult};

/// The policy engine. Cheap to construct; safe to share across threads
/// behind an `Arc`.
pub struct PolicyEngine {
    config: EngineConfig,
    merge_cache: BoundedCache<MergeResult>,
    validation_cache: BoundedCache<ValidationResult>,
}

impl PolicyEngine {
    pub fn new(config: EngineConfig) -> Self {
        let capacity = config.cache.capacity();
        let ttl = config.cache.ttl();
        Self {
            merge_cache: BoundedCache::new(capacity, ttl),
            validation_cache: BoundedCache::new(capacity, ttl),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Find every cross-category conflict in a rule set. Uncached; the scan
    /// is cheap at expected sizes.
    pub fn detect_conflicts(&self, rule_set: &RuleSet) -> Vec<Conflict> {
        conflict::detect(rule_set)
    }

    /// Detect and resolve a rule set's internal conflicts in one step: the
    /// standalone "check before applying" path for rule sets that were not
    /// produced by a merge.
    pub fn resolve_conflicts(&self, rule_set: &RuleSet, policy: ResolutionPolicy) -> Resolution {
        let conflicts = conflict::detect(rule_set);
        resolve::resolve(rule_set, &conflicts, policy)
    }

    /// Merge contexts under the configured strategy, consulting the result
    /// cache. The configured hard rule ceiling applies unless the options
    /// set their own.
    pub fn merge(
        &self,
        contexts: &[MergeContext],
        options: &MergeOptions,
    ) -> EngineResult<MergeResult> {
        let options = self.effective_merge_options(options);
        let tags: Vec<String> = contexts.iter().map(|c| c.rule_set.content_hash()).collect();
        let parts: Vec<String> = contexts
            .iter()
            .zip(&tags)
            .map(|(c, hash)| format!("{}:{}:{}", c.level, c.source, hash))
            .collect();
        let options_json = serde_json::to_string(&options)?;
        let mut key_parts: Vec<&str> = parts.iter().map(String::as_str).collect();
        key_parts.push(&options_json);
        let key = cache_key("merge", &key_parts);

        if let Some(cached) = self.merge_cache.get(&key) {
            return Ok(cached);
        }
        let result = merge::merge(contexts, &options)?;
        self.merge_cache.put(&key, tags, result.clone());
        Ok(result)
    }

    /// Fold a base rule set with a list of incoming ones (uncached; each
    /// underlying pairwise step is itself cacheable via [`Self::merge`]).
    pub fn merge_multiple(
        &self,
        base: &RuleSet,
        incoming: &[RuleSet],
        options: &MergeOptions,
    ) -> EngineResult<MergeResult> {
        merge::merge_multiple(base, incoming, &self.effective_merge_options(options))
    }

    /// Read-only merge preview with per-pattern added/removed lists.
    pub fn preview_merge(
        &self,
        base: &RuleSet,
        incoming: &RuleSet,
        options: &MergeOptions,
    ) -> EngineResult<MergePreview> {
        merge::preview_merge(base, incoming, &self.effective_merge_options(options))
    }

    /// Validate with explicit options, consulting the result cache.
    pub fn validate(
        &self,
        rule_set: &RuleSet,
        options: &ValidationOptions,
    ) -> EngineResult<ValidationResult> {
        let tag = rule_set.content_hash();
        let options_json = serde_json::to_string(options)?;
        let key = cache_key("validate", &[&tag, &options_json]);

        if let Some(cached) = self.validation_cache.get(&key) {
            return Ok(cached);
        }
        let result = validate::validate(rule_set, options);
        self.validation_cache.put(&key, vec![tag], result.clone());
        Ok(result)
    }

    /// Validate with the configured default options.
    pub fn validate_default(&self, rule_set: &RuleSet) -> EngineResult<ValidationResult> {
        self.validate(rule_set, &self.config.validation_options())
    }

    /// Merge one template against many target configurations. One target's
    /// failure never aborts its siblings; results are returned per target.
    pub fn merge_batch(
        &self,
        template: &RuleSet,
        targets: &[RuleSet],
        options: &MergeOptions,
    ) -> Vec<EngineResult<MergeResult>> {
        targets
            .iter()
            .enumerate()
            .map(|(i, target)| {
                let contexts = [
                    MergeContext::new(target.clone(), Level::User, format!("target[{i}]")),
                    MergeContext::new(template.clone(), Level::Template, "template"),
                ];
                self.merge(&contexts, options)
            })
            .collect()
    }

    /// Validate many rule sets; failures are collected per item.
    pub fn validate_batch(
        &self,
        rule_sets: &[RuleSet],
        options: &ValidationOptions,
    ) -> Vec<EngineResult<ValidationResult>> {
        rule_sets
            .iter()
            .map(|rs| self.validate(rs, options))
            .collect()
    }

    /// Drop every cached result derived from the given rule set. Call this
    /// when a named rule set (e.g. a registered template) is updated or
    /// removed; the engine does no dependency tracking of its own.
    pub fn invalidate_rule_set(&self, rule_set: &RuleSet) {
        self.invalidate_tag(&rule_set.content_hash());
    }

    /// Drop every cached result tagged with the given content hash.
    pub fn invalidate_tag(&self, tag: &str) {
        self.merge_cache.invalidate_tag(tag);
        self.validation_cache.invalidate_tag(tag);
    }

    pub fn clear_caches(&self) {
        self.merge_cache.clear();
        self.validation_cache.clear();
    }

    fn effective_merge_options(&self, options: &MergeOptions) -> MergeOptions {
        let mut options = options.clone();
        if options.rule_ceiling.is_none() {
            options.rule_ceiling = Some(self.config.limits.rule_ceiling);
        }
        options
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
