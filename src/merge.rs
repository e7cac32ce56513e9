//! Rule-set merging
//!
//! Combines rule sets from multiple origins (user, project, template,
//! enterprise, CLI override) into one rule set under a selectable strategy.
//! Inputs are never mutated; output category lists are sorted
//! lexicographically so results are diffable and deterministic.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Instant;

use crate::conflict::{self, Conflict, ConflictKind, ConflictRule};
use crate::error::{EngineError, EngineResult};
use crate::pattern::{self, PatternCache};
use crate::resolve::ResolutionPolicy;
use crate::ruleset::{Level, MergeContext, RuleCategory, RuleSet, RuleSetMetadata};

/// The algorithm used to combine rule sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Result is the last context's rule set verbatim; prior rules count as
    /// overridden.
    Override,

    /// Precedence-aware union (the default). Deny is additive and always
    /// takes effect: every context's allow/ask patterns, the base's
    /// included, are filtered against the accumulated deny set per the
    /// active resolution policy, and an incoming deny displaces any
    /// previously accepted allow/ask it overlaps. An internally conflicted
    /// base is therefore resolved, not passed through.
    #[default]
    Merge,

    /// Plain set union with no conflict filtering. Conflicts are detected
    /// and reported but never resolved. Diagnostic/preview use only, not for
    /// producing a safe final configuration.
    Combine,

    /// Merge semantics restricted to an explicit list of sections; sections
    /// not listed come from the base context unchanged.
    Selective,

    /// Ordered overlays: all deny layers accumulate first, then ask, then
    /// the full allow set is filtered against the complete deny set. Under
    /// strict-deny this lands on the same rules as `Merge`; with 3+ contexts
    /// and a loosening policy (template-wins) the two differ, because here
    /// every allow sees the complete deny set rather than the denies merged
    /// so far.
    Layered,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::Override => "override",
            MergeStrategy::Merge => "merge",
            MergeStrategy::Combine => "combine",
            MergeStrategy::Selective => "selective",
            MergeStrategy::Layered => "layered",
        }
    }
}

impl FromStr for MergeStrategy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "override" => Ok(MergeStrategy::Override),
            "merge" => Ok(MergeStrategy::Merge),
            "combine" => Ok(MergeStrategy::Combine),
            "selective" => Ok(MergeStrategy::Selective),
            "layered" => Ok(MergeStrategy::Layered),
            other => Err(EngineError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Top-level rule-set sections a selective merge can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeSection {
    Permissions,
    Metadata,
}

/// Options shared by all merge entry points.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    pub strategy: MergeStrategy,
    pub policy: ResolutionPolicy,

    /// Sections to merge under `Selective`; ignored by other strategies.
    pub sections: Vec<MergeSection>,

    /// Merge metadata from later contexts into the base metadata. When
    /// false, the result keeps the base context's metadata untouched
    /// (`Override` keeps the last context's instead).
    pub merge_metadata: bool,

    /// Hard circuit breaker: refuse to merge when the combined input rule
    /// count exceeds this, bounding the pairwise conflict scan.
    pub rule_ceiling: Option<usize>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            strategy: MergeStrategy::Merge,
            policy: ResolutionPolicy::StrictDeny,
            sections: Vec::new(),
            merge_metadata: true,
            rule_ceiling: None,
        }
    }
}

/// Performance and change counters for one merge call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Total rules read across all input contexts.
    pub rules_processed: usize,

    /// Unique patterns present in the result but not in the base context.
    pub rules_added: usize,

    /// Patterns dropped (or replaced) by conflict resolution or override.
    pub rules_overridden: usize,

    /// Wall-clock time of the merge. Timing field; excluded from
    /// determinism comparisons.
    pub duration_ms: f64,
}

/// Outcome of a merge: the resolved rule set plus a full audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeResult {
    pub config: RuleSet,
    pub stats: MergeStats,
    pub conflicts: Vec<Conflict>,
    pub warnings: Vec<String>,
}

/// A single pattern added or removed relative to a base rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedRule {
    pub category: RuleCategory,
    pub pattern: String,
}

/// Read-only diff produced by [`preview_merge`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergePreview {
    pub preview: RuleSet,
    pub added: Vec<ChangedRule>,
    pub removed: Vec<ChangedRule>,
    pub conflicts: Vec<Conflict>,
    pub warnings: Vec<String>,
    pub stats: MergeStats,
}

/// Merge contexts in ascending level order under the configured strategy.
pub fn merge(contexts: &[MergeContext], options: &MergeOptions) -> EngineResult<MergeResult> {
    let start = Instant::now();
    if contexts.is_empty() {
        return Err(EngineError::NoContexts);
    }

    let rules_processed: usize = contexts.iter().map(|c| c.rule_set.total_rules()).sum();
    if let Some(ceiling) = options.rule_ceiling {
        if rules_processed > ceiling {
            return Err(EngineError::RuleCeilingExceeded {
                count: rules_processed,
                ceiling,
            });
        }
    }

    // Stable sort: equal levels keep their given order.
    let mut ordered: Vec<&MergeContext> = contexts.iter().collect();
    ordered.sort_by_key(|c| c.level);

    let mut result = match options.strategy {
        MergeStrategy::Override => override_merge(&ordered, options),
        MergeStrategy::Merge => precedence_merge(&ordered, options),
        MergeStrategy::Combine => combine_merge(&ordered, options),
        MergeStrategy::Selective => selective_merge(&ordered, options)?,
        MergeStrategy::Layered => layered_merge(&ordered, options),
    };

    result.stats.rules_processed = rules_processed;
    result.stats.rules_added = count_added(&ordered[0].rule_set, &result.config);
    result.stats.duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    Ok(result)
}

/// Fold `Merge` semantics over a base and a list of incoming rule sets,
/// accumulating conflicts and warnings across steps.
pub fn merge_multiple(
    base: &RuleSet,
    incoming: &[RuleSet],
    options: &MergeOptions,
) -> EngineResult<MergeResult> {
    let start = Instant::now();
    let mut current = base.normalized();
    let mut conflicts = Vec::new();
    let mut warnings = Vec::new();
    let mut overridden = 0;
    let mut processed = current.total_rules();

    for (i, rs) in incoming.iter().enumerate() {
        processed += rs.total_rules();
        let contexts = [
            MergeContext::new(current, Level::User, "base"),
            MergeContext::new(rs.clone(), Level::Template, format!("incoming[{i}]")),
        ];
        let step = merge(&contexts, options)?;
        conflicts.extend(step.conflicts);
        warnings.extend(step.warnings);
        overridden += step.stats.rules_overridden;
        current = step.config;
    }

    let rules_added = count_added(base, &current);
    Ok(MergeResult {
        config: current,
        stats: MergeStats {
            rules_processed: processed,
            rules_added,
            rules_overridden: overridden,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
        },
        conflicts,
        warnings,
    })
}

/// Compute what merging `incoming` into `base` would produce, without
/// committing anything: the merged rule set plus per-pattern added/removed
/// lists for UI diffing. A read-only derivative of [`merge`].
pub fn preview_merge(
    base: &RuleSet,
    incoming: &RuleSet,
    options: &MergeOptions,
) -> EngineResult<MergePreview> {
    let contexts = [
        MergeContext::new(base.clone(), Level::User, "base"),
        MergeContext::new(incoming.clone(), Level::Template, "incoming"),
    ];
    let result = merge(&contexts, options)?;

    let base_norm = base.normalized();
    let mut added = Vec::new();
    let mut removed = Vec::new();
    for category in RuleCategory::ALL {
        for p in result.config.rules(category) {
            if !base_norm.contains(category, p) {
                added.push(ChangedRule {
                    category,
                    pattern: p.clone(),
                });
            }
        }
        for p in base_norm.rules(category) {
            if !result.config.contains(category, p) {
                removed.push(ChangedRule {
                    category,
                    pattern: p.clone(),
                });
            }
        }
    }

    Ok(MergePreview {
        preview: result.config,
        added,
        removed,
        conflicts: result.conflicts,
        warnings: result.warnings,
        stats: result.stats,
    })
}

fn count_added(base: &RuleSet, result: &RuleSet) -> usize {
    let base = base.normalized();
    RuleCategory::ALL
        .iter()
        .map(|c| {
            result
                .rules(*c)
                .iter()
                .filter(|p| !base.contains(*c, p))
                .count()
        })
        .sum()
}

fn merged_metadata(ordered: &[&MergeContext], options: &MergeOptions) -> RuleSetMetadata {
    let mut metadata = ordered[0].rule_set.metadata.clone();
    if options.merge_metadata {
        for ctx in &ordered[1..] {
            let incoming = &ctx.rule_set.metadata;
            metadata.version = incoming.version.clone();
            if incoming.template_id.is_some() {
                metadata.template_id = incoming.template_id.clone();
            }
            for (k, v) in &incoming.annotations {
                metadata.annotations.insert(k.clone(), v.clone());
            }
        }
    }
    metadata
}

/// Shared bookkeeping for the precedence-aware strategies.
struct MergeState {
    acc: RuleSet,
    sources: HashMap<(RuleCategory, String), String>,
    cache: PatternCache,
    conflicts: Vec<Conflict>,
    warnings: Vec<String>,
    overridden: usize,
}

impl MergeState {
    fn new(acc: RuleSet, source: &str) -> Self {
        let sources = acc
            .iter_rules()
            .map(|(c, p)| ((c, p.to_string()), source.to_string()))
            .collect();
        Self {
            acc,
            sources,
            cache: PatternCache::new(),
            conflicts: Vec::new(),
            warnings: Vec::new(),
            overridden: 0,
        }
    }

    fn source_of(&self, category: RuleCategory, pattern: &str) -> Option<String> {
        self.sources
            .get(&(category, pattern.to_string()))
            .cloned()
    }

    /// Union a deny pattern in. Deny is additive and always takes effect:
    /// previously accepted allow/ask patterns overlapping the new deny are
    /// dropped, recorded as conflicts, so no lower-precedence rule survives
    /// against any deny in the result.
    fn add_deny(&mut self, pattern: &str, source: &str) {
        let p = pattern::normalize(pattern);
        if p.is_empty() || !self.acc.insert(RuleCategory::Deny, &p) {
            return;
        }
        self.sources
            .insert((RuleCategory::Deny, p.clone()), source.to_string());

        for category in [RuleCategory::Ask, RuleCategory::Allow] {
            let displaced: Vec<String> = self
                .acc
                .rules(category)
                .iter()
                .filter(|existing| self.cache.overlaps(&p, existing))
                .cloned()
                .collect();
            for existing in displaced {
                let kind = if pattern::equals(&p, &existing) {
                    ConflictKind::DuplicateAcrossCategories
                } else if category == RuleCategory::Allow {
                    ConflictKind::AllowOverridesDeny
                } else {
                    ConflictKind::AskOverridesDeny
                };
                let first =
                    ConflictRule::new(RuleCategory::Deny, &p).with_source(source.to_string());
                let mut second = ConflictRule::new(category, &existing);
                if let Some(s) = self.source_of(category, &existing) {
                    second = second.with_source(s);
                }
                self.conflicts.push(Conflict::new(kind, first, second));
                self.acc.remove(category, &existing);
                self.sources.remove(&(category, existing.clone()));
                self.overridden += 1;
                self.warnings.push(format!(
                    "dropped {category} rule '{existing}': overlaps deny rule '{p}' from {source}"
                ));
            }
        }
    }

    /// Add an ask/allow pattern, filtering it against the accumulated deny
    /// set per the resolution policy. Records a conflict per overlapping
    /// deny rule and a warning for every drop.
    fn add_filtered(
        &mut self,
        category: RuleCategory,
        raw: &str,
        source: &str,
        policy: ResolutionPolicy,
    ) {
        let p = pattern::normalize(raw);
        if p.is_empty() {
            return;
        }
        let overlapping: Vec<String> = self
            .acc
            .rules(RuleCategory::Deny)
            .iter()
            .filter(|d| self.cache.overlaps(d, &p))
            .cloned()
            .collect();

        if overlapping.is_empty() {
            if self.acc.insert(category, &p) {
                self.sources
                    .insert((category, p.clone()), source.to_string());
            }
            return;
        }

        for deny in &overlapping {
            let kind = if pattern::equals(deny, &p) {
                ConflictKind::DuplicateAcrossCategories
            } else if category == RuleCategory::Allow {
                ConflictKind::AllowOverridesDeny
            } else {
                ConflictKind::AskOverridesDeny
            };
            let mut first = ConflictRule::new(RuleCategory::Deny, deny);
            if let Some(s) = self.source_of(RuleCategory::Deny, deny) {
                first = first.with_source(s);
            }
            let second = ConflictRule::new(category, &p).with_source(source);
            self.conflicts.push(Conflict::new(kind, first, second));
        }

        match policy {
            ResolutionPolicy::TemplateWins => {
                for deny in &overlapping {
                    self.acc.remove(RuleCategory::Deny, deny);
                    self.sources.remove(&(RuleCategory::Deny, deny.clone()));
                    self.overridden += 1;
                    self.warnings.push(format!(
                        "template-wins: removed deny rule '{deny}' overridden by {category} rule '{p}'"
                    ));
                }
                if self.acc.insert(category, &p) {
                    self.sources
                        .insert((category, p.clone()), source.to_string());
                }
            }
            ResolutionPolicy::StrictDeny | ResolutionPolicy::BaseWins => {
                // The pattern may already sit in the accumulator (offered by
                // an earlier context); the report must match the state.
                if self.acc.remove(category, &p) {
                    self.sources.remove(&(category, p.clone()));
                }
                self.overridden += 1;
                self.warnings.push(format!(
                    "dropped {category} rule '{p}' from {source}: overlaps deny rule '{}'",
                    overlapping[0]
                ));
            }
            ResolutionPolicy::AskUser => {
                if self.acc.remove(category, &p) {
                    self.sources.remove(&(category, p.clone()));
                }
                self.overridden += 1;
                self.warnings.push(format!(
                    "ask-user resolution deferred for {category} rule '{p}'; deny precedence applied"
                ));
            }
        }
    }

    fn finish(self, metadata: RuleSetMetadata) -> MergeResult {
        let mut config = self.acc.normalized();
        config.metadata = metadata;
        MergeResult {
            config,
            stats: MergeStats {
                rules_overridden: self.overridden,
                ..MergeStats::default()
            },
            conflicts: self.conflicts,
            warnings: self.warnings,
        }
    }
}

fn override_merge(ordered: &[&MergeContext], options: &MergeOptions) -> MergeResult {
    let last = ordered[ordered.len() - 1];
    let mut config = last.rule_set.normalized();
    if options.merge_metadata && ordered.len() > 1 {
        config.metadata = merged_metadata(ordered, options);
    }
    let overridden: usize = ordered[..ordered.len() - 1]
        .iter()
        .map(|c| c.rule_set.total_rules())
        .sum();
    let conflicts = conflict::detect(&config);
    MergeResult {
        config,
        stats: MergeStats {
            rules_overridden: overridden,
            ..MergeStats::default()
        },
        conflicts,
        warnings: Vec::new(),
    }
}

fn precedence_merge(ordered: &[&MergeContext], options: &MergeOptions) -> MergeResult {
    let base = ordered[0];
    let mut seed = RuleSet::new();
    seed.metadata = base.rule_set.metadata.clone();
    let mut state = MergeState::new(seed, &base.source);

    // The base context goes through the same filtering as every other one,
    // so an internally conflicted base cannot smuggle an allow/ask past its
    // own deny rules.
    for ctx in ordered {
        let incoming = ctx.rule_set.normalized();
        // Deny is additive: once denied, never un-denied by a lower layer.
        for d in incoming.rules(RuleCategory::Deny) {
            state.add_deny(d, &ctx.source);
        }
        for a in incoming.rules(RuleCategory::Ask) {
            state.add_filtered(RuleCategory::Ask, a, &ctx.source, options.policy);
        }
        for a in incoming.rules(RuleCategory::Allow) {
            state.add_filtered(RuleCategory::Allow, a, &ctx.source, options.policy);
        }
    }

    state.finish(merged_metadata(ordered, options))
}

fn layered_merge(ordered: &[&MergeContext], options: &MergeOptions) -> MergeResult {
    let base = ordered[0];
    let mut seed = RuleSet::new();
    seed.metadata = base.rule_set.metadata.clone();
    let mut state = MergeState::new(seed, &base.source);

    // Highest safety priority first: every deny layer lands before any
    // ask/allow pattern is considered.
    for ctx in ordered {
        for d in ctx.rule_set.normalized().rules(RuleCategory::Deny) {
            state.add_deny(d, &ctx.source);
        }
    }
    for ctx in ordered {
        for a in ctx.rule_set.normalized().rules(RuleCategory::Ask) {
            state.add_filtered(RuleCategory::Ask, a, &ctx.source, options.policy);
        }
    }
    for ctx in ordered {
        for a in ctx.rule_set.normalized().rules(RuleCategory::Allow) {
            state.add_filtered(RuleCategory::Allow, a, &ctx.source, options.policy);
        }
    }

    state.finish(merged_metadata(ordered, options))
}

fn combine_merge(ordered: &[&MergeContext], options: &MergeOptions) -> MergeResult {
    let mut acc = ordered[0].rule_set.normalized();
    for ctx in &ordered[1..] {
        for (category, p) in ctx.rule_set.normalized().iter_rules() {
            acc.insert(category, p);
        }
    }
    let mut config = acc.normalized();
    config.metadata = merged_metadata(ordered, options);

    let conflicts = conflict::detect(&config);
    let warnings = if conflicts.is_empty() {
        Vec::new()
    } else {
        vec![format!(
            "combine left {} unresolved conflict(s); this strategy is diagnostic-only",
            conflicts.len()
        )]
    };
    MergeResult {
        config,
        stats: MergeStats::default(),
        conflicts,
        warnings,
    }
}

fn selective_merge(
    ordered: &[&MergeContext],
    options: &MergeOptions,
) -> EngineResult<MergeResult> {
    if options.sections.is_empty() {
        return Err(EngineError::NoSections);
    }
    let merged = precedence_merge(ordered, options);
    let base = ordered[0];

    let mut config = RuleSet::new();
    let (permissions_selected, metadata_selected) = (
        options.sections.contains(&MergeSection::Permissions),
        options.sections.contains(&MergeSection::Metadata),
    );

    config.permissions = if permissions_selected {
        merged.config.permissions
    } else {
        base.rule_set.normalized().permissions
    };
    config.metadata = if metadata_selected {
        merged.config.metadata
    } else {
        base.rule_set.metadata.clone()
    };

    Ok(if permissions_selected {
        MergeResult {
            config,
            stats: merged.stats,
            conflicts: merged.conflicts,
            warnings: merged.warnings,
        }
    } else {
        MergeResult {
            config,
            stats: MergeStats::default(),
            conflicts: Vec::new(),
            warnings: Vec::new(),
        }
    })
}
