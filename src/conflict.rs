//! Conflict detection between rule categories
//!
//! A conflict is a pair of rules from different categories whose patterns
//! overlap, implying contradictory access decisions. Same-category overlap
//! is redundancy, not a conflict, and is left to the validator to surface.

use serde::{Deserialize, Serialize};

use crate::pattern::{self, PatternCache};
use crate::ruleset::{RuleCategory, RuleSet};

/// How dangerous a conflict is if left unresolved.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SecurityImpact {
    Low,
    Medium,
    High,
    Critical,
}

/// Classification of a detected conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    /// An allow pattern overlaps a deny pattern: access meant to be blocked
    /// would be silently permitted. The most dangerous case.
    AllowOverridesDeny,

    /// An ask pattern overlaps a deny pattern: a hard block is downgraded to
    /// a prompt.
    AskOverridesDeny,

    /// The exact same pattern appears in more than one category.
    DuplicateAcrossCategories,
}

/// One side of a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRule {
    pub category: RuleCategory,
    pub pattern: String,

    /// Originating context, when known (merge reports fill this in).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ConflictRule {
    pub fn new(category: RuleCategory, pattern: impl Into<String>) -> Self {
        Self {
            category,
            pattern: pattern.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// A detected contradiction between two rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub impact: SecurityImpact,

    /// The higher-precedence rule (deny side for the override kinds).
    pub first: ConflictRule,

    /// The lower-precedence rule.
    pub second: ConflictRule,

    /// Human-readable resolution suggestion.
    pub suggestion: String,
}

impl Conflict {
    /// Build a conflict, deriving impact and suggestion from the kind and
    /// the categories involved.
    pub fn new(kind: ConflictKind, first: ConflictRule, second: ConflictRule) -> Self {
        let impact = impact_for(kind, first.category, second.category);
        let suggestion = suggestion_for(kind, &first, &second);
        Self {
            kind,
            impact,
            first,
            second,
            suggestion,
        }
    }
}

fn impact_for(kind: ConflictKind, first: RuleCategory, second: RuleCategory) -> SecurityImpact {
    match kind {
        ConflictKind::AllowOverridesDeny => SecurityImpact::High,
        ConflictKind::AskOverridesDeny => SecurityImpact::Medium,
        ConflictKind::DuplicateAcrossCategories => {
            // Severity follows the widest precedence gap involved.
            match (first, second) {
                (RuleCategory::Deny, RuleCategory::Allow) => SecurityImpact::High,
                (RuleCategory::Deny, RuleCategory::Ask) => SecurityImpact::Medium,
                _ => SecurityImpact::Low,
            }
        }
    }
}

fn suggestion_for(kind: ConflictKind, first: &ConflictRule, second: &ConflictRule) -> String {
    match kind {
        ConflictKind::AllowOverridesDeny | ConflictKind::AskOverridesDeny => format!(
            "remove or narrow {} rule '{}' so it no longer overlaps {} rule '{}'",
            second.category, second.pattern, first.category, first.pattern
        ),
        ConflictKind::DuplicateAcrossCategories => format!(
            "keep '{}' in {} and drop the duplicate from {}",
            first.pattern, first.category, second.category
        ),
    }
}

/// Find every cross-category conflict in a rule set.
///
/// The scan is the straightforward pairwise check, O(|deny| x (|allow| +
/// |ask|)) plus the ask/allow duplicate pass. Rule sets are expected to stay
/// in the hundreds; the validator warns when they grow past its ceiling
/// rather than this function changing behavior.
pub fn detect(rule_set: &RuleSet) -> Vec<Conflict> {
    let rs = rule_set.normalized();
    let mut cache = PatternCache::new();
    let mut conflicts = Vec::new();

    for deny in rs.rules(RuleCategory::Deny) {
        for (category, kind) in [
            (RuleCategory::Allow, ConflictKind::AllowOverridesDeny),
            (RuleCategory::Ask, ConflictKind::AskOverridesDeny),
        ] {
            for other in rs.rules(category) {
                if pattern::equals(deny, other) {
                    conflicts.push(Conflict::new(
                        ConflictKind::DuplicateAcrossCategories,
                        ConflictRule::new(RuleCategory::Deny, deny),
                        ConflictRule::new(category, other),
                    ));
                } else if cache.overlaps(deny, other) {
                    conflicts.push(Conflict::new(
                        kind,
                        ConflictRule::new(RuleCategory::Deny, deny),
                        ConflictRule::new(category, other),
                    ));
                }
            }
        }
    }

    // Ask/allow exact duplicates (overlap between them is not contradictory:
    // both sides grant some form of access).
    for ask in rs.rules(RuleCategory::Ask) {
        for allow in rs.rules(RuleCategory::Allow) {
            if pattern::equals(ask, allow) {
                conflicts.push(Conflict::new(
                    ConflictKind::DuplicateAcrossCategories,
                    ConflictRule::new(RuleCategory::Ask, ask),
                    ConflictRule::new(RuleCategory::Allow, allow),
                ));
            }
        }
    }

    conflicts.sort_by(|a, b| {
        (a.kind, &a.first.pattern, &a.second.pattern)
            .cmp(&(b.kind, &b.first.pattern, &b.second.pattern))
    });
    conflicts
}
