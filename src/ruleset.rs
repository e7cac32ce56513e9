//! Core rule-set data model
//!
//! Rules are plain pattern strings grouped into three categories (deny, ask,
//! allow). Rule sets are immutable value objects: every engine operation
//! takes rule sets by reference and returns new ones.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use crate::pattern;

/// The three permission categories, in precedence order (deny highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    Deny,
    Ask,
    Allow,
}

impl RuleCategory {
    /// All categories, deny first.
    pub const ALL: [RuleCategory; 3] = [RuleCategory::Deny, RuleCategory::Ask, RuleCategory::Allow];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::Deny => "deny",
            RuleCategory::Ask => "ask",
            RuleCategory::Allow => "allow",
        }
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action keyword of an `Action(pattern)` rule string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Write,
    Execute,
    Network,
}

impl Action {
    fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "Read" => Some(Action::Read),
            "Write" => Some(Action::Write),
            "Execute" => Some(Action::Execute),
            "Network" => Some(Action::Network),
            _ => None,
        }
    }
}

/// Split a rule of the form `Action(inner)` into its action keyword and
/// inner pattern. Returns `None` for bare patterns or unknown actions; the
/// engine treats those as opaque strings.
pub fn parse_action(rule: &str) -> Option<(Action, &str)> {
    let rule = rule.trim();
    let open = rule.find('(')?;
    if !rule.ends_with(')') {
        return None;
    }
    let action = Action::from_keyword(&rule[..open])?;
    Some((action, &rule[open + 1..rule.len() - 1]))
}

/// The deny/allow/ask pattern lists of a rule set.
///
/// Invariant: each list holds unique normalized patterns (a set, not a bag).
/// Cross-category duplicates are representable; they are conflicts for the
/// detector to report, not construction errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Permissions {
    pub deny: Vec<String>,
    pub allow: Vec<String>,
    pub ask: Vec<String>,
}

/// Rule set metadata carried alongside the permission lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSetMetadata {
    pub version: String,

    /// Creation time, epoch milliseconds.
    pub timestamp: i64,

    /// Template this rule set was instantiated from, if any.
    #[serde(rename = "templateId", skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,

    /// Free-form annotations (sorted for deterministic serialization).
    #[serde(flatten)]
    pub annotations: BTreeMap<String, serde_json::Value>,
}

impl Default for RuleSetMetadata {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            timestamp: Utc::now().timestamp_millis(),
            template_id: None,
            annotations: BTreeMap::new(),
        }
    }
}

/// A full rule set: three categorized pattern lists plus metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    pub permissions: Permissions,
    pub metadata: RuleSetMetadata,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a rule set from its JSON wire shape.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// The pattern list for a category.
    pub fn rules(&self, category: RuleCategory) -> &[String] {
        match category {
            RuleCategory::Deny => &self.permissions.deny,
            RuleCategory::Ask => &self.permissions.ask,
            RuleCategory::Allow => &self.permissions.allow,
        }
    }

    fn rules_mut(&mut self, category: RuleCategory) -> &mut Vec<String> {
        match category {
            RuleCategory::Deny => &mut self.permissions.deny,
            RuleCategory::Ask => &mut self.permissions.ask,
            RuleCategory::Allow => &mut self.permissions.allow,
        }
    }

    /// Insert a pattern into a category, normalizing it and skipping
    /// duplicates. Returns true if the pattern was new.
    pub fn insert(&mut self, category: RuleCategory, pattern: &str) -> bool {
        let normalized = pattern::normalize(pattern);
        if normalized.is_empty() {
            return false;
        }
        let list = self.rules_mut(category);
        if list.iter().any(|p| *p == normalized) {
            return false;
        }
        list.push(normalized);
        true
    }

    /// Remove a pattern from a category. Returns true if it was present.
    pub fn remove(&mut self, category: RuleCategory, pattern: &str) -> bool {
        let normalized = pattern::normalize(pattern);
        let list = self.rules_mut(category);
        let before = list.len();
        list.retain(|p| *p != normalized);
        list.len() != before
    }

    pub fn contains(&self, category: RuleCategory, pattern: &str) -> bool {
        let normalized = pattern::normalize(pattern);
        self.rules(category).iter().any(|p| *p == normalized)
    }

    /// Total rule count across all categories.
    pub fn total_rules(&self) -> usize {
        RuleCategory::ALL
            .iter()
            .map(|c| self.rules(*c).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_rules() == 0
    }

    /// Iterate every (category, pattern) pair, deny first.
    pub fn iter_rules(&self) -> impl Iterator<Item = (RuleCategory, &str)> {
        RuleCategory::ALL.into_iter().flat_map(move |c| {
            self.rules(c).iter().map(move |p| (c, p.as_str()))
        })
    }

    /// A copy with every category trimmed, deduplicated, and sorted
    /// lexicographically. Sorting makes output diffable and merge output
    /// deterministic.
    pub fn normalized(&self) -> RuleSet {
        let mut out = self.clone();
        for category in RuleCategory::ALL {
            let list = out.rules_mut(category);
            for p in list.iter_mut() {
                *p = pattern::normalize(p);
            }
            list.retain(|p| !p.is_empty());
            list.sort();
            list.dedup();
        }
        out
    }

    /// SHA-256 of the canonical JSON form. Stable for identical content, so
    /// it is usable as a cache key.
    pub fn content_hash(&self) -> String {
        let canonical = self.normalized();
        let json = serde_json::to_string(&canonical).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Origin tier of a rule set. Orders merge application only; it never alters
/// the deny > ask > allow precedence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "kebab-case")]
pub enum Level {
    #[default]
    User,
    Project,
    Template,
    Enterprise,
    CliOverride,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::User => "user",
            Level::Project => "project",
            Level::Template => "template",
            Level::Enterprise => "enterprise",
            Level::CliOverride => "cli-override",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule set tagged with its origin for merging and diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeContext {
    pub rule_set: RuleSet,
    pub level: Level,

    /// Where the rule set came from, for conflict reports ("user settings",
    /// a template id, a file path).
    pub source: String,
}

impl MergeContext {
    pub fn new(rule_set: RuleSet, level: Level, source: impl Into<String>) -> Self {
        Self {
            rule_set,
            level,
            source: source.into(),
        }
    }
}
