//! Precedence-based conflict resolution
//!
//! Precedence is fixed: deny > ask > allow. The policy only selects which
//! side of a conflict is discarded; it never reorders precedence itself.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::conflict::{Conflict, ConflictRule};
use crate::error::EngineError;
use crate::ruleset::RuleSet;

/// How conflicts are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionPolicy {
    /// Drop the allow/ask rule, keep the deny. The default; blocking
    /// decisions stay unambiguous.
    #[default]
    StrictDeny,

    /// Drop the conflicting deny instead, keeping the incoming allow/ask.
    /// Only for callers that explicitly want a template to loosen a prior
    /// restriction.
    TemplateWins,

    /// Drop the incoming allow/ask rule. Same outcome as strict-deny, kept
    /// as a distinct policy so audit trails record "the pre-existing
    /// configuration won" rather than "deny precedence applied".
    BaseWins,

    /// Defer to the user. The engine has no prompt; this behaves as
    /// strict-deny and records a warning that a decision was deferred. The
    /// actual prompt is an external collaborator's job.
    AskUser,
}

impl ResolutionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionPolicy::StrictDeny => "strict-deny",
            ResolutionPolicy::TemplateWins => "template-wins",
            ResolutionPolicy::BaseWins => "base-wins",
            ResolutionPolicy::AskUser => "ask-user",
        }
    }
}

impl FromStr for ResolutionPolicy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict-deny" => Ok(ResolutionPolicy::StrictDeny),
            "template-wins" => Ok(ResolutionPolicy::TemplateWins),
            "base-wins" => Ok(ResolutionPolicy::BaseWins),
            "ask-user" => Ok(ResolutionPolicy::AskUser),
            other => Err(EngineError::UnknownPolicy(other.to_string())),
        }
    }
}

/// One applied resolution, for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionAction {
    pub policy: ResolutionPolicy,
    pub kept: ConflictRule,
    pub dropped: ConflictRule,
}

/// A fully resolved rule set plus everything that was done to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub rule_set: RuleSet,
    pub actions: Vec<ResolutionAction>,
    pub warnings: Vec<String>,
}

/// Apply a resolution policy to every conflict, returning a new rule set.
///
/// Every conflict resolves to exactly one rule retained and one discarded;
/// the resolver never leaves partial state, and the returned actions list is
/// a complete audit trail even when a conflict's loser was already removed
/// by an earlier action.
pub fn resolve(rule_set: &RuleSet, conflicts: &[Conflict], policy: ResolutionPolicy) -> Resolution {
    let mut out = rule_set.clone();
    let mut actions = Vec::new();
    let mut warnings = Vec::new();

    for conflict in conflicts {
        let (kept, dropped) = match policy {
            // first is always the higher-precedence (deny) side.
            ResolutionPolicy::StrictDeny | ResolutionPolicy::BaseWins | ResolutionPolicy::AskUser => {
                (&conflict.first, &conflict.second)
            }
            ResolutionPolicy::TemplateWins => (&conflict.second, &conflict.first),
        };

        if policy == ResolutionPolicy::AskUser {
            warnings.push(format!(
                "ask-user resolution deferred for '{}' vs '{}'; deny precedence applied",
                conflict.first.pattern, conflict.second.pattern
            ));
        }

        out.remove(dropped.category, &dropped.pattern);
        actions.push(ResolutionAction {
            policy,
            kept: kept.clone(),
            dropped: dropped.clone(),
        });
    }

    Resolution {
        rule_set: out.normalized(),
        actions,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict;
    use crate::ruleset::RuleCategory;

    fn conflicted() -> RuleSet {
        let mut rs = RuleSet::new();
        rs.insert(RuleCategory::Deny, "Execute(*)");
        rs.insert(RuleCategory::Allow, "Execute(git)");
        rs.insert(RuleCategory::Allow, "Read(/project/**)");
        rs
    }

    #[test]
    fn test_strict_deny_drops_allow() {
        let rs = conflicted();
        let conflicts = conflict::detect(&rs);
        let resolution = resolve(&rs, &conflicts, ResolutionPolicy::StrictDeny);

        assert!(resolution.rule_set.contains(RuleCategory::Deny, "Execute(*)"));
        assert!(!resolution.rule_set.contains(RuleCategory::Allow, "Execute(git)"));
        assert!(resolution.rule_set.contains(RuleCategory::Allow, "Read(/project/**)"));
        assert_eq!(resolution.actions.len(), 1);
        assert_eq!(resolution.actions[0].dropped.pattern, "Execute(git)");
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn test_template_wins_drops_deny() {
        let rs = conflicted();
        let conflicts = conflict::detect(&rs);
        let resolution = resolve(&rs, &conflicts, ResolutionPolicy::TemplateWins);

        assert!(!resolution.rule_set.contains(RuleCategory::Deny, "Execute(*)"));
        assert!(resolution.rule_set.contains(RuleCategory::Allow, "Execute(git)"));
        assert_eq!(resolution.actions[0].kept.pattern, "Execute(git)");
    }

    #[test]
    fn test_base_wins_matches_strict_deny_outcome() {
        let rs = conflicted();
        let conflicts = conflict::detect(&rs);
        let strict = resolve(&rs, &conflicts, ResolutionPolicy::StrictDeny);
        let base = resolve(&rs, &conflicts, ResolutionPolicy::BaseWins);
        assert_eq!(strict.rule_set, base.rule_set);
        assert_eq!(base.actions[0].policy, ResolutionPolicy::BaseWins);
    }

    #[test]
    fn test_ask_user_defers_with_warning() {
        let rs = conflicted();
        let conflicts = conflict::detect(&rs);
        let resolution = resolve(&rs, &conflicts, ResolutionPolicy::AskUser);

        assert!(!resolution.rule_set.contains(RuleCategory::Allow, "Execute(git)"));
        assert_eq!(resolution.warnings.len(), 1);
        assert!(resolution.warnings[0].contains("deferred"));
    }

    #[test]
    fn test_shared_loser_recorded_per_conflict() {
        // Two denies overlap the same allow; the allow is removed once but
        // each conflict still gets its own audit entry.
        let mut rs = RuleSet::new();
        rs.insert(RuleCategory::Deny, "Execute(*)");
        rs.insert(RuleCategory::Deny, "Execute(g*)");
        rs.insert(RuleCategory::Allow, "Execute(git)");
        let conflicts = conflict::detect(&rs);
        assert_eq!(conflicts.len(), 2);

        let resolution = resolve(&rs, &conflicts, ResolutionPolicy::StrictDeny);
        assert!(!resolution.rule_set.contains(RuleCategory::Allow, "Execute(git)"));
        assert_eq!(resolution.actions.len(), 2);
        assert!(resolution
            .actions
            .iter()
            .all(|a| a.dropped.pattern == "Execute(git)"));
    }

    #[test]
    fn test_inputs_never_mutated() {
        let rs = conflicted();
        let before = rs.clone();
        let conflicts = conflict::detect(&rs);
        let _ = resolve(&rs, &conflicts, ResolutionPolicy::StrictDeny);
        assert_eq!(rs, before);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("strict-deny".parse::<ResolutionPolicy>().unwrap(), ResolutionPolicy::StrictDeny);
        assert_eq!("template-wins".parse::<ResolutionPolicy>().unwrap(), ResolutionPolicy::TemplateWins);
        assert!("yolo".parse::<ResolutionPolicy>().is_err());
    }
}
