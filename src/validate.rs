//! Rule-set validation
//!
//! Structural completeness plus security-policy soundness. Errors block
//! downstream application of a rule set; warnings are advisory and never
//! drop rules. Every check is independently toggleable and reports itself in
//! the coverage list.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::conflict::{self, SecurityImpact};
use crate::pattern;
use crate::ruleset::{parse_action, RuleCategory, RuleSet};

/// Issue severity. Errors make a rule set invalid; warnings never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,

    /// Which check produced this issue.
    pub check: String,

    /// Location within the rule set, e.g. `permissions.allow[2]`.
    pub path: String,

    pub message: String,
}

impl ValidationIssue {
    fn error(check: &str, path: String, message: String) -> Self {
        Self {
            severity: Severity::Error,
            check: check.to_string(),
            path,
            message,
        }
    }

    fn warning(check: &str, path: String, message: String) -> Self {
        Self {
            severity: Severity::Warning,
            check: check.to_string(),
            path,
            message,
        }
    }
}

/// Outcome of validating one rule set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,

    /// Names of the checks that actually ran.
    pub coverage: Vec<String>,
}

/// Compliance frameworks a rule set can declare. Each carries the
/// sensitive-data keywords its deny/ask rules are expected to reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceFramework {
    /// Payment card data handling.
    Pci,
    /// Protected health information.
    Hipaa,
    /// Personal data protection.
    Gdpr,
    /// Financial audit controls.
    Sox,
}

impl ComplianceFramework {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceFramework::Pci => "pci",
            ComplianceFramework::Hipaa => "hipaa",
            ComplianceFramework::Gdpr => "gdpr",
            ComplianceFramework::Sox => "sox",
        }
    }

    /// Keywords a deny/ask rule should textually reference. Advisory only:
    /// keyword absence does not prove non-compliance.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            ComplianceFramework::Pci => &["card", "cardholder", "payment", "pan"],
            ComplianceFramework::Hipaa => &["phi", "patient", "health", "medical"],
            ComplianceFramework::Gdpr => &["personal", "pii", "gdpr", "consent"],
            ComplianceFramework::Sox => &["audit", "ledger", "financial", "sox"],
        }
    }
}

/// Validation configuration. Every check is on by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    pub check_structure: bool,
    pub check_security: bool,
    pub check_baseline: bool,
    pub check_compliance: bool,
    pub check_scale: bool,
    pub check_conflicts: bool,

    /// Production-grade contexts require a non-empty deny list and
    /// essential deny coverage.
    pub production_grade: bool,

    pub compliance_frameworks: Vec<ComplianceFramework>,

    /// Minimum total rules the context requires; zero disables the check.
    pub min_rules_required: usize,

    /// Advisory ceiling: rule sets above this get a split recommendation.
    pub rule_ceiling: usize,

    /// Deny patterns shorter than this are flagged as low-confidence.
    pub min_deny_pattern_len: usize,

    /// Warn when allow rules outnumber deny rules by more than this factor.
    pub max_allow_deny_ratio: usize,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            check_structure: true,
            check_security: true,
            check_baseline: true,
            check_compliance: true,
            check_scale: true,
            check_conflicts: true,
            production_grade: false,
            compliance_frameworks: Vec::new(),
            min_rules_required: 0,
            rule_ceiling: 1000,
            min_deny_pattern_len: 4,
            max_allow_deny_ratio: 3,
        }
    }
}

/// Universal wildcards that defeat a deny-oriented system when allowed.
static UNIVERSAL_WILDCARDS: Lazy<Vec<&'static str>> =
    Lazy::new(|| vec!["*", "**", ".*", "**/*"]);

/// Deny coverage every production-grade rule set is expected to carry.
static ESSENTIAL_DENY_KEYWORDS: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("rm -rf", "destructive shell commands"),
        ("sudo", "privilege escalation"),
        ("chmod 777", "world-writable permission changes"),
    ]
});

/// Validate a rule set against structural and security-policy checks.
pub fn validate(rule_set: &RuleSet, options: &ValidationOptions) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut coverage = Vec::new();

    if options.check_structure {
        coverage.push("structure".to_string());
        check_structure(rule_set, &mut errors, &mut warnings);
    }
    if options.check_security {
        coverage.push("security".to_string());
        check_security(rule_set, options, &mut errors, &mut warnings);
    }
    if options.check_baseline {
        coverage.push("baseline".to_string());
        check_baseline(rule_set, options, &mut errors, &mut warnings);
    }
    if options.check_compliance {
        coverage.push("compliance".to_string());
        check_compliance(rule_set, options, &mut warnings);
    }
    if options.check_scale {
        coverage.push("scale".to_string());
        check_scale(rule_set, options, &mut errors, &mut warnings);
    }
    if options.check_conflicts {
        coverage.push("conflicts".to_string());
        check_conflicts(rule_set, &mut errors, &mut warnings);
    }

    ValidationResult {
        is_valid: errors.is_empty(),
        errors,
        warnings,
        coverage,
    }
}

fn path_of(category: RuleCategory, index: usize) -> String {
    format!("permissions.{}[{}]", category, index)
}

fn check_structure(
    rule_set: &RuleSet,
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    for category in RuleCategory::ALL {
        let rules = rule_set.rules(category);
        for (i, p) in rules.iter().enumerate() {
            if pattern::normalize(p).is_empty() {
                errors.push(ValidationIssue::error(
                    "structure",
                    path_of(category, i),
                    format!("empty pattern in {} list", category),
                ));
            }
        }
        // Same-category exact duplicates are redundancy, not conflicts.
        for (i, p) in rules.iter().enumerate() {
            if rules[..i].iter().any(|q| pattern::equals(p, q)) {
                warnings.push(ValidationIssue::warning(
                    "structure",
                    path_of(category, i),
                    format!("duplicate pattern '{}' in {} list", p.trim(), category),
                ));
            }
        }
    }
}

fn check_security(
    rule_set: &RuleSet,
    options: &ValidationOptions,
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    for (i, p) in rule_set.rules(RuleCategory::Allow).iter().enumerate() {
        let normalized = pattern::normalize(p);
        if UNIVERSAL_WILDCARDS.contains(&normalized.as_str()) {
            // Always an error: a universal allow defeats a deny-oriented
            // system regardless of policy context.
            errors.push(ValidationIssue::error(
                "security",
                path_of(RuleCategory::Allow, i),
                format!("universal wildcard allow rule '{}'", normalized),
            ));
        } else if let Some((_, inner)) = parse_action(&normalized) {
            if UNIVERSAL_WILDCARDS.contains(&inner) {
                warnings.push(ValidationIssue::warning(
                    "security",
                    path_of(RuleCategory::Allow, i),
                    format!("allow rule '{}' wraps a universal wildcard", normalized),
                ));
            }
        }
    }

    for (i, p) in rule_set.rules(RuleCategory::Deny).iter().enumerate() {
        let normalized = pattern::normalize(p);
        if !normalized.is_empty() && normalized.len() < options.min_deny_pattern_len {
            warnings.push(ValidationIssue::warning(
                "security",
                path_of(RuleCategory::Deny, i),
                format!(
                    "deny pattern '{}' is shorter than {} characters (low-confidence rule)",
                    normalized, options.min_deny_pattern_len
                ),
            ));
        }
    }

    let deny_count = rule_set.rules(RuleCategory::Deny).len();
    let allow_count = rule_set.rules(RuleCategory::Allow).len();
    if allow_count > deny_count * options.max_allow_deny_ratio {
        warnings.push(ValidationIssue::warning(
            "security",
            "permissions".to_string(),
            format!(
                "{} allow rules against {} deny rules (over {}x); configuration may be overly permissive",
                allow_count, deny_count, options.max_allow_deny_ratio
            ),
        ));
    }
}

fn check_baseline(
    rule_set: &RuleSet,
    options: &ValidationOptions,
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    let hardened = options.production_grade || !options.compliance_frameworks.is_empty();
    if !hardened {
        return;
    }

    let deny = rule_set.rules(RuleCategory::Deny);
    if deny.is_empty() {
        errors.push(ValidationIssue::error(
            "baseline",
            "permissions.deny".to_string(),
            "production-grade rule sets require at least one deny rule".to_string(),
        ));
        return;
    }

    for (keyword, description) in ESSENTIAL_DENY_KEYWORDS.iter() {
        let covered = deny.iter().any(|p| p.to_lowercase().contains(keyword));
        if !covered {
            warnings.push(ValidationIssue::warning(
                "baseline",
                "permissions.deny".to_string(),
                format!("no deny rule covering {} ('{}')", description, keyword),
            ));
        }
    }
}

fn check_compliance(
    rule_set: &RuleSet,
    options: &ValidationOptions,
    warnings: &mut Vec<ValidationIssue>,
) {
    for framework in &options.compliance_frameworks {
        let referenced = rule_set
            .rules(RuleCategory::Deny)
            .iter()
            .chain(rule_set.rules(RuleCategory::Ask))
            .any(|p| {
                let lower = p.to_lowercase();
                framework.keywords().iter().any(|k| lower.contains(k))
            });
        if !referenced {
            warnings.push(ValidationIssue::warning(
                "compliance",
                "permissions".to_string(),
                format!(
                    "no deny/ask rule references {} keywords ({})",
                    framework.as_str(),
                    framework.keywords().join(", ")
                ),
            ));
        }
    }
}

fn check_scale(
    rule_set: &RuleSet,
    options: &ValidationOptions,
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    let total = rule_set.total_rules();
    let rules_required = options.min_rules_required > 0
        || options.production_grade
        || !options.compliance_frameworks.is_empty();

    if total == 0 && rules_required {
        errors.push(ValidationIssue::error(
            "scale",
            "permissions".to_string(),
            "rule set is empty but the context requires rules".to_string(),
        ));
    } else if options.min_rules_required > 0 && total < options.min_rules_required {
        errors.push(ValidationIssue::error(
            "scale",
            "permissions".to_string(),
            format!(
                "rule set has {} rules, context requires at least {}",
                total, options.min_rules_required
            ),
        ));
    }

    if total > options.rule_ceiling {
        warnings.push(ValidationIssue::warning(
            "scale",
            "permissions".to_string(),
            format!(
                "{} rules exceeds the advisory ceiling of {}; consider splitting the rule set (the pairwise conflict scan is quadratic)",
                total, options.rule_ceiling
            ),
        ));
    }
}

fn check_conflicts(
    rule_set: &RuleSet,
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    for conflict in conflict::detect(rule_set) {
        let issue_path = format!(
            "permissions.{}/{}",
            conflict.first.category, conflict.second.category
        );
        let message = format!(
            "{:?} between '{}' and '{}': {}",
            conflict.kind, conflict.first.pattern, conflict.second.pattern, conflict.suggestion
        );
        if conflict.impact >= SecurityImpact::High {
            errors.push(ValidationIssue::error("conflicts", issue_path, message));
        } else {
            warnings.push(ValidationIssue::warning("conflicts", issue_path, message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_set(deny: &[&str], allow: &[&str], ask: &[&str]) -> RuleSet {
        let mut rs = RuleSet::new();
        for p in deny {
            rs.insert(RuleCategory::Deny, p);
        }
        for p in allow {
            rs.insert(RuleCategory::Allow, p);
        }
        for p in ask {
            rs.insert(RuleCategory::Ask, p);
        }
        rs
    }

    #[test]
    fn test_clean_set_is_valid() {
        let rs = rule_set(&["**/.env*", "Execute(sudo)"], &["Read(/project/**)"], &[]);
        let result = validate(&rs, &ValidationOptions::default());
        assert!(result.is_valid, "unexpected errors: {:?}", result.errors);
        assert_eq!(result.coverage.len(), 6);
    }

    #[test]
    fn test_universal_allow_is_always_an_error() {
        for universal in ["*", "**", ".*", "**/*"] {
            let mut rs = rule_set(&["**/.env*"], &[], &[]);
            rs.permissions.allow.push(universal.to_string());
            let result = validate(&rs, &ValidationOptions::default());
            assert!(!result.is_valid, "'{}' should be rejected", universal);
            assert!(result
                .errors
                .iter()
                .any(|e| e.check == "security" && e.message.contains(universal)));
        }
    }

    #[test]
    fn test_action_wrapped_universal_allow_warns() {
        let rs = rule_set(&["**/.env*"], &["Execute(*)"], &[]);
        let result = validate(&rs, &ValidationOptions::default());
        assert!(result.is_valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.message.contains("wraps a universal wildcard")));
    }

    #[test]
    fn test_empty_pattern_is_structural_error() {
        let mut rs = rule_set(&["**/.env*"], &[], &[]);
        rs.permissions.deny.push("   ".to_string());
        let result = validate(&rs, &ValidationOptions::default());
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].check, "structure");
        assert_eq!(result.errors[0].path, "permissions.deny[1]");
    }

    #[test]
    fn test_short_deny_pattern_warns() {
        let rs = rule_set(&["*.x"], &[], &[]);
        let result = validate(&rs, &ValidationOptions::default());
        assert!(result.is_valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.message.contains("low-confidence")));
    }

    #[test]
    fn test_allow_ratio_warns() {
        let rs = rule_set(
            &["**/.env*"],
            &["Read(/a)", "Read(/b)", "Read(/c)", "Read(/d)"],
            &[],
        );
        let result = validate(&rs, &ValidationOptions::default());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.message.contains("overly permissive")));
    }

    #[test]
    fn test_production_requires_deny() {
        let rs = rule_set(&[], &["Read(/project/**)"], &[]);
        let options = ValidationOptions {
            production_grade: true,
            ..ValidationOptions::default()
        };
        let result = validate(&rs, &options);
        assert!(!result.is_valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.check == "baseline" && e.message.contains("deny")));
    }

    #[test]
    fn test_essential_deny_coverage_warns() {
        let rs = rule_set(&["**/.env*"], &[], &[]);
        let options = ValidationOptions {
            production_grade: true,
            ..ValidationOptions::default()
        };
        let result = validate(&rs, &options);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.message.contains("privilege escalation")));
    }

    #[test]
    fn test_compliance_keyword_heuristic() {
        let rs = rule_set(&["Execute(rm -rf*)", "Execute(sudo)", "chmod 777*"], &[], &[]);
        let options = ValidationOptions {
            compliance_frameworks: vec![ComplianceFramework::Pci],
            ..ValidationOptions::default()
        };
        let result = validate(&rs, &options);
        // Advisory only: still valid, but the missing PCI keywords warn.
        assert!(result.is_valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.check == "compliance" && w.message.contains("pci")));

        let covered = rule_set(&["Read(**/cardholder/**)"], &[], &[]);
        let result = validate(&covered, &options);
        assert!(!result
            .warnings
            .iter()
            .any(|w| w.check == "compliance"));
    }

    #[test]
    fn test_empty_set_error_when_rules_required() {
        let rs = RuleSet::new();
        let options = ValidationOptions {
            min_rules_required: 1,
            ..ValidationOptions::default()
        };
        let result = validate(&rs, &options);
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.check == "scale"));
    }

    #[test]
    fn test_oversize_set_warns() {
        let mut rs = RuleSet::new();
        for i in 0..11 {
            rs.insert(RuleCategory::Deny, &format!("Execute(tool-{i})"));
        }
        let options = ValidationOptions {
            rule_ceiling: 10,
            ..ValidationOptions::default()
        };
        let result = validate(&rs, &options);
        assert!(result.is_valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.message.contains("advisory ceiling")));
    }

    #[test]
    fn test_high_impact_conflict_is_error() {
        let rs = rule_set(&["Execute(*)"], &["Execute(git)"], &[]);
        let result = validate(&rs, &ValidationOptions::default());
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.check == "conflicts"));
    }

    #[test]
    fn test_medium_impact_conflict_is_warning() {
        let rs = rule_set(&["Execute(*)"], &[], &["Execute(git)"]);
        let result = validate(&rs, &ValidationOptions::default());
        assert!(result.is_valid);
        assert!(result.warnings.iter().any(|w| w.check == "conflicts"));
    }

    #[test]
    fn test_checks_are_toggleable() {
        let rs = rule_set(&["Execute(*)"], &["*"], &[]);
        let options = ValidationOptions {
            check_security: false,
            check_conflicts: false,
            ..ValidationOptions::default()
        };
        let result = validate(&rs, &options);
        assert!(result.is_valid);
        assert!(!result.coverage.contains(&"security".to_string()));
        assert!(result.coverage.contains(&"structure".to_string()));
    }

    #[test]
    fn test_warnings_never_invalidate() {
        let rs = rule_set(&["*.x"], &["Execute(*)"], &[]);
        let result = validate(&rs, &ValidationOptions::default());
        assert!(result.is_valid);
        assert!(!result.warnings.is_empty());
    }
}
