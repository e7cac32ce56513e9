//! Integration tests for pattern overlap and conflict detection

use claude_policykit::{
    pattern, ConflictKind, PolicyEngine, ResolutionPolicy, RuleCategory, RuleSet, SecurityImpact,
};

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

// ============================================================================
// Overlap properties
// ============================================================================

#[test]
fn test_overlap_symmetry() {
    let corpus = [
        "Execute(*)",
        "Execute(git)",
        "Execute(git *)",
        "Read(**/secrets/**)",
        "Read(**/secret*/public/**)",
        "**/.env*",
        "/project/.env",
        "Network(*.internal)",
        "Network(api.internal)",
        "a*c",
        "a*d*c",
        "plain-literal",
    ];
    for a in corpus {
        for b in corpus {
            assert_eq!(
                pattern::overlaps(a, b),
                pattern::overlaps(b, a),
                "overlaps not symmetric for '{a}' / '{b}'"
            );
        }
    }
}

#[test]
fn test_overlap_reflexivity() {
    for p in [
        "Execute(sudo)",
        "*",
        "**/secrets/**",
        "Network(*.internal)",
        "a*d*c",
    ] {
        assert!(pattern::overlaps(p, p), "'{p}' does not overlap itself");
    }
}

#[test]
fn test_overlap_containment_approximation() {
    // Wildcard contains literal, both directions.
    assert!(pattern::overlaps("Network(*.internal)", "Network(api.internal)"));
    assert!(pattern::overlaps("Network(api.internal)", "Network(*.internal)"));

    // Accepted false negative: both match "adc", but neither pattern's
    // regex matches the other's literal text.
    assert!(!pattern::overlaps("a*c", "a*d*c"));
}

// ============================================================================
// Conflict completeness
// ============================================================================

#[test]
fn test_conflict_completeness_single_overlap() {
    let rs = rule_set(&["**/secret*/**"], &["Read(**/secret*/public/**)"], &[]);
    let engine = PolicyEngine::default();
    let conflicts = engine.detect_conflicts(&rs);

    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].kind, ConflictKind::AllowOverridesDeny);
    assert_eq!(conflicts[0].impact, SecurityImpact::High);
    assert_eq!(conflicts[0].first.pattern, "**/secret*/**");
    assert_eq!(conflicts[0].second.pattern, "Read(**/secret*/public/**)");
}

#[test]
fn test_conflict_kinds_and_impacts() {
    let rs = rule_set(
        &["Execute(*)", "Write(/etc/passwd)"],
        &["Execute(cargo)"],
        &["Execute(npm)", "Write(/etc/passwd)"],
    );
    let engine = PolicyEngine::default();
    let conflicts = engine.detect_conflicts(&rs);

    let kinds: Vec<ConflictKind> = conflicts.iter().map(|c| c.kind).collect();
    assert!(kinds.contains(&ConflictKind::AllowOverridesDeny));
    assert!(kinds.contains(&ConflictKind::AskOverridesDeny));
    assert!(kinds.contains(&ConflictKind::DuplicateAcrossCategories));

    for c in &conflicts {
        match c.kind {
            ConflictKind::AllowOverridesDeny => assert_eq!(c.impact, SecurityImpact::High),
            ConflictKind::AskOverridesDeny => assert_eq!(c.impact, SecurityImpact::Medium),
            ConflictKind::DuplicateAcrossCategories => {
                assert_eq!(c.impact, SecurityImpact::Medium)
            }
        }
        assert!(!c.suggestion.is_empty());
    }
}

#[test]
fn test_detection_is_pure() {
    let rs = rule_set(&["Execute(*)"], &["Execute(git)"], &[]);
    let before = rs.clone();
    let engine = PolicyEngine::default();
    let first = engine.detect_conflicts(&rs);
    let second = engine.detect_conflicts(&rs);
    assert_eq!(first, second);
    assert_eq!(rs, before);
}

// ============================================================================
// Resolution audit trail
// ============================================================================

#[test]
fn test_resolution_records_every_action() {
    let rs = rule_set(
        &["Execute(*)"],
        &["Execute(git)", "Execute(cargo)"],
        &["Execute(npm)"],
    );
    let engine = PolicyEngine::default();
    let resolution = engine.resolve_conflicts(&rs, ResolutionPolicy::StrictDeny);

    assert_eq!(resolution.actions.len(), 3);
    assert!(resolution.rule_set.rules(RuleCategory::Allow).is_empty());
    assert!(resolution.rule_set.rules(RuleCategory::Ask).is_empty());
    assert!(resolution
        .actions
        .iter()
        .all(|a| a.kept.pattern == "Execute(*)"));
}

#[test]
fn test_template_wins_resolution_keeps_grants() {
    let rs = rule_set(&["Execute(*)"], &["Execute(git)"], &[]);
    let engine = PolicyEngine::default();
    let resolution = engine.resolve_conflicts(&rs, ResolutionPolicy::TemplateWins);

    assert!(!resolution.rule_set.contains(RuleCategory::Deny, "Execute(*)"));
    assert!(resolution.rule_set.contains(RuleCategory::Allow, "Execute(git)"));
}

#[test]
fn test_malformed_heavy_patterns_never_panic() {
    // Stress the regex translation with metacharacter-dense patterns.
    let rs = rule_set(
        &["a[b{c(d\\e*", "((("],
        &["a[b{c(d\\e*", ")]}"],
        &["^$|.+?"],
    );
    let engine = PolicyEngine::default();
    let conflicts = engine.detect_conflicts(&rs);
    // The exact duplicate is still caught by string equality.
    assert!(conflicts
        .iter()
        .any(|c| c.kind == ConflictKind::DuplicateAcrossCategories));
}
