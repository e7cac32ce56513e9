//! claude-policykit - Permission rule policy engine for Claude Code
//!
//! This library represents glob-pattern access rules ("deny", "ask",
//! "allow"), detects contradictions between them, and merges rule sets from
//! multiple origins (user settings, project config, templates, enterprise
//! policy) into one consistent, minimal, safe rule set.
//!
//! # Features
//!
//! - **Pattern overlap**: wildcard-aware overlap testing between rule patterns
//! - **Conflict detection**: classified cross-category conflicts with
//!   security impact ratings
//! - **Precedence resolution**: deny > ask > allow under selectable policies
//! - **Merging**: five strategies (override, merge, combine, selective,
//!   layered) with full audit trails and preview diffs
//! - **Validation**: structural and security-policy checks with
//!   errors/warnings and a coverage report
//! - **Caching**: bounded, taggable result caches behind an explicit engine
//!   instance
//!
//! # Example
//!
//! ```
//! use claude_policykit::{
//!     MergeContext, MergeOptions, PolicyEngine, RuleCategory, RuleSet, Level,
//! };
//!
//! let mut base = RuleSet::new();
//! base.insert(RuleCategory::Deny, "Execute(*)");
//!
//! let mut template = RuleSet::new();
//! template.insert(RuleCategory::Allow, "Execute(git)");
//!
//! let engine = PolicyEngine::default();
//! let contexts = [
//!     MergeContext::new(base, Level::User, "user settings"),
//!     MergeContext::new(template, Level::Template, "git template"),
//! ];
//! let result = engine.merge(&contexts, &MergeOptions::default()).unwrap();
//!
//! // strict-deny: the allow rule lost to the deny wildcard.
//! assert!(!result.config.contains(RuleCategory::Allow, "Execute(git)"));
//! assert_eq!(result.conflicts.len(), 1);
//! ```

pub mod cache;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod merge;
pub mod pattern;
pub mod resolve;
pub mod ruleset;
pub mod validate;

// Re-exports for convenience
pub use config::EngineConfig;
pub use conflict::{Conflict, ConflictKind, ConflictRule, SecurityImpact};
pub use engine::PolicyEngine;
pub use error::{EngineError, EngineResult};
pub use merge::{
    ChangedRule, MergeOptions, MergePreview, MergeResult, MergeSection, MergeStats, MergeStrategy,
};
pub use resolve::{Resolution, ResolutionAction, ResolutionPolicy};
pub use ruleset::{Action, Level, MergeContext, Permissions, RuleCategory, RuleSet, RuleSetMetadata};
pub use validate::{
    ComplianceFramework, Severity, ValidationIssue, ValidationOptions, ValidationResult,
};
