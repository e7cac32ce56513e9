//! Engine error types
//!
//! Programming errors (unknown strategy names, empty merges) are fatal and
//! surface immediately. Bad rule data is never fatal here; it flows through
//! validation as errors/warnings instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A merge was requested with no input contexts.
    #[error("merge requires at least one context")]
    NoContexts,

    /// A strategy name from wire/config input did not match any known
    /// strategy. Strategies are a closed set; this is a caller bug.
    #[error("unsupported merge strategy: {0}")]
    UnknownStrategy(String),

    /// A resolution policy name did not match any known policy.
    #[error("unknown conflict resolution policy: {0}")]
    UnknownPolicy(String),

    /// The combined rule count exceeded the configured hard ceiling. Bounds
    /// worst-case CPU for the pairwise conflict scan.
    #[error("rule count {count} exceeds the configured ceiling of {ceiling}")]
    RuleCeilingExceeded { count: usize, ceiling: usize },

    /// A selective merge listed no sections to merge.
    #[error("selective merge requires at least one section")]
    NoSections,

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to parse rule set JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
