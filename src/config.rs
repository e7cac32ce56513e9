//! Engine configuration loading
//!
//! Supports TOML configuration with embedded defaults. Configuration only
//! tunes caching and limit knobs; it never changes what a merge or
//! validation means.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::EngineError;
use crate::validate::ValidationOptions;

/// Result-cache settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,

    /// Maximum cached results per operation kind.
    pub max_entries: usize,

    /// Entry lifetime in seconds; zero disables age expiry.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 128,
            ttl_secs: 300,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }

    /// Effective capacity: zero when the cache is disabled.
    pub fn capacity(&self) -> usize {
        if self.enabled {
            self.max_entries
        } else {
            0
        }
    }
}

/// Rule-count limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Hard circuit breaker: merges refuse inputs above this count.
    pub rule_ceiling: usize,

    /// Advisory ceiling: the validator recommends splitting above this.
    pub advisory_ceiling: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            rule_ceiling: 10_000,
            advisory_ceiling: 1_000,
        }
    }
}

/// Default validation knobs applied when a caller passes no explicit
/// [`ValidationOptions`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub production_grade: bool,
    pub min_deny_pattern_len: usize,
    pub max_allow_deny_ratio: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            production_grade: false,
            min_deny_pattern_len: 4,
            max_allow_deny_ratio: 3,
        }
    }
}

/// Main engine configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub limits: LimitsConfig,
    pub validation: ValidationConfig,
}

impl EngineConfig {
    /// Load configuration from the standard locations, falling back to
    /// defaults.
    pub fn load() -> Self {
        let config_paths = [
            dirs::home_dir().map(|p| p.join(".claude/policykit/config.toml")),
            Some(PathBuf::from("/etc/claude-policykit/config.toml")),
        ];

        for path in config_paths.into_iter().flatten() {
            if path.exists() {
                if let Ok(content) = std::fs::read_to_string(&path) {
                    match toml::from_str(&content) {
                        Ok(config) => return config,
                        Err(e) => {
                            eprintln!("Warning: Failed to parse {}: {}", path.display(), e);
                        }
                    }
                }
            }
        }

        EngineConfig::default()
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Validation options derived from the configured defaults.
    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            production_grade: self.validation.production_grade,
            min_deny_pattern_len: self.validation.min_deny_pattern_len,
            max_allow_deny_ratio: self.validation.max_allow_deny_ratio,
            rule_ceiling: self.limits.advisory_ceiling,
            ..ValidationOptions::default()
        }
    }
}

/// Embedded default configuration
pub const DEFAULT_CONFIG_TOML: &str = r#"
[cache]
enabled = true
max_entries = 128
ttl_secs = 300

[limits]
rule_ceiling = 10000
advisory_ceiling = 1000

[validation]
production_grade = false
min_deny_pattern_len = 4
max_allow_deny_ratio = 3
"#;
