//! Pattern normalization and overlap testing
//!
//! Rule patterns are plain strings where `*` matches zero or more of any
//! character (including path separators). Overlap between two patterns is
//! decided by a bidirectional containment test: translate each pattern into
//! an anchored regex and check whether either regex matches the other
//! pattern's literal text.
//!
//! This is a conservative approximation of true set intersection. It can
//! produce false negatives when both patterns are non-trivial wildcards that
//! overlap only on a third string (e.g. `a*c` vs `a*d*c`). That limitation
//! is accepted behavior, not a defect: callers get deterministic, cheap
//! overlap checks and the deny-precedence machinery never depends on full
//! glob intersection.

use regex::Regex;
use std::collections::HashMap;

/// Trim surrounding whitespace. The action-keyword/pattern structure is left
/// intact; normalization never changes what a pattern matches.
pub fn normalize(pattern: &str) -> String {
    pattern.trim().to_string()
}

/// True iff the two patterns are identical after normalization.
pub fn equals(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Translate a wildcard pattern into an anchored regex. Every regex
/// metacharacter except `*` is escaped; `*` becomes `.*`.
fn wildcard_regex(pattern: &str) -> Option<Regex> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => source.push_str(".*"),
            c if regex_metachar(c) => {
                source.push('\\');
                source.push(c);
            }
            c => source.push(c),
        }
    }
    source.push('$');
    Regex::new(&source).ok()
}

fn regex_metachar(c: char) -> bool {
    matches!(
        c,
        '\\' | '.' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '-' | '#' | '&' | '~'
    )
}

/// Do the resource sets matched by two patterns intersect?
///
/// Without wildcards on either side this is plain equality. With wildcards,
/// overlap is the bidirectional containment test described in the module
/// docs. A pattern that fails regex translation degrades to no-overlap
/// rather than erroring; it never silently becomes match-everything.
pub fn overlaps(a: &str, b: &str) -> bool {
    let mut cache = PatternCache::new();
    cache.overlaps(a, b)
}

/// Compiled-regex cache scoped to a single engine operation.
///
/// The conflict scan is O(|deny| x (|allow| + |ask|)); compiling each
/// distinct pattern once keeps the scan cheap without any cross-call shared
/// state.
pub struct PatternCache {
    compiled: HashMap<String, Option<Regex>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self {
            compiled: HashMap::new(),
        }
    }

    fn regex_for(&mut self, pattern: &str) -> Option<&Regex> {
        self.compiled
            .entry(pattern.to_string())
            .or_insert_with(|| wildcard_regex(pattern))
            .as_ref()
    }

    /// Overlap test with per-pattern regex memoization.
    pub fn overlaps(&mut self, a: &str, b: &str) -> bool {
        let a = normalize(a);
        let b = normalize(b);
        if a.is_empty() || b.is_empty() {
            return false;
        }
        if !a.contains('*') && !b.contains('*') {
            return a == b;
        }
        if let Some(re) = self.regex_for(&a) {
            if re.is_match(&b) {
                return true;
            }
        }
        if let Some(re) = self.regex_for(&b) {
            if re.is_match(&a) {
                return true;
            }
        }
        false
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims() {
        assert_eq!(normalize("  Read(/a/**)  "), "Read(/a/**)");
    }

    #[test]
    fn test_equals_after_normalization() {
        assert!(equals(" Execute(sudo)", "Execute(sudo) "));
        assert!(!equals("Execute(sudo)", "Execute(su)"));
    }

    #[test]
    fn test_literal_overlap_is_equality() {
        assert!(overlaps("Execute(sudo)", "Execute(sudo)"));
        assert!(!overlaps("Execute(sudo)", "Execute(git)"));
    }

    #[test]
    fn test_wildcard_contains_literal() {
        assert!(overlaps("Execute(*)", "Execute(git)"));
        assert!(overlaps("Execute(git)", "Execute(*)"));
        assert!(overlaps("**/.env*", "/project/.env"));
        assert!(!overlaps("**/.env*", "/project/readme.md"));
    }

    #[test]
    fn test_wildcard_contains_wildcard() {
        // The deny pattern's regex matches the allow pattern's literal text.
        assert!(overlaps("**/secret*/**", "Read(**/secret*/public/**)"));
    }

    #[test]
    fn test_symmetry() {
        let pairs = [
            ("Execute(*)", "Execute(git)"),
            ("**/.env*", "/a/.env"),
            ("a*c", "abc"),
            ("Read(/a)", "Write(/a)"),
        ];
        for (a, b) in pairs {
            assert_eq!(overlaps(a, b), overlaps(b, a), "asymmetric for {a} vs {b}");
        }
    }

    #[test]
    fn test_reflexivity() {
        for p in ["*", "Execute(sudo)", "**/secrets/**", "a*c"] {
            assert!(overlaps(p, p), "not reflexive for {p}");
        }
    }

    #[test]
    fn test_empty_never_overlaps() {
        assert!(!overlaps("", "anything"));
        assert!(!overlaps("   ", "*"));
    }

    #[test]
    fn test_regex_metachars_are_literal() {
        // Parens, dots, and brackets in patterns must not act as regex syntax.
        assert!(overlaps("Read(a.b)", "Read(a.b)"));
        assert!(!overlaps("Read(a.b)", "Read(axb)"));
        assert!(!overlaps("Read([ab])", "Read(a)"));
        assert!(overlaps("Read([ab])", "Read([ab])"));
    }

    #[test]
    fn test_known_false_negative_accepted() {
        // Both patterns match "adc", but neither regex matches the other's
        // literal text. The containment approximation misses this overlap by
        // design; pinned here so nobody "fixes" it silently.
        assert!(!overlaps("a*c", "a*d*c"));
    }

    #[test]
    fn test_pattern_cache_matches_free_function() {
        let mut cache = PatternCache::new();
        for (a, b) in [("Execute(*)", "Execute(git)"), ("x", "y"), ("*", "*")] {
            assert_eq!(cache.overlaps(a, b), overlaps(a, b));
        }
    }
}
