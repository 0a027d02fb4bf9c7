//! Glob Pattern Matching
//!
//! Shared by `KEYS` scanning and pattern subscriptions. The glob syntax is
//! deliberately small:
//!
//! - `*` matches zero or more characters
//! - `?` matches exactly one character
//! - everything else matches itself, including `[`, `]`, `\` and regex
//!   metacharacters such as `.` or `+`
//!
//! A pattern is translated once into an anchored regular expression and
//! matched against the whole subject. If the translated expression fails to
//! compile, the pattern degrades to exact string comparison.

use regex::Regex;
use std::fmt;
use tracing::warn;

#[derive(Clone)]
enum Matcher {
    /// `*` on its own
    Any,
    Regex(Regex),
    /// Fallback used when the translated pattern does not compile
    Exact,
}

/// A compiled glob pattern.
///
/// # Example
///
/// ```
/// use keystash::GlobPattern;
///
/// let pattern = GlobPattern::new("user:*");
/// assert!(pattern.matches("user:42"));
/// assert!(!pattern.matches("admin:user:42"));
/// ```
#[derive(Clone)]
pub struct GlobPattern {
    source: String,
    matcher: Matcher,
}

impl GlobPattern {
    /// Compiles a glob pattern. Never fails; see the module docs for the
    /// fallback behavior.
    pub fn new(pattern: &str) -> Self {
        if pattern == "*" {
            return Self {
                source: pattern.to_string(),
                matcher: Matcher::Any,
            };
        }

        let matcher = match Regex::new(&glob_to_regex(pattern)) {
            Ok(re) => Matcher::Regex(re),
            Err(e) => {
                warn!(pattern, error = %e, "Glob pattern failed to compile, using exact match");
                Matcher::Exact
            }
        };

        Self {
            source: pattern.to_string(),
            matcher,
        }
    }

    /// Returns the glob text as given.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Tests the whole of `text` against the pattern.
    pub fn matches(&self, text: &str) -> bool {
        match &self.matcher {
            Matcher::Any => true,
            Matcher::Regex(re) => re.is_match(text),
            Matcher::Exact => self.source == text,
        }
    }
}

impl fmt::Debug for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GlobPattern").field(&self.source).finish()
    }
}

/// Translates a glob into an anchored regex source string.
///
/// Literal runs are escaped as a whole so that no pattern character is ever
/// interpreted by the regex engine. `(?s)` lets wildcards match newlines too.
fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut literal = String::new();
    out.push_str("(?s)^");

    for c in pattern.chars() {
        match c {
            '*' | '?' => {
                if !literal.is_empty() {
                    out.push_str(&regex::escape(&literal));
                    literal.clear();
                }
                out.push_str(if c == '*' { ".*" } else { "." });
            }
            c => literal.push(c),
        }
    }

    if !literal.is_empty() {
        out.push_str(&regex::escape(&literal));
    }
    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star() {
        let pattern = GlobPattern::new("a*");
        assert!(pattern.matches("a"));
        assert!(pattern.matches("abc"));
        assert!(!pattern.matches("bac"));
        assert!(!pattern.matches("xabc"));
    }

    #[test]
    fn test_question_mark() {
        let pattern = GlobPattern::new("h?llo");
        assert!(pattern.matches("hello"));
        assert!(pattern.matches("hallo"));
        assert!(!pattern.matches("hllo"));
        assert!(!pattern.matches("heello"));
    }

    #[test]
    fn test_match_everything() {
        let pattern = GlobPattern::new("*");
        assert!(pattern.matches(""));
        assert!(pattern.matches("anything"));
        assert!(pattern.matches("multi\nline"));
    }

    #[test]
    fn test_anchored() {
        let pattern = GlobPattern::new("abc");
        assert!(pattern.matches("abc"));
        assert!(!pattern.matches("abcd"));
        assert!(!pattern.matches("xabc"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let pattern = GlobPattern::new("a.b+c");
        assert!(pattern.matches("a.b+c"));
        assert!(!pattern.matches("axbbc"));

        let pattern = GlobPattern::new("h[ae]llo");
        assert!(pattern.matches("h[ae]llo"));
        assert!(!pattern.matches("hello"));

        let pattern = GlobPattern::new("(x|y)*$");
        assert!(pattern.matches("(x|y)$"));
        assert!(pattern.matches("(x|y)anything$"));
        assert!(!pattern.matches("x"));
    }

    #[test]
    fn test_wildcards_match_newlines() {
        let pattern = GlobPattern::new("a?b*");
        assert!(pattern.matches("a\nb\n"));
    }

    #[test]
    fn test_unicode() {
        let pattern = GlobPattern::new("caf?");
        assert!(pattern.matches("café"));
        assert!(!pattern.matches("cafe\u{301}"));
    }

    #[test]
    fn test_exact_fallback() {
        let fallback = GlobPattern {
            source: "lit*".to_string(),
            matcher: Matcher::Exact,
        };
        assert!(fallback.matches("lit*"));
        assert!(!fallback.matches("literal"));
    }

    #[test]
    fn test_glob_to_regex() {
        assert_eq!(glob_to_regex("a*b?"), "(?s)^a.*b.$");
        assert_eq!(glob_to_regex("1.5"), "(?s)^1\\.5$");
        assert_eq!(glob_to_regex(""), "(?s)^$");
    }
}
