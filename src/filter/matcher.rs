//! Multi-pattern substring matcher backing the IP, area and User-Agent gates

use aho_corasick::{AhoCorasick, BuildError};
use std::fmt;

/// Immutable set of patterns compiled into one automaton.
///
/// A candidate matches when any pattern occurs anywhere inside it, so
/// `10.0.0.` matches every address in that /24 and `Mozilla` matches any
/// browser User-Agent.
#[derive(Clone)]
pub struct PatternMatcher {
    patterns: Vec<String>,
    automaton: AhoCorasick,
}

impl PatternMatcher {
    pub fn new(patterns: &[String]) -> Result<Self, BuildError> {
        let patterns: Vec<String> = patterns
            .iter()
            .filter(|p| !p.is_empty())
            .cloned()
            .collect();
        let automaton = AhoCorasick::new(&patterns)?;
        Ok(Self {
            patterns,
            automaton,
        })
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        !self.patterns.is_empty() && self.automaton.is_match(candidate)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl fmt::Debug for PatternMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PatternMatcher").field(&self.patterns).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(patterns: &[&str]) -> PatternMatcher {
        let patterns: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
        PatternMatcher::new(&patterns).unwrap()
    }

    #[test]
    fn test_exact_and_substring_matches() {
        let m = matcher(&["1.2.3.4", "10.0.0."]);
        assert!(m.is_match("1.2.3.4"));
        assert!(m.is_match("10.0.0.77"));
        assert!(!m.is_match("5.6.7.8"));
    }

    #[test]
    fn test_user_agent_keyword() {
        let m = matcher(&["Mozilla"]);
        assert!(m.is_match("Mozilla/5.0 (X11; Linux x86_64)"));
        assert!(!m.is_match("curl/7.0"));
        assert!(!m.is_match(""));
    }

    #[test]
    fn test_empty_patterns_never_match() {
        let m = matcher(&["", ""]);
        assert!(m.patterns().is_empty());
        assert!(!m.is_match("anything"));
    }
}
