//! Glob pattern utilities
//!
//! Shared helpers for compiling include/exclude patterns and ranking how
//! specific a pattern is.

use anyhow::Result;
use globset::{Glob, GlobMatcher, GlobSet, GlobSetBuilder};

/// Create a GlobSet from a list of patterns for efficient batch matching
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(&normalize(pattern))?);
    }
    Ok(builder.build()?)
}

/// A compiled pattern that remembers its specificity
#[derive(Debug, Clone)]
pub struct RankedGlob {
    pub pattern: String,
    pub specificity: usize,
    matcher: GlobMatcher,
}

impl RankedGlob {
    pub fn new(pattern: &str) -> Result<Self> {
        let normalized = normalize(pattern);
        Ok(Self {
            specificity: specificity(pattern.trim_start_matches("./")),
            matcher: Glob::new(&normalized)?.compile_matcher(),
            pattern: pattern.to_string(),
        })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }
}

/// Compile every pattern in order
pub fn build_ranked(patterns: &[String]) -> Result<Vec<RankedGlob>> {
    patterns.iter().map(|p| RankedGlob::new(p)).collect()
}

/// Highest specificity among the patterns matching `path`
pub fn best_match(globs: &[RankedGlob], path: &str) -> Option<usize> {
    globs
        .iter()
        .filter(|g| g.is_match(path))
        .map(|g| g.specificity)
        .max()
}

/// Number of literal (non-wildcard) characters in a pattern
pub fn specificity(pattern: &str) -> usize {
    let mut count = 0;
    let mut in_class = false;
    for c in pattern.chars() {
        match c {
            '[' => in_class = true,
            ']' => in_class = false,
            '*' | '?' | '{' | '}' | ',' => {}
            _ if in_class => {}
            _ => count += 1,
        }
    }
    count
}

// Directory patterns like "vendor/" cover everything below them.
// A bare name without a slash matches at any depth, like gitignore.
fn normalize(pattern: &str) -> String {
    let pattern = pattern.trim_start_matches("./");
    if pattern.ends_with('/') {
        format!("{pattern}**")
    } else if !pattern.contains('/') && !pattern.starts_with("**") {
        format!("**/{pattern}")
    } else {
        pattern.to_string()
    }
}
