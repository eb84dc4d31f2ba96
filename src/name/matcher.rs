//! Fuzzy name matching modelled on npm's moniker collision rules.
//!
//! npm treats names that differ only in punctuation as the same package:
//! `foo-bar`, `foobar`, `foo_bar` and `foo.bar` all collide. A trailing `s`
//! is also tolerated so `widget` and `widgets` collide.

use crate::types::{NameCheckError, Result};
use regex::Regex;

/// Zero or more separator characters.
const SEPARATORS: &str = "[_.\\-]*";

/// Compiled similarity predicate for one candidate name.
///
/// Compile once with [`NameMatcher::new`], then test as many names as needed.
#[derive(Debug, Clone)]
pub struct NameMatcher {
    name: String,
    pattern: Regex,
}

impl NameMatcher {
    /// Build a matcher for the given candidate.
    ///
    /// Fails with [`NameCheckError::EmptyName`] when the candidate has no
    /// character besides separators.
    pub fn new(name: &str) -> Result<Self> {
        if !name.chars().any(|c| !is_separator(c)) {
            return Err(NameCheckError::EmptyName);
        }

        let pattern = Regex::new(&build_pattern(name))?;
        Ok(Self {
            name: name.to_string(),
            pattern,
        })
    }

    /// The candidate this matcher was built from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `existing` collides with the candidate.
    pub fn is_match(&self, existing: &str) -> bool {
        self.pattern.is_match(existing)
    }

    /// Collect every colliding name, preserving iteration order.
    pub fn conflicts<'a, I>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        names
            .into_iter()
            .filter(|existing| self.is_match(existing))
            .cloned()
            .collect()
    }
}

fn is_separator(c: char) -> bool {
    matches!(c, '-' | '_' | '.')
}

/// Translate a candidate name into an anchored regular expression.
fn build_pattern(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let literal_count = chars.iter().filter(|c| !is_separator(**c)).count();
    let last = chars.len() - 1;

    let parts: Vec<String> = chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            if is_separator(c) {
                return SEPARATORS.to_string();
            }
            let escaped = regex::escape(c.encode_utf8(&mut [0; 4]));
            // A lone `s` stays mandatory, otherwise the pattern would accept
            // names made only of separators.
            if i == last && c == 's' && literal_count > 1 {
                format!("{}?", escaped)
            } else {
                escaped
            }
        })
        .collect();

    format!("^{sep}{body}{sep}s?$", sep = SEPARATORS, body = parts.join(SEPARATORS))
}
