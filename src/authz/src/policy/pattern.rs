//! Resource pattern compilation
//!
//! Patterns are `/`-separated. A segment that is exactly `*` matches any run
//! of characters, path separators included, so `/org/*` covers
//! `/org/a/b/c` and a lone `*` covers every resource. Any other segment is
//! literal text: `/files/a.b` never matches `/files/axb`, and `*` inside a
//! longer segment (`emp*`) is just a character.

use regex::Regex;

use sac_core::ACTION_WILDCARD;

/// Compiled resource pattern, tested by full match
#[derive(Debug, Clone)]
pub struct ResourcePattern {
    source: String,
    regex: Regex,
}

impl ResourcePattern {
    /// Compile `pattern` into a full-match matcher
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        let body = pattern
            .split('/')
            .map(|segment| {
                if segment == "*" {
                    ".*".to_string()
                } else {
                    regex::escape(segment)
                }
            })
            .collect::<Vec<_>>()
            .join("/");

        let regex = Regex::new(&format!("^(?s:{})$", body))?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Whether `resource` matches the whole pattern
    pub fn matches(&self, resource: &str) -> bool {
        self.regex.is_match(resource)
    }

    /// Pattern text this matcher was compiled from
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Whether `action` is listed, or the list holds the `*` wildcard
pub fn action_permitted(actions: &[String], action: &str) -> bool {
    actions
        .iter()
        .any(|candidate| candidate == action || candidate == ACTION_WILDCARD)
}
