//! Expansion of `$NAME$` tokens in change pairs and file entry paths.

use std::collections::HashMap;
use std::env;

use log::warn;
use regex::{Captures, Regex};

/// Rewrites definition attributes before they are used.
///
/// `before` strings become substitution keys, `after` strings become
/// replacement values and paths locate the files to rewrite.
pub trait AttributePreprocessor: Send + Sync {
    fn substitute_before(&self, before: &str) -> String;

    fn substitute_after(&self, after: &str) -> String;

    fn substitute_path(&self, path: &str) -> String;
}

/// Expands `$NAME$` tokens from a variable table.
///
/// Unknown tokens are left verbatim.
#[derive(Debug, Clone)]
pub struct VariablePreprocessor {
    variables: HashMap<String, String>,
    pattern: Regex,
}

impl Default for VariablePreprocessor {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

impl VariablePreprocessor {
    pub fn new(variables: HashMap<String, String>) -> Self {
        Self {
            variables,
            // Literal pattern, always valid.
            pattern: Regex::new(r"\$([A-Za-z_][A-Za-z0-9_.\-]*)\$").unwrap(),
        }
    }

    /// Fall back to process environment variables for names not in the table.
    pub fn with_environment(mut self) -> Self {
        for (key, value) in env::vars() {
            self.variables.entry(key).or_insert(value);
        }
        self
    }

    pub fn set_variable<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.variables.insert(key.into(), value.into());
    }

    pub fn variables(&self) -> &HashMap<String, String> {
        &self.variables
    }

    fn expand(&self, input: &str) -> String {
        self.pattern
            .replace_all(input, |caps: &Captures| match self.variables.get(&caps[1]) {
                Some(value) => value.clone(),
                None => {
                    warn!("No value for token '{}' in '{}'", &caps[0], input);
                    caps[0].to_string()
                }
            })
            .into_owned()
    }
}

impl AttributePreprocessor for VariablePreprocessor {
    fn substitute_before(&self, before: &str) -> String {
        self.expand(before)
    }

    fn substitute_after(&self, after: &str) -> String {
        self.expand(after)
    }

    fn substitute_path(&self, path: &str) -> String {
        self.expand(path)
    }
}
