use std::collections::HashMap;

use log::debug;

use super::substitutable::Substitutable;
use super::substitutor::{StreamingSubstitutor, substitute};
use crate::error::Result;
use crate::radix::RadixTree;

/// Rewrites a [`Substitutable`] according to a fixed set of change pairs.
///
/// Implementations are immutable once built so a single instance can serve
/// many substitutables concurrently.
pub trait SubstitutionAlgorithm: Send + Sync {
    /// Stream the substitutable's input through the algorithm into its output.
    /// Committing the output is left to the caller.
    fn substitute(&self, substitutable: &mut dyn Substitutable) -> Result<()>;

    /// Substitute an in-memory string.
    fn substitute_str(&self, input: &str) -> String;

    /// Get the name of this algorithm.
    fn name(&self) -> &'static str;
}

/// Longest-match substitution driven by a [`RadixTree`].
#[derive(Debug, Clone)]
pub struct RadixTreeSubstitutionAlgorithm {
    tree: RadixTree,
}

impl RadixTreeSubstitutionAlgorithm {
    /// Build from a `before -> after` map. The map and its keys must be non-empty.
    pub fn new(substitution_map: &HashMap<String, String>) -> Result<Self> {
        Ok(Self {
            tree: RadixTree::from_map(substitution_map)?,
        })
    }

    pub fn tree(&self) -> &RadixTree {
        &self.tree
    }
}

impl SubstitutionAlgorithm for RadixTreeSubstitutionAlgorithm {
    fn substitute(&self, substitutable: &mut dyn Substitutable) -> Result<()> {
        let name = substitutable.name().to_string();
        debug!("Substituting {}", name);
        let (reader, writer) = substitutable.open()?;
        substitute(&self.tree, reader, writer, &name)
    }

    fn substitute_str(&self, input: &str) -> String {
        StreamingSubstitutor::new(&self.tree).substitute_str(input)
    }

    fn name(&self) -> &'static str {
        "radix_tree"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StringSubsError;
    use crate::substitution::substitutable::StringSubstitutable;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_rejects_empty_map() {
        let err = RadixTreeSubstitutionAlgorithm::new(&HashMap::new()).unwrap_err();
        assert!(matches!(err, StringSubsError::InvalidArgument(_)));
    }

    #[test]
    fn test_substitutes_substitutable() {
        let algorithm =
            RadixTreeSubstitutionAlgorithm::new(&map(&[("%%%PORT%%%", "8080"), ("%%%HOST%%%", "0.0.0.0")]))
                .unwrap();
        let mut substitutable =
            StringSubstitutable::new("listener", "http://%%%HOST%%%:%%%PORT%%%/ %%%OTHER%%%");
        algorithm.substitute(&mut substitutable).unwrap();
        assert_eq!(substitutable.output(), "http://0.0.0.0:8080/ %%%OTHER%%%");
        assert_eq!(algorithm.name(), "radix_tree");
    }

    #[test]
    fn test_substitute_str() {
        let algorithm = RadixTreeSubstitutionAlgorithm::new(&map(&[("foo", "bar")])).unwrap();
        assert_eq!(algorithm.substitute_str("a foo b"), "a bar b");
        assert_eq!(algorithm.tree().len(), 1);
    }
}
