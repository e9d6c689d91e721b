//! Compressed trie (radix tree) over substitution keys.
//!
//! Chains of single-child nodes are merged into one edge labelled with a
//! multi-character fragment. Sibling fragments always start with distinct
//! characters, so a child is selected by its first character alone.
//!
//! # Examples
//!
//! ```
//! use stringsubs::radix::RadixTree;
//!
//! let mut tree = RadixTree::new();
//! tree.insert("acidic", "ACIDIC").unwrap();
//! tree.insert("acid", "ACID").unwrap();
//!
//! assert_eq!(tree.get("acid"), Some("ACID"));
//! assert_eq!(tree.get("acidic"), Some("ACIDIC"));
//! assert_eq!(tree.get("aci"), None);
//! ```

pub mod node;
pub mod tree;

pub use node::{NodeId, RadixNode};
pub use tree::RadixTree;
