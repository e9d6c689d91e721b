use std::collections::HashMap;

use log::{debug, info};

use super::node::{NodeId, RadixNode};
use crate::error::{Result, StringSubsError};

/// Insert-only radix tree mapping substitution keys to replacement values.
///
/// Nodes live in an arena and refer to each other by [`NodeId`], so the
/// parent back-references never form ownership cycles. The tree is built
/// once and then only read; a built tree can be shared by reference between
/// any number of [`StreamingSubstitutor`](crate::substitution::StreamingSubstitutor)s,
/// on any number of threads.
#[derive(Debug, Clone)]
pub struct RadixTree {
    nodes: Vec<RadixNode>,
    len: usize,
}

impl Default for RadixTree {
    fn default() -> Self {
        Self::new()
    }
}

impl RadixTree {
    /// Identifier of the root node of every tree.
    pub const ROOT: NodeId = NodeId(0);

    /// Create a tree holding only the root.
    pub fn new() -> Self {
        Self {
            nodes: vec![RadixNode::root()],
            len: 0,
        }
    }

    /// Build a tree from a substitution map.
    ///
    /// Fails with [`StringSubsError::InvalidArgument`] if the map is empty or
    /// any key is empty.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        if map.is_empty() {
            return Err(StringSubsError::invalid_argument(
                "Substitution map must not be empty",
            ));
        }

        // Deterministic insertion order keeps debug output stable.
        let mut entries: Vec<_> = map.iter().collect();
        entries.sort();

        let mut tree = Self::new();
        for (key, value) in entries {
            tree.insert(key, value.as_str())?;
        }
        debug!(
            "Built radix tree with {} keys in {} nodes",
            tree.len(),
            tree.node_count()
        );
        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        Self::ROOT
    }

    /// Borrow a node. Ids handed out by this tree are always valid for it.
    pub fn node(&self, id: NodeId) -> &RadixNode {
        &self.nodes[id.0]
    }

    /// Number of distinct keys stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of nodes including the root.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Exact lookup of a key's value.
    pub fn get(&self, key: &str) -> Option<&str> {
        let key: Vec<char> = key.chars().collect();
        let mut id = Self::ROOT;
        let mut pos = 0;
        loop {
            let node = self.node(id);
            let fragment = node.key();
            if key.len() - pos < fragment.len() || key[pos..pos + fragment.len()] != *fragment {
                return None;
            }
            pos += fragment.len();
            if pos == key.len() {
                return node.value();
            }
            id = node.child(key[pos])?;
        }
    }

    /// All stored `(key, value)` pairs, sorted by key.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries = Vec::with_capacity(self.len);
        let mut stack = vec![(Self::ROOT, String::new())];
        while let Some((id, prefix)) = stack.pop() {
            let node = self.node(id);
            let mut key = prefix;
            key.extend(node.key());
            if let Some(value) = node.value() {
                entries.push((key.clone(), value.to_string()));
            }
            for (_, child) in node.children() {
                stack.push((child, key.clone()));
            }
        }
        entries.sort();
        entries
    }

    /// Insert `key` with `value`.
    ///
    /// Inserting an existing key overwrites its value; the change is logged,
    /// not treated as an error.
    pub fn insert<K, V>(&mut self, key: K, value: V) -> Result<()>
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let key_str = key.as_ref();
        if key_str.is_empty() {
            return Err(StringSubsError::invalid_argument("Key must not be empty"));
        }
        let value = value.into();
        let key: Vec<char> = key_str.chars().collect();

        let mut id = Self::ROOT;
        let mut pos = 0;
        loop {
            let (fragment_len, limit, common) = {
                let fragment = self.node(id).key();
                let limit = fragment.len().min(key.len() - pos);
                let common = fragment[..limit]
                    .iter()
                    .zip(&key[pos..pos + limit])
                    .take_while(|(a, b)| a == b)
                    .count();
                (fragment.len(), limit, common)
            };

            if common < limit {
                // Diverges inside the fragment: branch at the common prefix.
                let mid = self.split(id, common)?;
                let leaf = self.alloc(RadixNode::new(key[pos + common..].to_vec(), Some(value)));
                self.attach(mid, leaf)?;
                self.len += 1;
                return Ok(());
            }

            if common < fragment_len {
                // Key ends inside the fragment: the split point carries the value.
                let mid = self.split(id, common)?;
                self.nodes[mid.0].set_value(value);
                self.len += 1;
                return Ok(());
            }

            pos += fragment_len;
            if pos == key.len() {
                match self.nodes[id.0].set_value(value) {
                    None => self.len += 1,
                    Some(previous) => {
                        let current = self.node(id).value().unwrap_or_default();
                        if previous != current {
                            info!(
                                "Value of key '{}' changed from '{}' to '{}'",
                                key_str, previous, current
                            );
                        } else {
                            debug!("Key '{}' re-inserted with the same value", key_str);
                        }
                    }
                }
                return Ok(());
            }

            match self.node(id).child(key[pos]) {
                Some(child) => id = child,
                None => {
                    let leaf = self.alloc(RadixNode::new(key[pos..].to_vec(), Some(value)));
                    self.attach(id, leaf)?;
                    self.len += 1;
                    return Ok(());
                }
            }
        }
    }

    /// Register `child` under `parent`, keyed by the first character of its
    /// fragment.
    ///
    /// A child already occupying that slot is evicted: its parent link is
    /// cleared and its id returned.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<Option<NodeId>> {
        let first = self.node(child).first_char().ok_or_else(|| {
            StringSubsError::invalid_argument(format!("Node {child} has an empty key fragment"))
        })?;

        let evicted = self.nodes[parent.0].put_child(first, child);
        if let Some(old) = evicted.filter(|old| *old != child) {
            debug!(
                "Node {} evicted node {} ('{}') from parent {}",
                child,
                old,
                self.node(old).key_string(),
                parent
            );
            self.nodes[old.0].set_parent(None);
        }
        self.nodes[child.0].set_parent(Some(parent));
        Ok(evicted.filter(|old| *old != child))
    }

    /// Detach `child` from `parent`.
    ///
    /// The slot must hold exactly `child`; anything else means the tree is
    /// corrupt and yields [`StringSubsError::InvalidState`].
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let registered = self
            .node(child)
            .first_char()
            .and_then(|first| self.node(parent).child(first));
        match registered {
            Some(id) if id == child => {
                let first = self.node(child).first_char().unwrap_or_default();
                self.nodes[parent.0].take_child(first);
                self.nodes[child.0].set_parent(None);
                Ok(())
            }
            other => Err(StringSubsError::invalid_state(format!(
                "Node {} is not a child of {} (slot holds {:?})",
                child, parent, other
            ))),
        }
    }

    fn alloc(&mut self, node: RadixNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Attach a freshly created or re-parented node. Insertion always targets
    /// a vacant slot, so an eviction here means the tree is corrupt.
    fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        match self.add_child(parent, child)? {
            None => Ok(()),
            Some(evicted) => Err(StringSubsError::invalid_state(format!(
                "Attaching {} under {} evicted {}",
                child, parent, evicted
            ))),
        }
    }

    /// Split `id` after `at` characters of its fragment. A new node holding
    /// the prefix takes its place under the old parent and the original node,
    /// now holding the remainder, becomes its only child.
    fn split(&mut self, id: NodeId, at: usize) -> Result<NodeId> {
        let fragment_len = self.node(id).key().len();
        if at == 0 || at >= fragment_len {
            return Err(StringSubsError::invalid_state(format!(
                "Cannot split node {} of length {} at {}",
                id, fragment_len, at
            )));
        }
        let parent = self
            .node(id)
            .parent()
            .ok_or_else(|| StringSubsError::invalid_state(format!("Node {id} has no parent")))?;

        self.remove_child(parent, id)?;
        let (prefix, suffix) = {
            let fragment = self.node(id).key();
            (fragment[..at].to_vec(), fragment[at..].to_vec())
        };
        let mid = self.alloc(RadixNode::new(prefix, None));
        self.nodes[id.0].set_key(suffix);
        self.attach(parent, mid)?;
        self.attach(mid, id)?;
        Ok(mid)
    }
}
