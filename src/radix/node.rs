use std::collections::HashMap;
use std::fmt;

/// Index of a node inside its owning [`RadixTree`](super::RadixTree) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One compressed edge and the node it leads to.
#[derive(Debug, Clone)]
pub struct RadixNode {
    /// Fragment of the key carried by the incoming edge. Empty only for the root.
    key: Vec<char>,
    /// Set when an inserted key terminates exactly at this node.
    value: Option<String>,
    /// Children keyed by the first character of their fragment.
    children: HashMap<char, NodeId>,
    /// Back-reference used while splitting; not an ownership link.
    parent: Option<NodeId>,
}

impl RadixNode {
    pub(crate) fn new(key: Vec<char>, value: Option<String>) -> Self {
        Self {
            key,
            value,
            children: HashMap::new(),
            parent: None,
        }
    }

    pub(crate) fn root() -> Self {
        Self::new(Vec::new(), None)
    }

    /// The key fragment as characters.
    pub fn key(&self) -> &[char] {
        &self.key
    }

    /// The key fragment as a string.
    pub fn key_string(&self) -> String {
        self.key.iter().collect()
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child whose fragment starts with `c`.
    pub fn child(&self, c: char) -> Option<NodeId> {
        self.children.get(&c).copied()
    }

    pub fn children(&self) -> impl Iterator<Item = (char, NodeId)> + '_ {
        self.children.iter().map(|(c, id)| (*c, *id))
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub(crate) fn first_char(&self) -> Option<char> {
        self.key.first().copied()
    }

    pub(crate) fn set_key(&mut self, key: Vec<char>) {
        self.key = key;
    }

    /// Replace the value, returning the previous one.
    pub(crate) fn set_value(&mut self, value: String) -> Option<String> {
        self.value.replace(value)
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
    }

    /// Register `child` under `first`, returning whatever occupied the slot.
    pub(crate) fn put_child(&mut self, first: char, child: NodeId) -> Option<NodeId> {
        self.children.insert(first, child)
    }

    /// Detach whatever occupies the slot for `first`.
    pub(crate) fn take_child(&mut self, first: char) -> Option<NodeId> {
        self.children.remove(&first)
    }
}
