//! Path-compressed prefix tree over lowercase hex words.
//!
//! Each registered bytecode is stored as the hex encoding of its normalized code. Edges carry
//! runs of hex digits, so a lookup costs one step per branch point shared with other registered
//! words instead of one per digit.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. The payload of a registered word is
//! stored directly on the node that ends it, so a node is present exactly when it holds a value.
//!
//! # Invariants
//!
//! - The root has an empty edge label; every other node has a non-empty one.
//! - Sibling edges start with distinct characters.
//! - A child's `chars_matched_before` equals its parent's `chars_matched_before` plus the length
//!   of the parent's edge label.

use std::iter::FusedIterator;

/// Index of a node in a [`RadixTree`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// A node of the tree.
#[derive(Clone, Debug)]
pub struct RadixNode<T> {
    /// Hex digits consumed by the incoming edge.
    edge_label: String,
    /// Hex digits consumed by all ancestor edges.
    chars_matched_before: usize,
    /// Children keyed by the first digit of their edge label, in key insertion order.
    children: Vec<(u8, NodeId)>,
    /// Payload of the word ending at this node, if any.
    value: Option<T>,
}

impl<T> RadixNode<T> {
    fn new(edge_label: String, chars_matched_before: usize, value: Option<T>) -> Self {
        Self {
            edge_label,
            chars_matched_before,
            children: Vec::new(),
            value,
        }
    }

    pub fn edge_label(&self) -> &str {
        &self.edge_label
    }

    pub fn chars_matched_before(&self) -> usize {
        self.chars_matched_before
    }

    /// Length of the word ending at this node.
    pub fn chars_matched_through(&self) -> usize {
        self.chars_matched_before + self.edge_label.len()
    }

    /// True if the path ending here is a registered word.
    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Child whose edge starts with `digit`.
    pub fn child(&self, digit: u8) -> Option<NodeId> {
        self.children
            .iter()
            .find_map(|&(key, id)| (key == digit).then_some(id))
    }

    /// Children in key insertion order.
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.iter().map(|&(_, id)| id)
    }

    fn replace_child(&mut self, digit: u8, id: NodeId) {
        match self.children.iter_mut().find(|(key, _)| *key == digit) {
            Some(entry) => entry.1 = id,
            None => self.children.push((digit, id)),
        }
    }
}

/// Result of [`RadixTree::get_max_match`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MaxMatch {
    /// The word is registered and ends exactly at `node`.
    pub found: bool,
    /// Number of hex digits of the word that were matched.
    pub matched_chars: usize,
    /// Deepest node reached.
    pub node: NodeId,
}

/// Arena-backed radix tree mapping hex words to values.
#[derive(Clone, Debug)]
pub struct RadixTree<T> {
    nodes: Vec<RadixNode<T>>,
    len: usize,
}

const ROOT: NodeId = NodeId(0);

impl<T> Default for RadixTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RadixTree<T> {
    pub fn new() -> Self {
        Self {
            nodes: vec![RadixNode::new(String::new(), 0, None)],
            len: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    /// # Panics
    ///
    /// If `id` was not produced by this tree.
    pub fn node(&self, id: NodeId) -> &RadixNode<T> {
        &self.nodes[id.0]
    }

    pub fn value(&self, id: NodeId) -> Option<&T> {
        self.node(id).value()
    }

    /// Number of registered words.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of allocated nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Inserts `word` with `value`, returning the value previously stored for the same word.
    pub fn insert(&mut self, word: &str, value: T) -> Option<T> {
        let digits = word.as_bytes();
        let mut current = ROOT;
        let mut i = 0;

        loop {
            if i == digits.len() {
                // Only reachable for the empty word, which ends at the root.
                return self.set_value(current, value);
            }

            let digit = digits[i];
            let Some(next) = self.nodes[current.0].child(digit) else {
                tracing::trace!("new leaf for {} digits at depth {}", digits.len() - i, i);
                let before = self.nodes[current.0].chars_matched_through();
                let leaf = self.push_node(&word[i..], before, Some(value));
                self.nodes[current.0].children.push((digit, leaf));
                self.len += 1;
                return None;
            };

            let label = self.nodes[next.0].edge_label.as_bytes();
            let label_len = label.len();
            let prefix_len = shared_prefix_len(&digits[i..], label);

            // The whole edge is part of the word
            if prefix_len == label_len {
                if i + prefix_len == digits.len() {
                    return self.set_value(next, value);
                }
                i += prefix_len;
                current = next;
                continue;
            }

            let before = self.nodes[current.0].chars_matched_through();

            // The word ends strictly inside the edge: the word's node takes over the edge head
            if i + prefix_len == digits.len() {
                tracing::trace!("word ends inside edge at depth {}, splitting", i);
                let node = self.push_node(&word[i..], before, Some(value));
                self.nodes[current.0].replace_child(digit, node);
                self.reparent(next, node, prefix_len);
                self.len += 1;
                return None;
            }

            // Partial match: a branch node takes the shared part, with the old child and a new
            // leaf hanging from it
            tracing::trace!("splitting edge after {} shared digits at depth {}", prefix_len, i);
            let branch = self.push_node(&word[i..i + prefix_len], before, None);
            self.nodes[current.0].replace_child(digit, branch);
            self.reparent(next, branch, prefix_len);

            let rest = i + prefix_len;
            let leaf_before = self.nodes[branch.0].chars_matched_through();
            let leaf = self.push_node(&word[rest..], leaf_before, Some(value));
            self.nodes[branch.0].children.push((digits[rest], leaf));
            self.len += 1;
            return None;
        }
    }

    /// Follows `word` from `start` as far as it matches.
    ///
    /// `word` is the complete word; digits before `start`'s own edge are assumed to match and are
    /// not compared.
    pub fn get_max_match(&self, word: &str, start: NodeId) -> MaxMatch {
        let digits = word.as_bytes();
        let mut current = start;

        loop {
            let node = self.node(current);
            let rest = digits.get(node.chars_matched_before..).unwrap_or_default();
            let prefix_len = shared_prefix_len(rest, node.edge_label.as_bytes());
            let matched_chars = node.chars_matched_before + prefix_len;

            let entire_word_matched = matched_chars == digits.len();
            let entire_edge_matched = prefix_len == node.edge_label.len();

            if !entire_word_matched {
                // Label not consumed: the word diverges inside this edge
                if !entire_edge_matched {
                    return MaxMatch {
                        found: false,
                        matched_chars,
                        node: current,
                    };
                }

                match node.child(digits[matched_chars]) {
                    Some(next) => {
                        current = next;
                        continue;
                    }
                    None => {
                        return MaxMatch {
                            found: false,
                            matched_chars,
                            node: current,
                        };
                    }
                }
            }

            return MaxMatch {
                found: entire_edge_matched && node.is_present(),
                matched_chars,
                node: current,
            };
        }
    }

    /// Value stored for exactly `word`.
    pub fn get(&self, word: &str) -> Option<&T> {
        let max_match = self.get_max_match(word, ROOT);
        if max_match.found {
            self.value(max_match.node)
        } else {
            None
        }
    }

    /// Every registered word at or below `node`, depth first, children in key insertion order.
    ///
    /// Suffixes are relative to the prefix before `node` and therefore start with `node`'s own
    /// edge label.
    pub fn descendants(&self, node: NodeId) -> Descendants<'_, T> {
        Descendants {
            tree: self,
            stack: vec![(node, self.node(node).edge_label.clone())],
        }
    }

    fn push_node(&mut self, label: &str, chars_matched_before: usize, value: Option<T>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes
            .push(RadixNode::new(label.to_string(), chars_matched_before, value));
        id
    }

    /// Moves `child` under `parent`, dropping the first `consumed` digits of its label.
    fn reparent(&mut self, child: NodeId, parent: NodeId, consumed: usize) {
        let parent_through = self.nodes[parent.0].chars_matched_through();
        let node = &mut self.nodes[child.0];
        node.edge_label.drain(..consumed);
        node.chars_matched_before = parent_through;
        let key = node.edge_label.as_bytes()[0];
        self.nodes[parent.0].children.push((key, child));
    }

    fn set_value(&mut self, id: NodeId, value: T) -> Option<T> {
        let previous = self.nodes[id.0].value.replace(value);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }
}

/// A registered word found below some node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Descendant {
    /// Hex digits from the start node's edge down to the word's end.
    pub suffix: String,
    /// Node ending the word.
    pub node: NodeId,
}

/// Depth-first iterator returned by [`RadixTree::descendants`].
#[derive(Clone, Debug)]
pub struct Descendants<'a, T> {
    tree: &'a RadixTree<T>,
    stack: Vec<(NodeId, String)>,
}

impl<T> Iterator for Descendants<'_, T> {
    type Item = Descendant;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        while let Some((id, suffix)) = self.stack.pop() {
            let node = tree.node(id);
            for child in node.children.iter().rev().map(|&(_, child)| child) {
                let mut child_suffix = suffix.clone();
                child_suffix.push_str(tree.node(child).edge_label());
                self.stack.push((child, child_suffix));
            }

            if node.is_present() {
                return Some(Descendant { suffix, node: id });
            }
        }
        None
    }
}

impl<T> FusedIterator for Descendants<'_, T> {}

fn shared_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}
