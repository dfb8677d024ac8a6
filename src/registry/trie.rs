use std::collections::HashMap;

use super::SymbolEntry;

#[derive(Debug, Default, Clone)]
struct TrieNode {
    children: HashMap<String, TrieNode>,
    entries: Vec<SymbolEntry>,
}

impl TrieNode {
    fn is_empty(&self) -> bool {
        self.children.is_empty() && self.entries.is_empty()
    }
}

/// Prefix tree over the dot segments of qualified names.
///
/// Terminal nodes hold every entry sharing that qualified name (overloads,
/// re-declarations at different lines).
#[derive(Debug, Default, Clone)]
pub struct SymbolTrie {
    root: TrieNode,
    len: usize,
}

impl SymbolTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// O(depth) insertion.
    pub fn insert(&mut self, qualified_name: &str, entry: SymbolEntry) {
        let mut node = &mut self.root;
        for segment in qualified_name.split('.') {
            node = node.children.entry(segment.to_owned()).or_default();
        }
        node.entries.push(entry);
        self.len += 1;
    }

    /// Entries whose qualified name equals `qualified_name` exactly.
    pub fn get(&self, qualified_name: &str) -> &[SymbolEntry] {
        let mut node = &self.root;
        for segment in qualified_name.split('.') {
            match node.children.get(segment) {
                Some(child) => node = child,
                None => return &[],
            }
        }
        &node.entries
    }

    /// Remove the entries under `qualified_name` matching `pred`, pruning
    /// nodes left without entries or children. Returns the number removed.
    pub fn remove_where(&mut self, qualified_name: &str, pred: impl Fn(&SymbolEntry) -> bool) -> usize {
        let segments: Vec<&str> = qualified_name.split('.').collect();
        let removed = Self::remove_rec(&mut self.root, &segments, &pred);
        self.len -= removed;
        removed
    }

    fn remove_rec(node: &mut TrieNode, segments: &[&str], pred: &impl Fn(&SymbolEntry) -> bool) -> usize {
        let Some((first, rest)) = segments.split_first() else {
            let before = node.entries.len();
            node.entries.retain(|e| !pred(e));
            return before - node.entries.len();
        };
        let Some(child) = node.children.get_mut(*first) else {
            return 0;
        };
        let removed = Self::remove_rec(child, rest, pred);
        if child.is_empty() {
            node.children.remove(*first);
        }
        removed
    }

    /// Number of trie nodes below the root. Used to verify pruning.
    pub fn node_count(&self) -> usize {
        fn count(node: &TrieNode) -> usize {
            node.children.values().map(|c| 1 + count(c)).sum()
        }
        count(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::NodeKind;

    fn entry(q: &str, line: usize) -> SymbolEntry {
        SymbolEntry::new("id", "a/x.py", q.rsplit('.').next().unwrap(), NodeKind::Function, None, line, None)
    }

    #[test]
    fn test_insert_and_exact_get() {
        let mut trie = SymbolTrie::new();
        trie.insert("a.x.helper", entry("a.x.helper", 1));
        trie.insert("a.x.helper", entry("a.x.helper", 9));
        trie.insert("a.y.helper", entry("a.y.helper", 1));
        assert_eq!(trie.get("a.x.helper").len(), 2);
        assert_eq!(trie.get("a.x").len(), 0, "interior nodes have no entries");
        assert_eq!(trie.get("b").len(), 0);
        assert_eq!(trie.len(), 3);
    }

    #[test]
    fn test_remove_prunes_empty_nodes() {
        let mut trie = SymbolTrie::new();
        trie.insert("a.x.helper", entry("a.x.helper", 1));
        trie.insert("a.y.other", entry("a.y.other", 1));
        assert_eq!(trie.node_count(), 5);
        assert_eq!(trie.remove_where("a.x.helper", |_| true), 1);
        assert_eq!(trie.node_count(), 3, "a.x.helper branch must be pruned");
        assert!(trie.get("a.x.helper").is_empty());
        assert_eq!(trie.get("a.y.other").len(), 1);
    }
}
