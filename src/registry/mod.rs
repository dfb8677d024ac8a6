pub mod trie;

use std::collections::HashMap;

use crate::graph::node::NodeKind;

use trie::SymbolTrie;

/// One registered definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolEntry {
    pub node_id: String,
    /// `<path-without-extension, '/' -> '.'>.<parentClass?>.<name>`
    pub qualified_name: String,
    pub file_path: String,
    pub bare_name: String,
    pub kind: NodeKind,
    pub parent_class: Option<String>,
    pub start_line: usize,
    pub end_line: Option<usize>,
    /// Insertion order, assigned by the registry. Breaks ranking ties.
    pub seq: u64,
}

impl SymbolEntry {
    pub fn new(
        node_id: &str,
        file_path: &str,
        name: &str,
        kind: NodeKind,
        parent_class: Option<&str>,
        start_line: usize,
        end_line: Option<usize>,
    ) -> Self {
        Self {
            node_id: node_id.to_owned(),
            qualified_name: qualified_name(file_path, parent_class, name),
            file_path: file_path.to_owned(),
            bare_name: name.to_owned(),
            kind,
            parent_class: parent_class.map(str::to_owned),
            start_line,
            end_line,
            seq: 0,
        }
    }
}

/// Module path of a file: extension dropped, `/` replaced by `.`.
pub fn module_path(file_path: &str) -> String {
    let (dir, file) = match file_path.rsplit_once('/') {
        Some((d, f)) => (Some(d), f),
        None => (None, file_path),
    };
    let stem = match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    };
    match dir {
        Some(d) => format!("{}.{}", d.replace('/', "."), stem),
        None => stem.to_owned(),
    }
}

pub fn qualified_name(file_path: &str, parent_class: Option<&str>, name: &str) -> String {
    let mut q = module_path(file_path);
    if let Some(parent) = parent_class {
        q.push('.');
        q.push_str(parent);
    }
    q.push('.');
    q.push_str(name);
    q
}

/// Heuristic proximity of `candidate` to `caller`. Lower is closer.
///
/// `max(lenA, lenB) - commonPrefix` over `/` segments, minus one when the
/// candidate lives in the caller's directory: the same file scores -1, a
/// sibling 0, a cousin 2.
pub fn calculate_import_distance(caller: &str, candidate: &str) -> i32 {
    let a: Vec<&str> = caller.split('/').collect();
    let b: Vec<&str> = candidate.split('/').collect();
    let common = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let mut distance = a.len().max(b.len()) as i32 - common as i32;
    let same_dir = a.len() == b.len() && common + 1 >= a.len();
    if same_dir {
        distance -= 1;
    }
    distance
}

/// Trie plus bare-name and per-file indexes over every definition of a run.
#[derive(Debug, Default, Clone)]
pub struct SymbolRegistry {
    trie: SymbolTrie,
    by_name: HashMap<String, Vec<SymbolEntry>>,
    by_file: HashMap<String, Vec<SymbolEntry>>,
    next_seq: u64,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.trie.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Register a definition. O(depth) for the trie, O(1) for the indexes.
    pub fn add_definition(&mut self, mut entry: SymbolEntry) {
        self.next_seq += 1;
        entry.seq = self.next_seq;
        self.trie.insert(&entry.qualified_name, entry.clone());
        self.by_name
            .entry(entry.bare_name.clone())
            .or_default()
            .push(entry.clone());
        self.by_file
            .entry(entry.file_path.clone())
            .or_default()
            .push(entry);
    }

    pub fn get_exact_match(&self, qualified_name: &str) -> Vec<SymbolEntry> {
        self.trie.get(qualified_name).to_vec()
    }

    /// Entries whose qualified name ends with the dotted `suffix` on a
    /// segment boundary (`helper`, `x.helper`, `Base.save`).
    pub fn find_by_suffix(&self, suffix: &str) -> Vec<SymbolEntry> {
        let bare = suffix.rsplit('.').next().unwrap_or(suffix);
        let dotted = format!(".{suffix}");
        self.find_by_bare_name(bare)
            .iter()
            .filter(|e| e.qualified_name == suffix || e.qualified_name.ends_with(&dotted))
            .cloned()
            .collect()
    }

    pub fn find_by_bare_name(&self, name: &str) -> &[SymbolEntry] {
        self.by_name.get(name).map_or(&[][..], Vec::as_slice)
    }

    pub fn find_in_file(&self, file_path: &str, name: &str) -> Vec<SymbolEntry> {
        self.definitions_in_file(file_path)
            .iter()
            .filter(|e| e.bare_name == name)
            .cloned()
            .collect()
    }

    pub fn definitions_in_file(&self, file_path: &str) -> &[SymbolEntry] {
        self.by_file.get(file_path).map_or(&[][..], Vec::as_slice)
    }

    /// Drop every definition registered for `file_path`, pruning empty trie
    /// nodes and index buckets. Returns the number of entries removed.
    pub fn remove_file_definitions(&mut self, file_path: &str) -> usize {
        let Some(entries) = self.by_file.remove(file_path) else {
            return 0;
        };
        let mut removed = 0;
        for entry in &entries {
            removed += self
                .trie
                .remove_where(&entry.qualified_name, |e| e.seq == entry.seq);
            if let Some(bucket) = self.by_name.get_mut(&entry.bare_name) {
                bucket.retain(|e| e.seq != entry.seq);
                if bucket.is_empty() {
                    self.by_name.remove(&entry.bare_name);
                }
            }
        }
        removed
    }

    /// Stable sort by (import distance from `caller_file`, insertion order).
    pub fn rank_candidates(&self, caller_file: &str, mut candidates: Vec<SymbolEntry>) -> Vec<SymbolEntry> {
        candidates.sort_by_key(|e| (calculate_import_distance(caller_file, &e.file_path), e.seq));
        candidates
    }

    #[cfg(test)]
    pub(crate) fn trie(&self) -> &SymbolTrie {
        &self.trie
    }
}
