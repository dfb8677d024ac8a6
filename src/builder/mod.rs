//! Graph construction from extractor output.
//!
//! [`structure`] lays out project, folder and file nodes; [`relationships`]
//! adds definition nodes (pass 1) and the type hierarchy (pass 2); [`calls`]
//! resolves call sites and imports once every file is in the registry.

pub mod builtins;
pub mod calls;
pub mod modules;
pub mod relationships;
pub mod structure;

use crate::language::LanguageKind;
use crate::parser::FileExtraction;

pub use calls::{CallStats, ImportStats, Resolution, link_imports, resolve_calls};
pub use relationships::{HierarchyStats, add_definitions, link_type_hierarchy};

/// One extracted source file, kept until call resolution has run.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub path: String,
    pub language: LanguageKind,
    pub file_id: String,
    pub extraction: FileExtraction,
    /// Graph node id of every definition, parallel to `extraction.definitions`.
    pub node_ids: Vec<String>,
}
