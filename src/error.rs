use std::path::PathBuf;

/// Errors raised by the query engine.
///
/// All variants are recoverable: the engine stays usable after returning one,
/// so a caller can regenerate the query text and try again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// The text matched none of the five recognised query shapes.
    #[error("unrecognized query: {0}")]
    Unrecognized(String),

    /// A variable-length pattern with `min > max` or an unparsable bound.
    #[error("invalid path depth in `{text}`: {reason}")]
    InvalidDepth { text: String, reason: String },

    /// A property filter map that could not be parsed (`{key:'value'}`).
    #[error("invalid property filter `{0}`")]
    InvalidProperty(String),

    /// A projection or predicate referenced a variable not bound by MATCH.
    #[error("unknown variable `{0}` in RETURN/WHERE clause")]
    UnknownVariable(String),
}

/// Violations of the knowledge-graph invariants.
///
/// These indicate a bug in the builder (or a corrupt external record set),
/// never bad source input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("duplicate node id `{0}`")]
    DuplicateNode(String),

    #[error("relationship `{id}` references missing node `{missing}`")]
    DanglingEdge { id: String, missing: String },

    #[error("node index out of sync for `{0}`")]
    IndexMismatch(String),
}

/// Errors raised while saving or loading a graph snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot version {found} does not match expected {expected}")]
    Version { found: u32, expected: u32 },

    #[error("snapshot rejected: {0}")]
    Graph(#[from] GraphError),

    #[error("failed to persist snapshot: {0}")]
    Persist(#[from] tempfile::PersistError),
}
