use std::path::Path;

use serde::Deserialize;

/// Name of the per-project configuration file.
pub const CONFIG_FILE: &str = "repo-graph.toml";

/// Configuration loaded from `repo-graph.toml` at the project root.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct RepoGraphConfig {
    /// Additional glob patterns to exclude from the file walk (beyond .gitignore).
    pub exclude: Option<Vec<String>>,
    /// Indexing pipeline settings.
    pub index: IndexConfig,
    /// Query engine settings.
    pub query: QueryConfig,
}

/// `[index]` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    /// Files handed to the extractor per batch.
    pub batch_size: usize,
    /// Cooperative pause between batches, in milliseconds.
    pub batch_pause_ms: u64,
    /// Parse and extract each batch on the rayon pool.
    pub parallel_extraction: bool,
    /// Number of syntax trees kept for `Pipeline::get_ast`.
    pub ast_cache_capacity: usize,
    /// Only index paths containing one of these directory substrings.
    pub include_dirs: Vec<String>,
    /// Only index files with one of these extensions (`py` or `.py`).
    pub include_extensions: Vec<String>,
    /// Name of the Project node. Defaults to the root directory name.
    pub project_name: Option<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            batch_pause_ms: 10,
            parallel_extraction: false,
            ast_cache_capacity: 64,
            include_dirs: Vec::new(),
            include_extensions: Vec::new(),
            project_name: None,
        }
    }
}

/// `[query]` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueryConfig {
    /// Source and target endpoints considered per variable-length pattern.
    pub max_path_candidates: usize,
    /// Paths returned per (source, target) pair.
    pub max_paths_per_pair: usize,
    /// Edges a variable-length search may traverse before giving up.
    pub max_path_steps: usize,
    /// Upper depth bound for a bare `*` pattern.
    pub default_max_depth: usize,
    /// Entries kept in the query-result LRU.
    pub query_cache_capacity: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_path_candidates: 50,
            max_paths_per_pair: 10,
            max_path_steps: 200_000,
            default_max_depth: 5,
            query_cache_capacity: 128,
        }
    }
}

impl RepoGraphConfig {
    /// Load configuration from `repo-graph.toml` in the given root directory.
    ///
    /// Returns the defaults if the file does not exist or cannot be parsed.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);

        if !config_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!("failed to parse {CONFIG_FILE}: {err}. Using defaults.");
                    Self::default()
                }
            },
            Err(err) => {
                tracing::warn!("failed to read {CONFIG_FILE}: {err}. Using defaults.");
                Self::default()
            }
        }
    }
}
