use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Index a source tree into a typed knowledge graph and query it.
///
/// repo-graph parses every supported file, links definitions, imports, calls
/// and type hierarchies, and answers a restricted Cypher dialect over the result.
#[derive(Parser, Debug)]
#[command(
    name = "repo-graph",
    version,
    about,
    long_about = None,
    propagate_version = true,
)]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index a project directory and print run statistics.
    Index {
        /// Path to the project root to index.
        path: PathBuf,

        /// Output statistics as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,

        /// Write the graph snapshot under `.repo-graph/` for later queries.
        #[arg(long)]
        save: bool,

        /// Files per batch (overrides repo-graph.toml).
        #[arg(long)]
        batch_size: Option<usize>,

        /// Only index paths containing one of these substrings (comma-separated).
        #[arg(long, value_delimiter = ',')]
        include_dir: Vec<String>,

        /// Only index files with one of these extensions (comma-separated).
        #[arg(long, value_delimiter = ',')]
        ext: Vec<String>,
    },

    /// Run a Cypher-like query and print the result as JSON.
    ///
    /// Re-indexes the project first unless `--cached` is given.
    Query {
        /// Query text, e.g. "MATCH (f:Function) RETURN COUNT(f)".
        query: String,

        /// Path to the project root.
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Maximum number of rows.
        #[arg(long)]
        limit: Option<usize>,

        /// Rows to skip before the first returned row.
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Query the snapshot written by `index --save` instead of re-indexing.
        #[arg(long)]
        cached: bool,
    },
}
