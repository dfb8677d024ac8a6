mod cli;
mod output;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use repo_graph::cache::snapshot::{load_snapshot, save_snapshot};
use repo_graph::config::RepoGraphConfig;
use repo_graph::graph::KnowledgeGraph;
use repo_graph::pipeline::batch::FileFilters;
use repo_graph::pipeline::{Pipeline, PipelineInput, RunStats};
use repo_graph::query::{QueryEngine, QueryOptions};
use repo_graph::walker::collect_inventory;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "repo_graph=debug" } else { "repo_graph=info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Index {
            path,
            json,
            save,
            batch_size,
            include_dir,
            ext,
        } => {
            let mut config = RepoGraphConfig::load(&path);
            if let Some(size) = batch_size {
                config.index.batch_size = size;
            }
            let filters = FileFilters {
                include_dirs: include_dir,
                extensions: ext,
            };
            let filters = (!filters.is_empty()).then_some(filters);

            let (graph, stats) = index(&path, &config, filters, cli.verbose).await?;
            if save {
                let written = save_snapshot(&path, &graph)?;
                tracing::info!("snapshot written to {}", written.display());
            }
            output::print_summary(&stats, json);
        }
        Commands::Query {
            query,
            path,
            limit,
            offset,
            cached,
        } => {
            let config = RepoGraphConfig::load(&path);
            let graph = if cached {
                load_snapshot(&path)
                    .with_context(|| format!("no usable snapshot under {}", path.display()))?
            } else {
                index(&path, &config, None, cli.verbose).await?.0
            };
            let mut engine = QueryEngine::new(&graph, config.query);
            let result = engine.execute_query(&query, QueryOptions { limit, offset })?;
            output::print_query_result(&result)?;
        }
    }

    Ok(())
}

async fn index(
    root: &Path,
    config: &RepoGraphConfig,
    filters: Option<FileFilters>,
    verbose: bool,
) -> Result<(KnowledgeGraph, RunStats)> {
    let inventory = collect_inventory(root, config, verbose)?;
    tracing::info!("indexing {} file(s) under {}", inventory.paths.len(), root.display());

    let mut input: PipelineInput = inventory.into_input();
    input.options.filters = filters;
    if config.index.project_name.is_none() {
        input.options.project_name = root
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()));
    }

    let mut graph = KnowledgeGraph::new();
    let mut pipeline = Pipeline::new(config.index.clone());
    let stats = pipeline.process(&mut graph, input).await;
    Ok((graph, stats))
}
