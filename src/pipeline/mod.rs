pub mod batch;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;
use tree_sitter::{Language, Tree};

use crate::builder::structure::{FileFacts, FileType, add_file, add_project};
use crate::builder::{FileRecord, add_definitions, link_imports, link_type_hierarchy, resolve_calls};
use crate::cache::CacheService;
use crate::config::IndexConfig;
use crate::graph::KnowledgeGraph;
use crate::graph::edge::RelationshipKind;
use crate::graph::node::NodeKind;
use crate::language::LanguageKind;
use crate::parser::generated::is_generated;
use crate::parser::languages::{Grammar, GrammarRegistry, grammar_for_path, parse_detached};
use crate::parser::{FileExtraction, extract_file};
use crate::registry::SymbolRegistry;

use batch::{FileFilters, batches, schedule_files};

/// Per-run knobs that are not part of the persistent configuration.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Overrides `include_dirs`/`include_extensions` from the config.
    pub filters: Option<FileFilters>,
    /// Checked at batch boundaries; setting it stops the run early.
    pub cancel: Option<Arc<AtomicBool>>,
    /// Overrides `project_name` from the config.
    pub project_name: Option<String>,
}

/// The files of one run: repo-relative `/`-separated paths plus their contents.
#[derive(Debug, Clone, Default)]
pub struct PipelineInput {
    pub file_paths: Vec<String>,
    pub file_contents: HashMap<String, String>,
    pub options: PipelineOptions,
}

/// Aggregate statistics produced by an indexing run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    /// Source files handed to the extractor.
    pub files_attempted: usize,
    /// Source files that produced definitions through either extractor.
    pub files_succeeded: usize,
    /// Source files whose grammar produced no tree (indexed by the regex fallback).
    pub files_failed: usize,
    /// Generated or minified files indexed as bare File nodes.
    pub files_generated: usize,
    pub config_files: usize,
    pub definitions: usize,
    pub calls_resolved: usize,
    pub calls_unresolved: usize,
    /// Resolved calls per precedence step (`builtin`, `import`, ...).
    pub resolutions: BTreeMap<String, usize>,
    pub imports_internal: usize,
    pub imports_external: usize,
    pub imports_unresolved: usize,
    pub nodes: BTreeMap<String, usize>,
    pub relationships: BTreeMap<String, usize>,
    /// True when the run stopped at a batch boundary before completing.
    pub cancelled: bool,
    /// Wall-clock time for the run in seconds.
    pub elapsed_secs: f64,
}

/// Outcome of parsing and extracting one file, before it touches the graph.
struct Analyzed {
    path: String,
    language: LanguageKind,
    size: usize,
    generated: bool,
    parse_error: bool,
    tree: Option<Tree>,
    extraction: Option<FileExtraction>,
}

/// Parse and extract one file. `parse` supplies a tree for a grammar; the
/// serial path uses the registry's parsers, rayon workers throw-away ones.
fn analyze(path: &str, content: &str, parse: impl FnOnce(Grammar) -> Option<Tree>) -> Option<Analyzed> {
    let language = LanguageKind::from_path(path)?;
    let mut analyzed = Analyzed {
        path: path.to_owned(),
        language,
        size: content.len(),
        generated: false,
        parse_error: false,
        tree: None,
        extraction: None,
    };
    if is_generated(path, content) {
        analyzed.generated = true;
        return Some(analyzed);
    }
    let grammar = grammar_for_path(path);
    let tree = grammar.and_then(parse);
    analyzed.parse_error = grammar.is_some() && tree.is_none();
    let extraction = extract_file(path, content, tree.as_ref().zip(grammar), language);
    analyzed.tree = tree;
    analyzed.extraction = Some(extraction);
    Some(analyzed)
}

/// The indexing pipeline.
///
/// Owns the grammar registry, the syntax-tree cache and the symbol registry of
/// the last run. One `process` call rebuilds all three from scratch.
#[derive(Debug)]
pub struct Pipeline {
    config: IndexConfig,
    grammars: GrammarRegistry,
    cache: CacheService,
    registry: SymbolRegistry,
}

impl Pipeline {
    pub fn new(config: IndexConfig) -> Self {
        let cache = CacheService::new(config.ast_cache_capacity);
        Self {
            config,
            grammars: GrammarRegistry::new(),
            cache,
            registry: SymbolRegistry::new(),
        }
    }

    pub fn registry(&self) -> &SymbolRegistry {
        &self.registry
    }

    /// Syntax tree of a recently indexed file, if still cached.
    pub fn get_ast(&self, path: &str) -> Option<&Tree> {
        self.cache.ast(path)
    }

    /// Paths whose syntax trees are currently cached.
    pub fn cached_asts(&self) -> Vec<&str> {
        self.cache.ast_paths()
    }

    /// Index `input` into `graph`.
    ///
    /// Runs file selection, per-batch extraction with pass 1 of the
    /// relationship builder, then (unless cancelled) the type hierarchy pass,
    /// import linking and call resolution. Never fails: degraded files are
    /// counted in the returned [`RunStats`].
    pub async fn process(&mut self, graph: &mut KnowledgeGraph, input: PipelineInput) -> RunStats {
        let started = Instant::now();
        let mut stats = RunStats::default();
        self.registry.clear();
        self.cache.clear();

        let PipelineInput {
            file_paths,
            file_contents,
            options,
        } = input;
        let filters = options
            .filters
            .filter(|f| !f.is_empty())
            .or_else(|| FileFilters::from_config(&self.config));
        let schedule = schedule_files(&file_paths, &file_contents, filters.as_ref());
        tracing::info!(
            "indexing {} source and {} config files",
            schedule.source.len(),
            schedule.config.len()
        );

        let project_name = options
            .project_name
            .or_else(|| self.config.project_name.clone())
            .unwrap_or_else(|| "project".to_owned());
        let project_id = add_project(graph, &project_name);

        for path in &schedule.config {
            let size = file_contents.get(path).map_or(0, String::len);
            add_file(graph, &project_id, path, &FileFacts::new(None, size, FileType::Config));
            stats.config_files += 1;
        }

        let known: BTreeSet<String> = schedule.source.iter().cloned().collect();
        let mut records: Vec<FileRecord> = Vec::new();
        let pause = Duration::from_millis(self.config.batch_pause_ms);

        for (i, batch) in batches(&schedule.source, self.config.batch_size).enumerate() {
            if options
                .cancel
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::Relaxed))
            {
                tracing::info!("indexing cancelled after {i} batch(es)");
                stats.cancelled = true;
                break;
            }
            if i > 0 && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }

            let analyzed = if self.config.parallel_extraction {
                self.analyze_parallel(batch, &file_contents)
            } else {
                self.analyze_serial(batch, &file_contents)
            };
            for file in analyzed {
                self.apply(graph, &project_id, file, &mut stats, &mut records);
            }
        }

        if !stats.cancelled {
            let hierarchy = link_type_hierarchy(graph, &self.registry);
            tracing::debug!(
                "type hierarchy: {} inherits, {} implements, {} overrides",
                hierarchy.inherits,
                hierarchy.implements,
                hierarchy.overrides
            );

            let imports = link_imports(graph, &records, &known);
            stats.imports_internal = imports.internal;
            stats.imports_external = imports.external;
            stats.imports_unresolved = imports.unresolved;

            let calls = resolve_calls(graph, &self.registry, &records, &known);
            stats.calls_resolved = calls.resolved;
            stats.calls_unresolved = calls.unresolved;
            stats.resolutions = calls
                .by_resolution
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v))
                .collect();
        }

        for kind in NodeKind::ALL {
            let n = graph.count_nodes(kind);
            if n > 0 {
                stats.nodes.insert(kind.as_str().to_owned(), n);
            }
        }
        for rel in graph.relationships() {
            *stats
                .relationships
                .entry(rel.kind.as_str().to_owned())
                .or_default() += 1;
        }
        debug_assert!(
            graph.check_integrity().is_ok(),
            "graph integrity violated after indexing"
        );

        stats.elapsed_secs = started.elapsed().as_secs_f64();
        tracing::info!(
            "indexed {} files ({} definitions, {} calls resolved, {} unresolved) in {:.2}s",
            stats.files_attempted,
            stats.definitions,
            stats.calls_resolved,
            stats.calls_unresolved,
            stats.elapsed_secs
        );
        stats
    }

    fn analyze_serial(&mut self, batch: &[String], contents: &HashMap<String, String>) -> Vec<Analyzed> {
        batch
            .iter()
            .filter_map(|path| {
                let content = contents.get(path)?;
                analyze(path, content, |g| self.grammars.parse(g, content))
            })
            .collect()
    }

    fn analyze_parallel(&mut self, batch: &[String], contents: &HashMap<String, String>) -> Vec<Analyzed> {
        // Load grammars up front; workers only get the shared `Language`s.
        let languages: HashMap<Grammar, Language> = batch
            .iter()
            .filter_map(|p| grammar_for_path(p))
            .collect::<HashSet<_>>()
            .into_iter()
            .filter_map(|g| Some((g, self.grammars.language(g)?)))
            .collect();

        batch
            .par_iter()
            .filter_map(|path| {
                let content = contents.get(path)?;
                analyze(path, content, |g| {
                    languages.get(&g).and_then(|l| parse_detached(l, content))
                })
            })
            .collect()
    }

    /// Pass 1 for one analyzed file. Graph and registry mutation stays on the
    /// coordinating thread.
    fn apply(
        &mut self,
        graph: &mut KnowledgeGraph,
        project_id: &str,
        file: Analyzed,
        stats: &mut RunStats,
        records: &mut Vec<FileRecord>,
    ) {
        stats.files_attempted += 1;
        let mut facts = FileFacts::new(Some(file.language), file.size, FileType::Source);
        facts.generated = file.generated;
        facts.parse_error = file.parse_error;
        facts.syntax_errors = file
            .tree
            .as_ref()
            .is_some_and(|t| t.root_node().has_error());
        facts.extractor = file.extraction.as_ref().map(|e| e.extractor);
        let file_id = add_file(graph, project_id, &file.path, &facts);

        if file.generated {
            tracing::debug!("{}: generated, indexed without extraction", file.path);
            stats.files_generated += 1;
            return;
        }
        if file.parse_error {
            tracing::warn!("{}: parse failed, using regex extraction", file.path);
            stats.files_failed += 1;
        } else {
            stats.files_succeeded += 1;
        }

        let Some(extraction) = file.extraction else {
            return;
        };
        let node_ids = add_definitions(
            graph,
            &mut self.registry,
            &file_id,
            &file.path,
            file.language,
            &extraction.definitions,
        );
        stats.definitions += node_ids.len();
        tracing::debug!(
            "{}: {} definitions, {} imports, {} calls",
            file.path,
            node_ids.len(),
            extraction.imports.len(),
            extraction.calls.len()
        );
        if let Some(tree) = file.tree {
            self.cache.store_ast(&file.path, tree);
        }
        records.push(FileRecord {
            path: file.path,
            language: file.language,
            file_id,
            extraction,
            node_ids,
        });
    }
}

impl RunStats {
    pub fn relationship_count(&self, kind: RelationshipKind) -> usize {
        self.relationships.get(kind.as_str()).copied().unwrap_or(0)
    }

    pub fn node_count(&self, kind: NodeKind) -> usize {
        self.nodes.get(kind.as_str()).copied().unwrap_or(0)
    }
}
