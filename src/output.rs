use std::collections::BTreeMap;

use repo_graph::pipeline::RunStats;
use repo_graph::query::QueryResult;

/// Print a summary of the indexing run.
///
/// - `json = true`: emit a pretty-printed JSON object to stdout.
/// - `json = false`: emit a cargo-style human-readable summary to stdout.
///
/// Fallback-parsed files and cancellation are reported on **stderr** so that
/// the stdout stream remains clean for downstream JSON consumers.
pub fn print_summary(stats: &RunStats, json: bool) {
    if json {
        match serde_json::to_string_pretty(stats) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("error serialising stats: {e}"),
        }
    } else {
        for line in summary_lines(stats) {
            println!("{line}");
        }
    }

    if stats.files_failed > 0 {
        eprintln!(
            "  {} files had no syntax tree (indexed by pattern fallback)",
            stats.files_failed
        );
    }
    if stats.cancelled {
        eprintln!("  run cancelled before completion; graph is partial");
    }
}

/// Print a query result as pretty JSON.
pub fn print_query_result(result: &QueryResult) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

fn summary_lines(stats: &RunStats) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Indexed {} files in {:.2}s",
            stats.files_attempted + stats.config_files,
            stats.elapsed_secs
        ),
        format!(
            "  {} source ({} generated), {} config",
            stats.files_attempted, stats.files_generated, stats.config_files
        ),
        format!("  {} definitions", stats.definitions),
        format!("  nodes: {}", counts(&stats.nodes)),
        format!("  relationships: {}", counts(&stats.relationships)),
        format!(
            "  Resolved {} calls ({} unresolved)",
            stats.calls_resolved, stats.calls_unresolved
        ),
        format!(
            "  Resolved {} imports ({} external, {} unresolved)",
            stats.imports_internal, stats.imports_external, stats.imports_unresolved
        ),
    ];
    if !stats.resolutions.is_empty() {
        lines.push(format!("  call resolution: {}", counts(&stats.resolutions)));
    }
    lines
}

/// `Class 2, Function 7` with zero counts omitted.
fn counts(map: &BTreeMap<String, usize>) -> String {
    let parts: Vec<String> = map
        .iter()
        .filter(|(_, n)| **n > 0)
        .map(|(k, n)| format!("{k} {n}"))
        .collect();
    if parts.is_empty() {
        "none".to_owned()
    } else {
        parts.join(", ")
    }
}
