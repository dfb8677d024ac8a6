/// Integration test suite for the `repo-graph` binary.
///
/// All tests invoke the compiled binary via subprocess. The `CARGO_BIN_EXE_repo-graph`
/// environment variable is set by Cargo during `cargo test` to point to the compiled
/// binary for the current profile. Fixtures are small projects written to temp dirs,
/// plus one run over this crate's own `src/` tree.
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_repo-graph"))
}

/// Run a repo-graph command and assert it exits successfully.
/// Returns stdout as a String.
fn run_success(args: &[&str]) -> String {
    let out = Command::new(binary())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to invoke repo-graph binary");
    let stdout = String::from_utf8_lossy(&out.stdout).to_string();
    let stderr = String::from_utf8_lossy(&out.stderr).to_string();
    assert!(
        out.status.success(),
        "command {args:?} failed with status {:?}\nstdout: {stdout}\nstderr: {stderr}",
        out.status,
    );
    stdout
}

/// Run a repo-graph command and assert it exits with a non-zero status.
/// Returns stderr as a String.
fn run_failure(args: &[&str]) -> String {
    let out = Command::new(binary())
        .args(args)
        .output()
        .expect("failed to invoke repo-graph binary");
    let stdout = String::from_utf8_lossy(&out.stdout).to_string();
    let stderr = String::from_utf8_lossy(&out.stderr).to_string();
    assert!(
        !out.status.success(),
        "command {args:?} expected to fail but exited successfully\nstdout: {stdout}\nstderr: {stderr}",
    );
    stderr
}

fn json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout).unwrap_or_else(|e| panic!("invalid JSON ({e}):\n{stdout}"))
}

fn write(root: &Path, path: &str, content: &str) {
    let full = root.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, content).unwrap();
}

/// A small mixed-language project.
fn fixture() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    write(root, "a/x.py", "def helper():\n    return 1\n");
    write(root, "a/main.py", "from x import helper\n\ndef main():\n    helper()\n");
    write(
        root,
        "a/models.py",
        "class Base:\n    def save(self):\n        pass\n\nclass Child(Base):\n    def save(self):\n        pass\n",
    );
    write(root, "web/util.ts", "export function format(s: string) {\n  return s;\n}\n");
    write(root, "web/app.ts", "import { format } from './util';\nexport function run() {\n  format('x');\n}\n");
    write(root, "package.json", "{}");
    write(root, "README.md", "# fixture\n");
    write(root, "node_modules/dep/index.js", "function ignored() {}\n");
    dir
}

fn path_str(dir: &TempDir) -> &str {
    dir.path().to_str().unwrap()
}

// ---------------------------------------------------------------------------
// index
// ---------------------------------------------------------------------------

#[test]
fn test_index_human_summary() {
    let dir = fixture();
    let stdout = run_success(&["index", path_str(&dir)]);
    assert!(stdout.starts_with("Indexed 6 files"), "stdout: {stdout}");
    assert!(stdout.contains("definitions"));
}

#[test]
fn test_index_json_stats() {
    let dir = fixture();
    let stats = json(&run_success(&["index", "--json", path_str(&dir)]));
    assert_eq!(stats["files_attempted"], 5);
    assert_eq!(stats["config_files"], 1);
    assert_eq!(stats["nodes"]["Function"], 4, "helper, main, format, run");
    assert_eq!(stats["nodes"]["Method"], 2);
    assert_eq!(stats["relationships"]["INHERITS"], 1);
    assert_eq!(stats["relationships"]["OVERRIDES"], 1);
    assert!(stats["calls_resolved"].as_u64().unwrap() >= 2);
    assert_eq!(stats["cancelled"], false);
}

#[test]
fn test_index_filters() {
    let dir = fixture();
    let by_ext = json(&run_success(&["index", "--json", "--ext", "ts", path_str(&dir)]));
    assert_eq!(by_ext["files_attempted"], 2);
    assert_eq!(by_ext["config_files"], 0);

    let by_dir = json(&run_success(&["index", "--json", "--include-dir", "a/", path_str(&dir)]));
    assert_eq!(by_dir["files_attempted"], 3);
}

#[test]
fn test_config_file_excludes() {
    let dir = fixture();
    write(dir.path(), "repo-graph.toml", "exclude = [\"web\"]\n\n[index]\nbatch_size = 1\n");
    let stats = json(&run_success(&["index", "--json", path_str(&dir)]));
    assert_eq!(stats["files_attempted"], 3, "web/ is excluded");
}

#[test]
fn test_index_own_source() {
    let src = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src");
    let stats = json(&run_success(&["index", "--json", src.to_str().unwrap()]));
    assert!(stats["files_attempted"].as_u64().unwrap() > 10);
    assert!(stats["nodes"]["Function"].as_u64().unwrap() > 50);
    assert_eq!(stats["files_failed"], 0, "every file of this crate parses");
}

#[test]
fn test_index_missing_path_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist");
    let stderr = run_failure(&["index", missing.to_str().unwrap()]);
    assert!(stderr.contains("not a directory"), "stderr: {stderr}");
}

// ---------------------------------------------------------------------------
// query
// ---------------------------------------------------------------------------

#[test]
fn test_query_count() {
    let dir = fixture();
    let result = json(&run_success(&["query", "MATCH (f:Function) RETURN COUNT(f)", path_str(&dir)]));
    assert_eq!(result["data"], serde_json::json!([{"COUNT(f)": 4}]));
}

#[test]
fn test_query_filter_with_limit() {
    let dir = fixture();
    let result = json(&run_success(&[
        "query",
        "MATCH (f:Function) WHERE f.filePath CONTAINS 'a/' RETURN f.name",
        path_str(&dir),
        "--limit",
        "1",
    ]));
    assert_eq!(result["data"].as_array().unwrap().len(), 1);
    assert_eq!(result["nodes"].as_array().unwrap().len(), 1);
}

#[test]
fn test_query_paths() {
    let dir = fixture();
    let result = json(&run_success(&[
        "query",
        "MATCH (a:Function {name: 'main'})-[:CALLS*1..2]->(b:Function)",
        path_str(&dir),
    ]));
    let paths = result["paths"].as_array().unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0]["nodes"][1], "Function:a/x.py:helper:1");
}

#[test]
fn test_query_cached_snapshot() {
    let dir = fixture();
    run_success(&["index", "--save", path_str(&dir)]);
    assert!(dir.path().join(".repo-graph/graph.json").exists());

    let result = json(&run_success(&[
        "query",
        "MATCH (c:Class) RETURN c.name",
        path_str(&dir),
        "--cached",
    ]));
    let mut names: Vec<&str> = result["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["c.name"].as_str().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Base", "Child"]);
}

#[test]
fn test_query_cached_without_snapshot_fails() {
    let dir = fixture();
    let stderr = run_failure(&["query", "MATCH (f:Function) RETURN f", path_str(&dir), "--cached"]);
    assert!(stderr.contains("snapshot"), "stderr: {stderr}");
}

#[test]
fn test_unrecognized_query_fails() {
    let dir = fixture();
    let stderr = run_failure(&["query", "DELETE everything", path_str(&dir)]);
    assert!(stderr.contains("unrecognized query"), "stderr: {stderr}");
}
