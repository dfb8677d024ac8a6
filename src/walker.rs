use std::collections::HashMap;
use std::path::Path;

use crate::config::RepoGraphConfig;
use crate::language::{LanguageKind, is_config_file};
use crate::pipeline::PipelineInput;
use crate::pipeline::batch::is_ignored;

/// Files discovered under a project root, keyed by root-relative `/` paths.
#[derive(Debug, Default)]
pub struct Inventory {
    /// Relative paths in sorted order.
    pub paths: Vec<String>,
    pub contents: HashMap<String, String>,
    /// Candidate files skipped because they could not be read as UTF-8.
    pub unreadable: usize,
}

impl Inventory {
    pub fn into_input(self) -> PipelineInput {
        PipelineInput {
            file_paths: self.paths,
            file_contents: self.contents,
            ..Default::default()
        }
    }
}

/// Walk a project directory and read every indexable file.
///
/// Respects `.gitignore` rules, prunes dependency and build directories, and
/// applies any additional exclusions from `config.exclude`. Only files with a
/// recognised language or an allow-listed config name are read.
///
/// When `verbose` is true, each discovered file path is logged at debug level.
pub fn collect_inventory(
    root: &Path,
    config: &RepoGraphConfig,
    verbose: bool,
) -> anyhow::Result<Inventory> {
    if !root.is_dir() {
        anyhow::bail!("{} is not a directory", root.display());
    }

    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(true)
        // Read .gitignore files even when the directory is not inside a git repository.
        .require_git(false)
        .build();

    let mut inventory = Inventory::default();
    for result in walker {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!("walk error: {err}");
                continue;
            }
        };

        if entry.file_type().is_none_or(|ft| ft.is_dir()) {
            continue;
        }
        let Some(relative) = relative_path(root, entry.path()) else {
            continue;
        };
        if is_ignored(&relative) || is_excluded_by_config(&relative, config) {
            continue;
        }
        if LanguageKind::from_path(&relative).is_none() && !is_config_file(&relative) {
            continue;
        }

        match std::fs::read_to_string(entry.path()) {
            Ok(content) => {
                if verbose {
                    tracing::debug!("{relative}");
                }
                inventory.contents.insert(relative.clone(), content);
                inventory.paths.push(relative);
            }
            Err(err) => {
                tracing::warn!("skipping {relative}: {err}");
                inventory.unreadable += 1;
            }
        }
    }

    inventory.paths.sort();
    Ok(inventory)
}

/// `path` relative to `root` with `/` separators.
fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Returns true if the relative path, or any of its segments, matches an
/// exclusion glob from config.
fn is_excluded_by_config(relative: &str, config: &RepoGraphConfig) -> bool {
    let Some(patterns) = &config.exclude else {
        return false;
    };

    patterns.iter().any(|pattern| {
        let Ok(glob) = glob::Pattern::new(pattern) else {
            tracing::warn!("ignoring invalid exclude pattern `{pattern}`");
            return false;
        };
        glob.matches(relative) || relative.split('/').any(|segment| glob.matches(segment))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("tempdir")
    }

    fn write(dir: &TempDir, path: &str, content: &str) {
        let full = dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }

    #[test]
    fn test_collects_source_and_config_files() {
        let dir = tmp();
        write(&dir, "src/app.py", "def main(): pass\n");
        write(&dir, "web/index.ts", "export {}\n");
        write(&dir, "package.json", "{}");
        write(&dir, "README.md", "# Hello");

        let inventory = collect_inventory(dir.path(), &RepoGraphConfig::default(), false).unwrap();
        assert_eq!(inventory.paths, vec!["package.json", "src/app.py", "web/index.ts"]);
        assert_eq!(inventory.contents["src/app.py"], "def main(): pass\n");
        assert_eq!(inventory.unreadable, 0);
    }

    #[test]
    fn test_prunes_dependency_directories() {
        let dir = tmp();
        write(&dir, "node_modules/pkg/index.js", "module.exports = {}");
        write(&dir, ".venv/lib/site.py", "");
        write(&dir, "main.go", "package main\n");

        let inventory = collect_inventory(dir.path(), &RepoGraphConfig::default(), false).unwrap();
        assert_eq!(inventory.paths, vec!["main.go"]);
    }

    #[test]
    fn test_respects_exclude_patterns() {
        let dir = tmp();
        write(&dir, "src/lib.rs", "pub fn a() {}");
        write(&dir, "generated/api.rs", "pub fn b() {}");
        write(&dir, "src/lib_test.rs", "fn t() {}");

        let config = RepoGraphConfig {
            exclude: Some(vec!["generated".to_owned(), "*_test.rs".to_owned()]),
            ..Default::default()
        };
        let inventory = collect_inventory(dir.path(), &config, false).unwrap();
        assert_eq!(inventory.paths, vec!["src/lib.rs"]);
    }

    #[test]
    fn test_respects_gitignore() {
        let dir = tmp();
        write(&dir, ".gitignore", "scratch/\n");
        write(&dir, "scratch/tmp.py", "x = 1");
        write(&dir, "keep.py", "y = 2");

        let inventory = collect_inventory(dir.path(), &RepoGraphConfig::default(), false).unwrap();
        assert_eq!(inventory.paths, vec!["keep.py"]);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tmp();
        let missing = dir.path().join("nope");
        assert!(collect_inventory(&missing, &RepoGraphConfig::default(), false).is_err());
    }
}
