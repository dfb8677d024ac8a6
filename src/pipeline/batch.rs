use std::collections::HashMap;

use crate::config::IndexConfig;
use crate::language::{LanguageKind, is_config_file};

/// Path segments that are never indexed (VCS metadata, dependencies, build output, caches).
pub const IGNORED_SEGMENTS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "node_modules",
    "bower_components",
    "vendor",
    "dist",
    "build",
    "out",
    "target",
    "coverage",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".tox",
    ".venv",
    "venv",
    "env",
    ".idea",
    ".vscode",
    ".next",
    ".nuxt",
    ".cache",
    ".gradle",
];

/// Substrings that mark installed third-party packages anywhere in a path.
pub const IGNORED_SUBSTRINGS: &[&str] = &["site-packages", ".egg-info", "dist-packages"];

/// User-supplied narrowing of the indexed set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileFilters {
    /// Keep paths containing at least one of these substrings.
    pub include_dirs: Vec<String>,
    /// Keep files with one of these extensions, with or without a leading dot.
    pub extensions: Vec<String>,
}

impl FileFilters {
    pub fn from_config(config: &IndexConfig) -> Option<Self> {
        let filters = Self {
            include_dirs: config.include_dirs.clone(),
            extensions: config.include_extensions.clone(),
        };
        (!filters.is_empty()).then_some(filters)
    }

    pub fn is_empty(&self) -> bool {
        self.include_dirs.is_empty() && self.extensions.is_empty()
    }

    fn allows(&self, path: &str) -> bool {
        let dir_ok = self.include_dirs.is_empty()
            || self.include_dirs.iter().any(|d| path.contains(d.as_str()));
        if !dir_ok {
            return false;
        }
        if self.extensions.is_empty() {
            return true;
        }
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let Some((_, ext)) = file_name.rsplit_once('.') else {
            return false;
        };
        self.extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

/// Files selected for one run, split by how they are indexed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSchedule {
    /// Files with a known language, extracted in input order.
    pub source: Vec<String>,
    /// Allow-listed config files, indexed as File nodes only.
    pub config: Vec<String>,
}

impl FileSchedule {
    pub fn is_empty(&self) -> bool {
        self.source.is_empty() && self.config.is_empty()
    }

    pub fn len(&self) -> usize {
        self.source.len() + self.config.len()
    }
}

/// True when a segment of `path` is in the ignore set or the path contains an
/// installed-package marker.
pub fn is_ignored(path: &str) -> bool {
    path.split('/').any(|segment| IGNORED_SEGMENTS.contains(&segment))
        || IGNORED_SUBSTRINGS.iter().any(|s| path.contains(s))
}

/// Select and partition the files of a run. Never fails; an empty schedule is valid.
pub fn schedule_files(
    paths: &[String],
    contents: &HashMap<String, String>,
    filters: Option<&FileFilters>,
) -> FileSchedule {
    let mut schedule = FileSchedule::default();
    for path in paths {
        if is_ignored(path) || !contents.contains_key(path) {
            continue;
        }
        if let Some(filters) = filters
            && !filters.allows(path)
        {
            continue;
        }
        if LanguageKind::from_path(path).is_some() {
            schedule.source.push(path.clone());
        } else if is_config_file(path) {
            schedule.config.push(path.clone());
        }
    }
    schedule
}

/// Fixed-size batches in input order. A zero size is treated as one.
pub fn batches(files: &[String], size: usize) -> impl Iterator<Item = &[String]> {
    files.chunks(size.max(1))
}
