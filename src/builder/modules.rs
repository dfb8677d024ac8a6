//! Module specifier → indexed file resolution.
//!
//! Each language gets the probing rules its import syntax implies. When those
//! fail the specifier's segments are matched against the module paths of the
//! indexed files, closest to the importing file first.

use std::collections::BTreeSet;

use crate::language::LanguageKind;
use crate::registry::{calculate_import_distance, module_path};

/// Extensions probed for extensionless JS/TS specifiers, in priority order.
const ECMASCRIPT_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "mts", "cts"];

/// Trailing module-path segments that name their directory rather than a module.
const INDEX_STEMS: &[&str] = &["mod", "__init__", "index", "lib", "main"];

/// Whether `spec` points inside the project by construction (relative path,
/// relative Python module, `crate::`/`self::`/`super::` path).
pub fn is_relative(language: LanguageKind, spec: &str) -> bool {
    match language {
        LanguageKind::Rust => {
            spec == "crate"
                || spec == "self"
                || spec == "super"
                || spec.starts_with("crate::")
                || spec.starts_with("self::")
                || spec.starts_with("super::")
        }
        _ => spec.starts_with('.'),
    }
}

/// Separator used to append a member name to a module specifier.
pub fn join_member(language: LanguageKind, module: &str, member: &str) -> String {
    match language {
        LanguageKind::Python => {
            if module.ends_with('.') {
                format!("{module}{member}")
            } else {
                format!("{module}.{member}")
            }
        }
        LanguageKind::Rust => format!("{module}::{member}"),
        _ => format!("{}/{member}", module.trim_end_matches('/')),
    }
}

/// Resolve `spec`, imported from `caller`, to indexed files.
///
/// Returns every file of the package for Go (a package spans a directory)
/// and at most one file for other languages. Empty when nothing matches.
pub fn resolve_module(
    language: LanguageKind,
    caller: &str,
    spec: &str,
    files: &BTreeSet<String>,
) -> Vec<String> {
    let found = match language {
        LanguageKind::Python => python(caller, spec, files),
        LanguageKind::JavaScript | LanguageKind::TypeScript => ecmascript(caller, spec, files),
        LanguageKind::Rust => rust(caller, spec, files),
        LanguageKind::Go => return go_package(spec, files),
        _ => by_segments(caller, spec, files),
    };
    found.into_iter().collect()
}

fn python(caller: &str, spec: &str, files: &BTreeSet<String>) -> Option<String> {
    if spec.starts_with('.') {
        let dots = spec.chars().take_while(|&c| c == '.').count();
        let mut base = parent_dir(caller).to_owned();
        for _ in 1..dots {
            base = parent_dir(&base).to_owned();
        }
        let rel = spec[dots..].replace('.', "/");
        return python_probe(&base, &rel, files);
    }
    let rel = spec.replace('.', "/");
    python_probe(parent_dir(caller), &rel, files)
        .or_else(|| python_probe("", &rel, files))
        .or_else(|| by_segments(caller, spec, files))
}

fn python_probe(base: &str, rel: &str, files: &BTreeSet<String>) -> Option<String> {
    let candidates = if rel.is_empty() {
        vec![join_path(base, "__init__.py")]
    } else {
        vec![
            join_path(base, &format!("{rel}.py")),
            join_path(base, &format!("{rel}/__init__.py")),
        ]
    };
    candidates.into_iter().find(|c| files.contains(c))
}

fn ecmascript(caller: &str, spec: &str, files: &BTreeSet<String>) -> Option<String> {
    if !spec.starts_with('.') {
        // Path aliases (`@/utils`, `~/lib/x`); bare package names stay external.
        let stripped = spec
            .strip_prefix("@/")
            .or_else(|| spec.strip_prefix("~/"))
            .unwrap_or(spec);
        if stripped.starts_with('@') || !stripped.contains('/') {
            return None;
        }
        return by_segments(caller, stripped, files);
    }

    let base = join_path(parent_dir(caller), spec);
    if files.contains(&base) {
        return Some(base);
    }
    // `./x.js` written against a `./x.ts` source.
    if let Some(stem) = base
        .strip_suffix(".js")
        .or_else(|| base.strip_suffix(".mjs"))
        .or_else(|| base.strip_suffix(".cjs"))
    {
        for ext in ["ts", "tsx", "mts", "cts"] {
            let candidate = format!("{stem}.{ext}");
            if files.contains(&candidate) {
                return Some(candidate);
            }
        }
    }
    ECMASCRIPT_EXTENSIONS
        .iter()
        .map(|ext| format!("{base}.{ext}"))
        .chain(
            ECMASCRIPT_EXTENSIONS
                .iter()
                .map(|ext| format!("{base}/index.{ext}")),
        )
        .find(|c| files.contains(c))
}

fn rust(caller: &str, spec: &str, files: &BTreeSet<String>) -> Option<String> {
    let mut segments: Vec<&str> = spec.split("::").filter(|s| !s.is_empty()).collect();
    let base = match segments.first().copied() {
        Some("crate") => {
            segments.remove(0);
            crate_root(caller)
        }
        Some("self") => {
            segments.remove(0);
            rust_module_dir(caller)
        }
        Some("super") => {
            let mut dir = rust_module_dir(caller);
            while segments.first() == Some(&"super") {
                segments.remove(0);
                dir = parent_dir(&dir).to_owned();
            }
            dir
        }
        _ => return by_segments(caller, spec, files),
    };

    if segments.is_empty() {
        return ["lib.rs", "main.rs", "mod.rs"]
            .iter()
            .map(|f| join_path(&base, f))
            .find(|c| files.contains(c));
    }
    // Longest module prefix first: `crate::a::b::Item` may live in a/b.rs or a.rs.
    for take in (1..=segments.len()).rev() {
        let rel = segments[..take].join("/");
        for candidate in [
            join_path(&base, &format!("{rel}.rs")),
            join_path(&base, &format!("{rel}/mod.rs")),
        ] {
            if files.contains(&candidate) {
                return Some(candidate);
            }
        }
    }
    None
}

/// Directory holding the crate root of `caller`: the nearest enclosing `src`.
fn crate_root(caller: &str) -> String {
    let mut dir = parent_dir(caller);
    loop {
        if dir == "src" || dir.ends_with("/src") {
            return dir.to_owned();
        }
        if dir.is_empty() {
            return String::new();
        }
        dir = parent_dir(dir);
    }
}

/// Directory that holds the children of `caller`'s module.
fn rust_module_dir(caller: &str) -> String {
    let dir = parent_dir(caller);
    let file = caller.rsplit('/').next().unwrap_or(caller);
    match file.strip_suffix(".rs") {
        Some("mod" | "lib" | "main") | None => dir.to_owned(),
        Some(stem) => join_path(dir, stem),
    }
}

fn go_package(spec: &str, files: &BTreeSet<String>) -> Vec<String> {
    let segments: Vec<&str> = spec.split('/').filter(|s| !s.is_empty()).collect();
    for take in (1..=segments.len()).rev() {
        let suffix = segments[segments.len() - take..].join("/");
        let package: Vec<String> = files
            .iter()
            .filter(|f| f.ends_with(".go"))
            .filter(|f| {
                let dir = parent_dir(f);
                dir == suffix || dir.ends_with(&format!("/{suffix}"))
            })
            .cloned()
            .collect();
        if !package.is_empty() {
            return package;
        }
    }
    Vec::new()
}

/// Match the specifier's segments against indexed module paths, retrying
/// without the last segment (an imported item rather than a module).
fn by_segments(caller: &str, spec: &str, files: &BTreeSet<String>) -> Option<String> {
    let segments: Vec<&str> = spec
        .split(['.', '/', ':'])
        .filter(|s| !s.is_empty() && !matches!(*s, "crate" | "self" | "super"))
        .collect();
    for take in [segments.len(), segments.len().saturating_sub(1)] {
        if take == 0 {
            continue;
        }
        let target = segments[..take].join(".");
        let dotted = format!(".{target}");
        let mut matches: Vec<&String> = files
            .iter()
            .filter(|f| {
                let module = directory_module(f);
                module == target || module.ends_with(&dotted)
            })
            .collect();
        matches.sort_by_key(|f| calculate_import_distance(caller, f));
        if let Some(found) = matches.first() {
            return Some((*found).clone());
        }
    }
    None
}

/// Module path with a trailing index stem (`mod`, `__init__`, ...) dropped.
fn directory_module(file: &str) -> String {
    let module = module_path(file);
    match module.rsplit_once('.') {
        Some((dir, stem)) if INDEX_STEMS.contains(&stem) => dir.to_owned(),
        _ => module,
    }
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Join `rel` onto `base`, folding `.` and `..` segments.
fn join_path(base: &str, rel: &str) -> String {
    let mut parts: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    for segment in rel.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_python_sibling_module_wins() {
        let set = files(&["a/x.py", "x.py", "a/main.py"]);
        assert_eq!(
            resolve_module(LanguageKind::Python, "a/main.py", "x", &set),
            vec!["a/x.py".to_owned()],
            "the importing file's directory is probed first"
        );
        assert_eq!(
            resolve_module(LanguageKind::Python, "b/main.py", "x", &set),
            vec!["x.py".to_owned()]
        );
    }

    #[test]
    fn test_python_relative_and_packages() {
        let set = files(&["pkg/__init__.py", "pkg/util.py", "pkg/sub/mod.py", "src/app/models.py"]);
        assert_eq!(
            resolve_module(LanguageKind::Python, "pkg/sub/mod.py", "..util", &set),
            vec!["pkg/util.py".to_owned()]
        );
        assert_eq!(
            resolve_module(LanguageKind::Python, "pkg/util.py", ".", &set),
            vec!["pkg/__init__.py".to_owned()]
        );
        assert_eq!(
            resolve_module(LanguageKind::Python, "main.py", "pkg", &set),
            vec!["pkg/__init__.py".to_owned()]
        );
        assert_eq!(
            resolve_module(LanguageKind::Python, "main.py", "app.models", &set),
            vec!["src/app/models.py".to_owned()],
            "source layouts resolve through segment matching"
        );
        assert!(resolve_module(LanguageKind::Python, "main.py", "numpy", &set).is_empty());
    }

    #[test]
    fn test_ecmascript_probing() {
        let set = files(&["src/util.ts", "src/components/index.tsx", "src/app.ts", "src/esm.ts"]);
        assert_eq!(
            resolve_module(LanguageKind::TypeScript, "src/app.ts", "./util", &set),
            vec!["src/util.ts".to_owned()]
        );
        assert_eq!(
            resolve_module(LanguageKind::TypeScript, "src/app.ts", "./components", &set),
            vec!["src/components/index.tsx".to_owned()]
        );
        assert_eq!(
            resolve_module(LanguageKind::TypeScript, "src/components/index.tsx", "../esm.js", &set),
            vec!["src/esm.ts".to_owned()]
        );
        assert!(resolve_module(LanguageKind::TypeScript, "src/app.ts", "react", &set).is_empty());
    }

    #[test]
    fn test_rust_paths() {
        let set = files(&["src/lib.rs", "src/graph/mod.rs", "src/graph/node.rs", "src/store.rs"]);
        assert_eq!(
            resolve_module(LanguageKind::Rust, "src/lib.rs", "crate::graph::node", &set),
            vec!["src/graph/node.rs".to_owned()]
        );
        assert_eq!(
            resolve_module(LanguageKind::Rust, "src/lib.rs", "crate::store::Store", &set),
            vec!["src/store.rs".to_owned()],
            "a trailing item name falls back to its module"
        );
        assert_eq!(
            resolve_module(LanguageKind::Rust, "src/graph/node.rs", "super", &set),
            vec!["src/graph/mod.rs".to_owned()]
        );
        assert_eq!(
            resolve_module(LanguageKind::Rust, "src/graph/mod.rs", "self::node", &set),
            vec!["src/graph/node.rs".to_owned()]
        );
        assert!(resolve_module(LanguageKind::Rust, "src/lib.rs", "serde", &set).is_empty());
    }

    #[test]
    fn test_go_package_spans_directory() {
        let set = files(&["pkg/util/a.go", "pkg/util/b.go", "cmd/main.go"]);
        assert_eq!(
            resolve_module(LanguageKind::Go, "cmd/main.go", "github.com/acme/app/pkg/util", &set),
            vec!["pkg/util/a.go".to_owned(), "pkg/util/b.go".to_owned()]
        );
        assert!(resolve_module(LanguageKind::Go, "cmd/main.go", "fmt", &set).is_empty());
    }

    #[test]
    fn test_relative_detection() {
        assert!(is_relative(LanguageKind::Python, "..util"));
        assert!(is_relative(LanguageKind::TypeScript, "./x"));
        assert!(is_relative(LanguageKind::Rust, "crate::a"));
        assert!(!is_relative(LanguageKind::Rust, "serde"));
        assert!(!is_relative(LanguageKind::JavaScript, "react"));
    }

    #[test]
    fn test_join_member() {
        assert_eq!(join_member(LanguageKind::Python, "pkg", "mod"), "pkg.mod");
        assert_eq!(join_member(LanguageKind::Python, "..", "mod"), "..mod");
        assert_eq!(join_member(LanguageKind::Rust, "crate::a", "B"), "crate::a::B");
        assert_eq!(join_member(LanguageKind::TypeScript, "./foo", "Foo"), "./foo/Foo");
    }
}
