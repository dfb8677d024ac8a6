use std::collections::HashMap;

use tree_sitter::{Language, Parser, Tree};

/// A bundled tree-sitter grammar.
///
/// `.ts` and `.tsx` MUST map to different grammars: the TypeScript grammar
/// cannot parse JSX, and the TSX grammar breaks angle-bracket type assertions
/// (`<T>expr`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grammar {
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Rust,
    Go,
}

impl Grammar {
    pub const ALL: [Grammar; 6] = [
        Grammar::Python,
        Grammar::JavaScript,
        Grammar::TypeScript,
        Grammar::Tsx,
        Grammar::Rust,
        Grammar::Go,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Grammar::Python => "python",
            Grammar::JavaScript => "javascript",
            Grammar::TypeScript => "typescript",
            Grammar::Tsx => "tsx",
            Grammar::Rust => "rust",
            Grammar::Go => "go",
        }
    }

    fn load(&self) -> Language {
        match self {
            Grammar::Python => tree_sitter_python::LANGUAGE.into(),
            Grammar::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Grammar::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Grammar::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Grammar::Rust => tree_sitter_rust::LANGUAGE.into(),
            Grammar::Go => tree_sitter_go::LANGUAGE.into(),
        }
    }
}

/// Return the grammar for a file extension (no dot, any case), or `None` when
/// the extension has no bundled grammar.
pub fn grammar_for_extension(ext: &str) -> Option<Grammar> {
    match ext.to_ascii_lowercase().as_str() {
        "py" | "pyi" => Some(Grammar::Python),
        "js" | "jsx" | "mjs" | "cjs" => Some(Grammar::JavaScript),
        "ts" | "mts" | "cts" => Some(Grammar::TypeScript),
        "tsx" => Some(Grammar::Tsx),
        "rs" => Some(Grammar::Rust),
        "go" => Some(Grammar::Go),
        _ => None,
    }
}

/// Grammar for a path, judged by its extension.
pub fn grammar_for_path(path: &str) -> Option<Grammar> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = file_name.rsplit_once('.')?;
    grammar_for_extension(ext)
}

enum Slot {
    Ready { language: Language, parser: Parser },
    Unavailable,
}

/// Loads each grammar at most once and keeps one configured [`Parser`] per grammar.
///
/// A grammar that fails to load is remembered as unavailable, so callers fall
/// back to the regex extractor without retrying on every file.
#[derive(Default)]
pub struct GrammarRegistry {
    slots: HashMap<Grammar, Slot>,
}

impl std::fmt::Debug for GrammarRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let loaded: Vec<_> = self
            .slots
            .iter()
            .map(|(g, s)| (g.name(), matches!(s, Slot::Ready { .. })))
            .collect();
        f.debug_struct("GrammarRegistry").field("loaded", &loaded).finish()
    }
}

impl GrammarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, grammar: Grammar) -> &mut Slot {
        self.slots.entry(grammar).or_insert_with(|| {
            let language = grammar.load();
            let mut parser = Parser::new();
            match parser.set_language(&language) {
                Ok(()) => {
                    tracing::debug!("loaded {} grammar", grammar.name());
                    Slot::Ready { language, parser }
                }
                Err(err) => {
                    tracing::warn!(
                        "{} grammar unavailable ({err}); falling back to regex extraction",
                        grammar.name()
                    );
                    Slot::Unavailable
                }
            }
        })
    }

    /// The loaded language, or `None` if the grammar failed to load.
    pub fn language(&mut self, grammar: Grammar) -> Option<Language> {
        match self.slot(grammar) {
            Slot::Ready { language, .. } => Some(language.clone()),
            Slot::Unavailable => None,
        }
    }

    /// Parse `content` with the cached parser for `grammar`.
    ///
    /// Returns `None` when the grammar is unavailable or tree-sitter gives up.
    pub fn parse(&mut self, grammar: Grammar, content: &str) -> Option<Tree> {
        match self.slot(grammar) {
            Slot::Ready { parser, .. } => parser.parse(content, None),
            Slot::Unavailable => None,
        }
    }
}

/// Parse with a throw-away parser. Used by rayon workers, which cannot share
/// the registry's parsers.
pub fn parse_detached(language: &Language, content: &str) -> Option<Tree> {
    let mut parser = Parser::new();
    parser.set_language(language).ok()?;
    parser.parse(content, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_mapping_separates_ts_and_tsx() {
        assert_eq!(grammar_for_extension("ts"), Some(Grammar::TypeScript));
        assert_eq!(grammar_for_extension("tsx"), Some(Grammar::Tsx));
        assert_eq!(grammar_for_extension("jsx"), Some(Grammar::JavaScript));
        assert_eq!(grammar_for_extension("PY"), Some(Grammar::Python));
        assert_eq!(grammar_for_extension("java"), None);
        assert_eq!(grammar_for_path("src/lib.rs"), Some(Grammar::Rust));
        assert_eq!(grammar_for_path("Makefile"), None);
    }

    #[test]
    fn test_every_bundled_grammar_loads_and_parses() {
        let mut registry = GrammarRegistry::new();
        for grammar in Grammar::ALL {
            assert!(
                registry.language(grammar).is_some(),
                "{} grammar should load",
                grammar.name()
            );
        }
        let tree = registry.parse(Grammar::Python, "def f():\n    pass\n").unwrap();
        assert_eq!(tree.root_node().kind(), "module");
        let tree = registry.parse(Grammar::Go, "package main\nfunc main() {}\n").unwrap();
        assert_eq!(tree.root_node().kind(), "source_file");
    }

    #[test]
    fn test_parse_detached_matches_registry() {
        let mut registry = GrammarRegistry::new();
        let language = registry.language(Grammar::Rust).unwrap();
        let tree = parse_detached(&language, "fn main() {}").unwrap();
        assert_eq!(tree.root_node().kind(), "source_file");
        assert!(!tree.root_node().has_error());
    }
}
