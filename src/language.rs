use serde::{Deserialize, Serialize};

/// A programming language recognised by repo-graph.
///
/// Uses a plain enum (not trait objects). Cheap to copy and pattern-matched at
/// dispatch boundaries. Languages without a bundled tree-sitter grammar are
/// still indexed, through the regex extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LanguageKind {
    Python,
    JavaScript,
    TypeScript,
    Rust,
    Go,
    Java,
    CSharp,
    Cpp,
    C,
    Ruby,
    Php,
    Kotlin,
    Swift,
}

/// Regex-extractor families: languages that share enough surface syntax to
/// share one set of line patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageFamily {
    /// `def`/`class` with indentation-scoped bodies.
    PythonLike,
    /// Brace-delimited bodies (`function`, `class`, `fn`, `func`, ...).
    CLike,
    /// `def ... end` blocks.
    RubyLike,
}

impl LanguageKind {
    /// Map a file extension (without the dot, any case) to a language.
    pub fn from_extension(ext: &str) -> Option<LanguageKind> {
        let kind = match ext.to_ascii_lowercase().as_str() {
            "py" | "pyi" => LanguageKind::Python,
            "js" | "jsx" | "mjs" | "cjs" => LanguageKind::JavaScript,
            "ts" | "tsx" | "mts" | "cts" => LanguageKind::TypeScript,
            "rs" => LanguageKind::Rust,
            "go" => LanguageKind::Go,
            "java" => LanguageKind::Java,
            "cs" => LanguageKind::CSharp,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => LanguageKind::Cpp,
            "c" | "h" => LanguageKind::C,
            "rb" => LanguageKind::Ruby,
            "php" => LanguageKind::Php,
            "kt" | "kts" => LanguageKind::Kotlin,
            "swift" => LanguageKind::Swift,
            _ => return None,
        };
        Some(kind)
    }

    /// Language of a path, judged by its extension.
    pub fn from_path(path: &str) -> Option<LanguageKind> {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let (_, ext) = file_name.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    /// Value stored in the `language` property of File and definition nodes.
    pub fn display_name(&self) -> &'static str {
        match self {
            LanguageKind::Python => "python",
            LanguageKind::JavaScript => "javascript",
            LanguageKind::TypeScript => "typescript",
            LanguageKind::Rust => "rust",
            LanguageKind::Go => "go",
            LanguageKind::Java => "java",
            LanguageKind::CSharp => "csharp",
            LanguageKind::Cpp => "cpp",
            LanguageKind::C => "c",
            LanguageKind::Ruby => "ruby",
            LanguageKind::Php => "php",
            LanguageKind::Kotlin => "kotlin",
            LanguageKind::Swift => "swift",
        }
    }

    /// Parse a CLI flag string into a `LanguageKind`. Case-insensitive; accepts
    /// either the display name or an extension.
    pub fn from_str_loose(s: &str) -> Option<LanguageKind> {
        let lower = s.to_lowercase();
        match lower.as_str() {
            "python" => Some(LanguageKind::Python),
            "javascript" => Some(LanguageKind::JavaScript),
            "typescript" => Some(LanguageKind::TypeScript),
            "rust" => Some(LanguageKind::Rust),
            "go" | "golang" => Some(LanguageKind::Go),
            "csharp" | "c#" => Some(LanguageKind::CSharp),
            "c++" => Some(LanguageKind::Cpp),
            other => Self::from_extension(other),
        }
    }

    /// Regex pattern family used when no syntax tree is available.
    pub fn family(&self) -> LanguageFamily {
        match self {
            LanguageKind::Python => LanguageFamily::PythonLike,
            LanguageKind::Ruby => LanguageFamily::RubyLike,
            _ => LanguageFamily::CLike,
        }
    }
}

/// Config/build files indexed as File nodes (`fileType: "config"`) without extraction.
pub const CONFIG_FILES: &[&str] = &[
    "package.json",
    "tsconfig.json",
    "Cargo.toml",
    "go.mod",
    "pyproject.toml",
    "requirements.txt",
    "setup.cfg",
    "Pipfile",
    "Gemfile",
    "pom.xml",
    "build.gradle",
    "composer.json",
    "Makefile",
    "Dockerfile",
];

/// Returns true if the final path segment is on the config allow-list.
pub fn is_config_file(path: &str) -> bool {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    CONFIG_FILES.contains(&file_name)
}
