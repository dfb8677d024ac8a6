//! Line-oriented regex extraction for files without a syntax tree.
//!
//! Fidelity is deliberately lower than the tree-sitter strategies: no base
//! types, decorator names only, scopes tracked by indentation (python-like,
//! ruby-like) or brace depth (c-like).

use std::sync::OnceLock;

use regex::Regex;

use crate::graph::node::NodeKind;
use crate::language::LanguageFamily;

use super::{CallSite, Definition, ExtractorKind, FileExtraction, ImportInfo, ImportKind, ValueKind};

// ---------------------------------------------------------------------------
// Patterns (compiled once)
// ---------------------------------------------------------------------------

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        fn $name() -> &'static Regex {
            static CELL: OnceLock<Regex> = OnceLock::new();
            CELL.get_or_init(|| Regex::new($re).expect("invalid fallback pattern"))
        }
    };
}

pattern!(py_def, r"^(\s*)(?:async\s+)?def\s+([A-Za-z_]\w*)");
pattern!(py_class, r"^(\s*)class\s+([A-Za-z_]\w*)");
pattern!(py_decorator, r"^\s*@([A-Za-z_][\w.]*)");
pattern!(py_assign, r"^([A-Za-z_]\w*)\s*(?::[^=]+)?=\s*([^=].*)$");
pattern!(py_import, r"^\s*import\s+([\w.]+)(?:\s+as\s+(\w+))?");
pattern!(py_from, r"^\s*from\s+([\w.]+)\s+import\s+(.+)$");

pattern!(rb_def, r"^(\s*)def\s+(?:self\.)?([A-Za-z_]\w*[?!]?)");
pattern!(rb_class, r"^(\s*)(?:class|module)\s+([A-Z]\w*)");
pattern!(rb_require, r#"^\s*require(?:_relative)?\s*\(?\s*['"]([^'"]+)['"]"#);

pattern!(
    c_type,
    r"^\s*(?:(?:public|private|protected|internal|abstract|final|static|export|default|sealed|open|data|partial|pub(?:\([^)]*\))?)\s+)*(class|struct|interface|enum|trait|protocol|object|union)\s+([A-Za-z_]\w*)"
);
pattern!(
    c_keyword_fn,
    r"^\s*(?:(?:public|private|protected|internal|static|async|export|default|override|open|inline|suspend|pub(?:\([^)]*\))?|unsafe|extern|const)\s+)*(?:function\*?|fn|func|fun|def)\s+(?:\(\s*\w+\s+\*?([A-Za-z_]\w*)\s*\)\s*)?([A-Za-z_]\w*)\s*[(<]"
);
pattern!(
    c_signature_fn,
    r"^\s*(?:[\w:<>\[\],*&]+\s+)+\*?&?([A-Za-z_]\w*)\s*\([^;]*\)\s*(?:const\s*)?(?:throws\s+[\w., ]+)?\s*\{?\s*$"
);
pattern!(c_annotation, r"^\s*@([A-Za-z_][\w.]*)");
pattern!(
    c_variable,
    r"^(?:export\s+)?(?:const|let|var|val|static)\s+(?:mut\s+)?([A-Za-z_]\w*)\s*(?::[^=]+)?=\s*(.*)$"
);
pattern!(
    c_import,
    r#"^\s*(?:import\s+(?:static\s+)?([\w.]+)\s*;?\s*$|#include\s+[<"]([^>"]+)[>"]|using\s+([\w.]+)\s*;|use\s+([\w\\]+)\s*;|import\s+.*?from\s+['"]([^'"]+)['"])"#
);

pattern!(call, r"([A-Za-z_][\w.]*)\s*\(");

const CALL_KEYWORDS: &[&str] = &[
    "if", "elif", "else", "for", "while", "switch", "catch", "return", "and", "or", "not", "in",
    "with", "except", "assert", "del", "lambda", "yield", "sizeof", "typeof", "function", "fn",
    "func", "fun", "def", "class", "new", "await", "throw", "case", "when", "unless", "until",
];

const SIGNATURE_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "else", "new", "throw", "case", "do",
];

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub(crate) fn extract(content: &str, path: &str, family: LanguageFamily) -> FileExtraction {
    let mut out = FileExtraction::new(ExtractorKind::Regex);
    match family {
        LanguageFamily::PythonLike => indented(content, path, false, &mut out),
        LanguageFamily::RubyLike => indented(content, path, true, &mut out),
        LanguageFamily::CLike => braced(content, path, &mut out),
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Type,
    Callable,
}

#[derive(Debug)]
struct Scope {
    /// Indentation width or brace depth at which the scope was opened.
    level: usize,
    kind: ScopeKind,
    name: String,
    def_index: usize,
}

fn innermost(stack: &[Scope], kind: ScopeKind) -> Option<&Scope> {
    stack.iter().rev().find(|s| s.kind == kind)
}

fn literal_kind(value: &str) -> ValueKind {
    let v = value.trim();
    match v.chars().next() {
        Some('"' | '\'' | '`') => ValueKind::String,
        Some(c) if c.is_ascii_digit() || c == '-' => ValueKind::Number,
        Some('[' | '(') => ValueKind::Array,
        Some('{') => ValueKind::Object,
        _ if matches!(v, "True" | "False" | "true" | "false") => ValueKind::Boolean,
        _ if v.starts_with("lambda") || v.starts_with("function") || v.contains("=>") => {
            ValueKind::Function
        }
        _ => ValueKind::Unknown,
    }
}

fn push_calls(line: &str, line_no: usize, enclosing: Option<usize>, out: &mut FileExtraction) {
    for caps in call().captures_iter(line) {
        let full = &caps[1];
        let (receiver, callee) = match full.rsplit_once('.') {
            Some((r, c)) => (Some(r), c),
            None => (None, full),
        };
        if callee.is_empty() || CALL_KEYWORDS.contains(&callee) {
            continue;
        }
        let mut site = match receiver {
            Some(r) if !r.is_empty() => CallSite::attribute(callee, r, line_no),
            _ => CallSite::simple(callee, line_no),
        };
        site.enclosing = enclosing;
        out.calls.push(site);
    }
}

// ---------------------------------------------------------------------------
// Indentation-scoped families
// ---------------------------------------------------------------------------

fn indented(content: &str, path: &str, ruby: bool, out: &mut FileExtraction) {
    let mut stack: Vec<Scope> = Vec::new();
    let mut pending_decorators: Vec<String> = Vec::new();
    let (def_re, class_re) = if ruby {
        (rb_def(), rb_class())
    } else {
        (py_def(), py_class())
    };

    for (i, line) in content.lines().enumerate() {
        let line_no = i + 1;
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let indent = line.len() - trimmed.len();
        while stack.last().is_some_and(|s| s.level >= indent) {
            stack.pop();
        }

        if !ruby && let Some(caps) = py_decorator().captures(line) {
            pending_decorators.push(caps[1].to_owned());
            continue;
        }

        if let Some(caps) = class_re.captures(line) {
            let mut def = Definition::new(&caps[2], NodeKind::Class, line_no);
            def.parent_class = innermost(&stack, ScopeKind::Type).map(|s| s.name.clone());
            def.decorators = std::mem::take(&mut pending_decorators);
            out.definitions.push(def);
            stack.push(Scope {
                level: indent,
                kind: ScopeKind::Type,
                name: caps[2].to_owned(),
                def_index: out.definitions.len() - 1,
            });
            continue;
        }

        if let Some(caps) = def_re.captures(line) {
            let owner = stack
                .last()
                .filter(|s| s.kind == ScopeKind::Type)
                .map(|s| s.name.clone());
            let kind = if owner.is_some() {
                NodeKind::Method
            } else {
                NodeKind::Function
            };
            let mut def = Definition::new(&caps[2], kind, line_no);
            def.parent_class = owner;
            def.decorators = std::mem::take(&mut pending_decorators);
            out.definitions.push(def);
            stack.push(Scope {
                level: indent,
                kind: ScopeKind::Callable,
                name: caps[2].to_owned(),
                def_index: out.definitions.len() - 1,
            });
            continue;
        }
        pending_decorators.clear();

        if ruby {
            if let Some(caps) = rb_require().captures(line) {
                let module = &caps[1];
                let name = module.rsplit('/').next().unwrap_or(module);
                out.imports
                    .push(ImportInfo::new(path, name, module, ImportKind::Require, line_no));
                continue;
            }
        } else if let Some(caps) = py_import().captures(line) {
            let alias = caps.get(2).map(|m| m.as_str().to_owned());
            out.imports.push(
                ImportInfo::new(path, &caps[1], &caps[1], ImportKind::Module, line_no)
                    .with_alias(alias),
            );
            continue;
        } else if let Some(caps) = py_from().captures(line) {
            python_from_names(&caps[1], &caps[2], path, line_no, &mut out.imports);
            continue;
        } else if indent == 0
            && let Some(caps) = py_assign().captures(line)
        {
            let kind = literal_kind(&caps[2]);
            let node_kind = if kind == ValueKind::Function {
                NodeKind::Function
            } else {
                NodeKind::Variable
            };
            let mut def = Definition::new(&caps[1], node_kind, line_no);
            def.value_kind = Some(kind);
            out.definitions.push(def);
            continue;
        }

        let enclosing = innermost(&stack, ScopeKind::Callable).map(|s| s.def_index);
        push_calls(trimmed, line_no, enclosing, out);
    }
}

fn python_from_names(module: &str, names: &str, path: &str, line: usize, out: &mut Vec<ImportInfo>) {
    let names = names.trim().trim_start_matches('(').trim_end_matches(')');
    if names.trim() == "*" {
        out.push(ImportInfo::new(path, "*", module, ImportKind::Wildcard, line));
        return;
    }
    for part in names.split(',') {
        let mut words = part.split_whitespace();
        let Some(name) = words.next() else {
            continue;
        };
        let alias = match (words.next(), words.next()) {
            (Some("as"), Some(a)) => Some(a.to_owned()),
            _ => None,
        };
        out.push(ImportInfo::new(path, name, module, ImportKind::From, line).with_alias(alias));
    }
}

// ---------------------------------------------------------------------------
// Brace-scoped family
// ---------------------------------------------------------------------------

fn braced(content: &str, path: &str, out: &mut FileExtraction) {
    let mut stack: Vec<Scope> = Vec::new();
    let mut pending_decorators: Vec<String> = Vec::new();
    let mut depth: usize = 0;

    for (i, raw) in content.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.split("//").next().unwrap_or(raw);
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('*') || trimmed.starts_with("/*") {
            continue;
        }
        let opens_body = !trimmed.ends_with(';');
        let mut handled = false;

        if let Some(caps) = c_annotation().captures(line)
            && !trimmed.starts_with("@interface")
        {
            pending_decorators.push(caps[1].to_owned());
            handled = true;
        } else if let Some(caps) = c_type().captures(line) {
            let kind = match &caps[1] {
                "interface" | "trait" | "protocol" => NodeKind::Interface,
                "enum" => NodeKind::Enum,
                _ => NodeKind::Class,
            };
            let mut def = Definition::new(&caps[2], kind, line_no);
            def.parent_class = innermost(&stack, ScopeKind::Type).map(|s| s.name.clone());
            def.decorators = std::mem::take(&mut pending_decorators);
            out.definitions.push(def);
            if opens_body {
                stack.push(Scope {
                    level: depth,
                    kind: ScopeKind::Type,
                    name: caps[2].to_owned(),
                    def_index: out.definitions.len() - 1,
                });
            }
            handled = true;
        } else if let Some((receiver, name)) = function_name(line) {
            let owner = receiver.or_else(|| {
                stack
                    .last()
                    .filter(|s| s.kind == ScopeKind::Type)
                    .map(|s| s.name.clone())
            });
            let kind = if owner.is_some() {
                NodeKind::Method
            } else {
                NodeKind::Function
            };
            let mut def = Definition::new(&name, kind, line_no);
            def.parent_class = owner;
            def.decorators = std::mem::take(&mut pending_decorators);
            out.definitions.push(def);
            if opens_body {
                stack.push(Scope {
                    level: depth,
                    kind: ScopeKind::Callable,
                    name,
                    def_index: out.definitions.len() - 1,
                });
            }
            handled = true;
        } else if let Some(caps) = c_import().captures(line) {
            let module = (1..=5)
                .find_map(|g| caps.get(g))
                .map(|m| m.as_str())
                .unwrap_or("");
            if !module.is_empty() {
                let name = module
                    .rsplit(['.', '/', '\\'])
                    .next()
                    .unwrap_or(module);
                out.imports
                    .push(ImportInfo::new(path, name, module, ImportKind::Module, line_no));
            }
            handled = true;
        } else if depth == 0
            && let Some(caps) = c_variable().captures(line)
        {
            let kind = literal_kind(&caps[2]);
            let node_kind = if kind == ValueKind::Function {
                NodeKind::Function
            } else {
                NodeKind::Variable
            };
            let mut def = Definition::new(&caps[1], node_kind, line_no);
            def.value_kind = Some(kind);
            out.definitions.push(def);
            if node_kind == NodeKind::Function && opens_body {
                stack.push(Scope {
                    level: depth,
                    kind: ScopeKind::Callable,
                    name: caps[1].to_owned(),
                    def_index: out.definitions.len() - 1,
                });
            }
            handled = true;
        }

        if !handled {
            pending_decorators.clear();
            let enclosing = innermost(&stack, ScopeKind::Callable).map(|s| s.def_index);
            push_calls(trimmed, line_no, enclosing, out);
        }

        for ch in line.chars() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth = depth.saturating_sub(1);
                    while stack.last().is_some_and(|s| s.level >= depth) {
                        stack.pop();
                    }
                }
                _ => {}
            }
        }
    }
}

/// `(receiver type, name)` of a function declaration line.
fn function_name(line: &str) -> Option<(Option<String>, String)> {
    if let Some(caps) = c_keyword_fn().captures(line) {
        let receiver = caps.get(1).map(|m| m.as_str().to_owned());
        return Some((receiver, caps[2].to_owned()));
    }
    let caps = c_signature_fn().captures(line)?;
    let name = &caps[1];
    let first_word = line.split_whitespace().next().unwrap_or("");
    if SIGNATURE_KEYWORDS.contains(&name) || SIGNATURE_KEYWORDS.contains(&first_word) {
        return None;
    }
    Some((None, name.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(out: &FileExtraction) -> Vec<(&str, NodeKind, Option<&str>)> {
        out.definitions
            .iter()
            .map(|d| (d.name.as_str(), d.kind, d.parent_class.as_deref()))
            .collect()
    }

    #[test]
    fn test_python_indentation_methods() {
        let src = "\
import os
from x import helper, other as o

LIMIT = 10

class Base:
    @property
    def save(self):
        helper()

def run():
    print('done')
";
        let out = extract(src, "a.py", LanguageFamily::PythonLike);
        assert_eq!(out.extractor, ExtractorKind::Regex);
        assert_eq!(
            names(&out),
            vec![
                ("LIMIT", NodeKind::Variable, None),
                ("Base", NodeKind::Class, None),
                ("save", NodeKind::Method, Some("Base")),
                ("run", NodeKind::Function, None),
            ]
        );
        assert_eq!(out.definitions[2].decorators, vec!["property".to_owned()]);
        assert!(out.definitions[1].base_types.is_empty());
        assert_eq!(out.imports.len(), 3);
        assert_eq!(out.imports[2].local_name(), "o");
        let call = out.calls.iter().find(|c| c.callee == "helper").unwrap();
        assert_eq!(call.enclosing, Some(2));
        let print = out.calls.iter().find(|c| c.callee == "print");
        assert_eq!(print.map(|c| c.enclosing), Some(Some(3)), "builtin calls are kept");
    }

    #[test]
    fn test_c_like_braces_track_methods() {
        let src = "\
import java.util.List;

@Service
public class OrderService {
    public void place(Order order) {
        validate(order);
    }
}

public static int helper(int x) {
    return x;
}
";
        let out = extract(src, "OrderService.java", LanguageFamily::CLike);
        assert_eq!(
            names(&out),
            vec![
                ("OrderService", NodeKind::Class, None),
                ("place", NodeKind::Method, Some("OrderService")),
                ("helper", NodeKind::Function, None),
            ]
        );
        assert_eq!(out.definitions[0].decorators, vec!["Service".to_owned()]);
        assert_eq!(out.imports[0].from_module, "java.util.List");
        let call = out.calls.iter().find(|c| c.callee == "validate").unwrap();
        assert_eq!(call.enclosing, Some(1));
    }

    #[test]
    fn test_go_receiver_becomes_parent() {
        let src = "\
func (s *Server) Run() error {
    return nil
}
";
        let out = extract(src, "s.go", LanguageFamily::CLike);
        assert_eq!(names(&out), vec![("Run", NodeKind::Method, Some("Server"))]);
    }

    #[test]
    fn test_ruby_defs() {
        let src = "\
require 'json'

class Greeter
  def hello
    puts('hi')
  end
end

def standalone
end
";
        let out = extract(src, "g.rb", LanguageFamily::RubyLike);
        assert_eq!(
            names(&out),
            vec![
                ("Greeter", NodeKind::Class, None),
                ("hello", NodeKind::Method, Some("Greeter")),
                ("standalone", NodeKind::Function, None),
            ]
        );
        assert_eq!(out.imports[0].from_module, "json");
    }
}
