use crate::language::LanguageKind;

const PYTHON: &[&str] = &[
    "abs", "all", "any", "ascii", "bin", "bool", "breakpoint", "bytearray", "bytes", "callable",
    "chr", "classmethod", "compile", "complex", "delattr", "dict", "dir", "divmod", "enumerate",
    "eval", "exec", "filter", "float", "format", "frozenset", "getattr", "globals", "hasattr",
    "hash", "help", "hex", "id", "input", "int", "isinstance", "issubclass", "iter", "len", "list",
    "locals", "map", "max", "memoryview", "min", "next", "object", "oct", "open", "ord", "pow",
    "print", "property", "range", "repr", "reversed", "round", "set", "setattr", "slice",
    "sorted", "staticmethod", "str", "sum", "super", "tuple", "type", "vars", "zip",
];

const ECMASCRIPT: &[&str] = &[
    "Array", "Boolean", "Date", "Error", "JSON", "Map", "Number", "Object", "Promise", "Proxy",
    "Reflect", "RegExp", "Set", "String", "Symbol", "WeakMap", "WeakSet", "BigInt", "alert",
    "clearInterval", "clearTimeout", "console", "decodeURI", "decodeURIComponent", "encodeURI",
    "encodeURIComponent", "eval", "fetch", "isFinite", "isNaN", "parseFloat", "parseInt",
    "queueMicrotask", "setImmediate", "setInterval", "setTimeout", "structuredClone",
];

const RUST: &[&str] = &[
    "Some", "None", "Ok", "Err", "Box", "Vec", "String", "drop", "panic", "format", "println",
    "print", "eprintln", "assert", "assert_eq", "unreachable", "todo", "unimplemented",
    "Default", "Into", "From", "Option", "Result",
];

const GO: &[&str] = &[
    "append", "cap", "clear", "close", "complex", "copy", "delete", "imag", "len", "make", "max",
    "min", "new", "panic", "print", "println", "real", "recover",
];

const JAVA_LIKE: &[&str] = &["println", "print", "printf", "toString", "equals", "hashCode"];

const RUBY: &[&str] = &[
    "puts", "print", "p", "require", "require_relative", "raise", "attr_accessor", "attr_reader",
    "attr_writer", "include", "extend", "lambda", "proc", "loop",
];

const C_LIKE: &[&str] = &[
    "printf", "sprintf", "snprintf", "fprintf", "malloc", "calloc", "realloc", "free", "memcpy",
    "memset", "strlen", "strcmp", "strcpy", "exit", "sizeof",
];

/// Builtin functions of `language` that calls resolve to without lookup.
pub fn builtins_for(language: LanguageKind) -> &'static [&'static str] {
    match language {
        LanguageKind::Python => PYTHON,
        LanguageKind::JavaScript | LanguageKind::TypeScript => ECMASCRIPT,
        LanguageKind::Rust => RUST,
        LanguageKind::Go => GO,
        LanguageKind::Java | LanguageKind::CSharp | LanguageKind::Kotlin | LanguageKind::Swift => {
            JAVA_LIKE
        }
        LanguageKind::Ruby => RUBY,
        LanguageKind::C | LanguageKind::Cpp | LanguageKind::Php => C_LIKE,
    }
}

pub fn is_builtin(language: LanguageKind, name: &str) -> bool {
    builtins_for(language).contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_per_language() {
        assert!(is_builtin(LanguageKind::Python, "len"));
        assert!(is_builtin(LanguageKind::Go, "len"));
        assert!(is_builtin(LanguageKind::TypeScript, "setTimeout"));
        assert!(!is_builtin(LanguageKind::Python, "setTimeout"));
        assert!(!is_builtin(LanguageKind::Rust, "helper"));
    }
}
