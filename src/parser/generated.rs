/// A first line at least this long marks minified or bundled output.
pub const MAX_FIRST_LINE: usize = 1000;

const NAME_MARKERS: &[&str] = &[".min.", ".bundle.", ".chunk.", "-bundle."];
const NAME_SUFFIXES: &[&str] = &[".pb.go", "_pb2.py"];
const PREAMBLES: &[&str] = &[
    "webpackBootstrap",
    "__webpack_require__",
    "/*! For license information",
    "System.register(",
    "(function(modules)",
];

/// Only the head of the file is scanned for bundler preambles.
const PREAMBLE_WINDOW: usize = 2048;

/// Returns true when a file is generated or minified output that should be
/// recorded as a bare File node instead of being parsed.
pub fn is_generated(path: &str, content: &str) -> bool {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    if NAME_MARKERS.iter().any(|m| file_name.contains(m))
        || NAME_SUFFIXES.iter().any(|s| file_name.ends_with(s))
    {
        return true;
    }

    let first_line = content.lines().next().unwrap_or("");
    if first_line.chars().count() >= MAX_FIRST_LINE {
        return true;
    }

    let mut end = content.len().min(PREAMBLE_WINDOW);
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    let head = &content[..end];
    PREAMBLES.iter().any(|p| head.contains(p))
}
