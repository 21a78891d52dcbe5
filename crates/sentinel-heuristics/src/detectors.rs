use std::sync::LazyLock;

use regex::Regex;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bhttps?://[^\s]+|\bwww\.[^\s]+").unwrap());
static CODE_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```").unwrap());
static FUNCTION_LIKE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(function|def|fn|class)\s+\w+\s*\(").unwrap());
static INDENTED_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\t| {4,})\S").unwrap());

/// Code fence, function-like declaration, or 4+ consecutive indented lines.
pub fn detect_code_patterns(text: &str) -> bool {
    if CODE_FENCE_RE.is_match(text) || FUNCTION_LIKE_RE.is_match(text) {
        return true;
    }
    let mut run = 0u32;
    for line in text.lines() {
        if INDENTED_LINE_RE.is_match(line) {
            run += 1;
            if run >= 4 {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

pub fn detect_links(text: &str) -> bool {
    URL_RE.is_match(text)
}
