use codegraph_core::Language;

/// Extension-based language detection for the File node's `language` field.
/// Mirrors the original ingestion pipeline's `_detect_language` map; this
/// rewrite only ships a Python `ParserBridge`, but File nodes are still
/// recorded for every scanned extension so repository-wide file stats (C6's
/// `files[path]` cache) aren't Python-only.
pub fn detect_language(repo_relative_path: &str) -> Language {
    match repo_relative_path.rsplit('.').next() {
        Some("py" | "pyi") => Language::Python,
        Some("js" | "jsx") => Language::JavaScript,
        Some("ts" | "tsx") => Language::TypeScript,
        Some("java") => Language::Java,
        Some("go") => Language::Go,
        Some("rs") => Language::Rust,
        Some("cpp" | "cc" | "hpp" | "h") => Language::Cpp,
        _ => Language::Other,
    }
}

/// Heuristic used to populate `FileEntity::is_test`: any path segment or
/// filename that looks like a test module.
pub fn looks_like_test_path(repo_relative_path: &str) -> bool {
    repo_relative_path.split('/').any(|segment| segment == "tests" || segment == "test")
        || repo_relative_path.rsplit('/').next().is_some_and(|name| {
            name.starts_with("test_") || name.ends_with("_test.py") || name.ends_with("_test.rs")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_python() {
        assert_eq!(detect_language("pkg/mod.py"), Language::Python);
    }

    #[test]
    fn unknown_extension_is_other() {
        assert_eq!(detect_language("README.md"), Language::Other);
    }

    #[test]
    fn recognizes_test_paths() {
        assert!(looks_like_test_path("tests/test_foo.py"));
        assert!(looks_like_test_path("pkg/test_bar.py"));
        assert!(!looks_like_test_path("pkg/bar.py"));
    }
}
