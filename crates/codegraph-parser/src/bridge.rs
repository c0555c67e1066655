use async_trait::async_trait;
use codegraph_core::{ExtractionResult, Language, ParserBridge};
use tree_sitter::Parser;
use tracing::warn;

use crate::languages::PythonExtractor;

/// Tree-sitter-backed `ParserBridge`. Parsers are treated as an external
/// collaborator behind this trait; this crate carries exactly one reference
/// front-end (Python) so the rest of the system has a real implementation to
/// ingest against.
pub struct TreeSitterBridge;

impl TreeSitterBridge {
    pub fn new() -> Self {
        Self
    }

    fn parse_python(&self, repo_relative_path: &str, bytes: &[u8]) -> anyhow::Result<ExtractionResult> {
        let source = std::str::from_utf8(bytes)?;
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| anyhow::anyhow!("failed to load python grammar: {e}"))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("tree-sitter produced no parse tree for {repo_relative_path}"))?;

        if tree.root_node().has_error() {
            warn!(path = repo_relative_path, "parsed with syntax errors, extraction continues best-effort");
        }

        Ok(PythonExtractor::extract(&tree, source, repo_relative_path))
    }
}

impl Default for TreeSitterBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParserBridge for TreeSitterBridge {
    async fn parse(&self, repo_relative_path: &str, bytes: &[u8]) -> anyhow::Result<ExtractionResult> {
        if !repo_relative_path.ends_with(".py") && !repo_relative_path.ends_with(".pyi") {
            anyhow::bail!("unsupported file extension: {repo_relative_path}");
        }
        self.parse_python(repo_relative_path, bytes)
    }

    fn supported_languages(&self) -> Vec<Language> {
        vec![Language::Python]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parses_a_simple_module() {
        let bridge = TreeSitterBridge::new();
        let result = bridge
            .parse("a.py", b"def f():\n    return 1\n")
            .await
            .unwrap();
        assert_eq!(result.functions.len(), 1);
        assert_eq!(result.functions[0].qualified_name, "a.f");
    }

    #[tokio::test]
    async fn rejects_unsupported_extension() {
        let bridge = TreeSitterBridge::new();
        assert!(bridge.parse("a.rs", b"fn main() {}").await.is_err());
    }

    #[tokio::test]
    async fn tolerates_syntax_errors_without_failing() {
        let bridge = TreeSitterBridge::new();
        let result = bridge.parse("broken.py", b"def f(:\n").await;
        assert!(result.is_ok());
    }
}
