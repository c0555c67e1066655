use codegraph_core::{
    ClassEntity, EdgeRelationship, EdgeType, ExtractionResult, FunctionEntity, ModuleEntity,
};
use std::collections::HashMap;
use tree_sitter::{Node, Tree, TreeCursor};

/// Single-traversal Python extractor. Builds the module, its classes and
/// functions, and the `IMPORTS`/`CALLS`/`INHERITS` edges in one walk of the
/// tree-sitter AST, tracking the enclosing class/function as a name-scope
/// stack so nested `def`s get dotted qualified names.
pub struct PythonExtractor;

impl PythonExtractor {
    pub fn extract(tree: &Tree, content: &str, repo_relative_path: &str) -> ExtractionResult {
        let module_name = module_qualified_name(repo_relative_path);
        let mut collector = PythonCollector::new(content, repo_relative_path, module_name.clone());
        collector.result.modules.push(ModuleEntity {
            qualified_name: module_name,
            repo_id: String::new(),
            repo_slug: None,
            is_external: false,
        });
        let mut cursor = tree.walk();
        collector.walk(&mut cursor);
        collector.result
    }
}

/// `src/pkg/mod.py` -> `pkg.mod`; `src/pkg/__init__.py` -> `pkg`.
fn module_qualified_name(repo_relative_path: &str) -> String {
    let without_ext = repo_relative_path.trim_end_matches(".py");
    let parts: Vec<&str> = without_ext.split('/').filter(|p| !p.is_empty()).collect();
    let parts: Vec<&str> = match parts.last() {
        Some(&"__init__") => parts[..parts.len() - 1].to_vec(),
        _ => parts,
    };
    parts.join(".")
}

struct ScopeFrame {
    qualified_name: String,
    is_class: bool,
}

struct PythonCollector<'a> {
    content: &'a str,
    file_path: &'a str,
    module_name: String,
    scopes: Vec<ScopeFrame>,
    result: ExtractionResult,
}

impl<'a> PythonCollector<'a> {
    fn new(content: &'a str, file_path: &'a str, module_name: String) -> Self {
        Self {
            content,
            file_path,
            module_name,
            scopes: Vec::new(),
            result: ExtractionResult::default(),
        }
    }

    fn current_scope(&self) -> String {
        self.scopes
            .last()
            .map(|s| s.qualified_name.clone())
            .unwrap_or_else(|| self.module_name.clone())
    }

    fn current_function(&self) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find(|s| !s.is_class)
            .map(|s| s.qualified_name.as_str())
    }

    fn walk(&mut self, cursor: &mut TreeCursor) {
        let node = cursor.node();
        let mut pushed_scope = false;

        match node.kind() {
            "function_definition" => {
                if let Some(name) = self.child_text_by_kind(node, "identifier") {
                    let qualified_name = format!("{}.{}", self.current_scope(), name);
                    let is_method = self
                        .scopes
                        .last()
                        .map(|s| s.is_class)
                        .unwrap_or(false);
                    let params = self.extract_parameters(&node);
                    let decorators = self.extract_decorators(&node);
                    let is_async = self.node_text(&node).starts_with("async ");
                    let has_yield = self.subtree_contains_kind(node, "yield");

                    self.result.functions.push(FunctionEntity {
                        qualified_name: qualified_name.clone(),
                        simple_name: name,
                        repo_id: String::new(),
                        repo_slug: None,
                        file_path: self.file_path.to_string(),
                        line_start: node.start_position().row as u32 + 1,
                        line_end: node.end_position().row as u32 + 1,
                        complexity: crate::complexity::calculate_cyclomatic_complexity(&node, self.content)
                            as u32,
                        parameters: params,
                        return_type: None,
                        is_method,
                        is_static: decorators.iter().any(|d| d == "staticmethod"),
                        is_async,
                        has_yield,
                        decorators,
                    });

                    self.scopes.push(ScopeFrame { qualified_name, is_class: false });
                    pushed_scope = true;
                }
            }

            "class_definition" => {
                if let Some(name) = self.child_text_by_kind(node, "identifier") {
                    let qualified_name = format!("{}.{}", self.current_scope(), name);
                    let bases = self.extract_base_classes(&node);
                    for base in &bases {
                        self.result.relationships.push(EdgeRelationship {
                            from: qualified_name.clone(),
                            to: base.clone(),
                            edge_type: EdgeType::Inherits,
                            metadata: HashMap::new(),
                        });
                    }

                    self.result.classes.push(ClassEntity {
                        qualified_name: qualified_name.clone(),
                        simple_name: name,
                        repo_id: String::new(),
                        repo_slug: None,
                        file_path: self.file_path.to_string(),
                        line_start: node.start_position().row as u32 + 1,
                        line_end: node.end_position().row as u32 + 1,
                        is_abstract: bases.iter().any(|b| b.contains("ABC")),
                        is_exception: bases.iter().any(|b| b.contains("Exception") || b.contains("Error")),
                        is_dataclass: self.has_decorator(&node, "dataclass"),
                        nesting_level: self.scopes.iter().filter(|s| s.is_class).count() as u32,
                    });

                    self.scopes.push(ScopeFrame { qualified_name, is_class: true });
                    pushed_scope = true;
                }
            }

            "import_statement" | "import_from_statement" => {
                if let Some(name) = self.extract_import_name(&node) {
                    self.result.relationships.push(EdgeRelationship {
                        from: self.module_name.clone(),
                        to: name,
                        edge_type: EdgeType::Imports,
                        metadata: {
                            let mut meta = HashMap::new();
                            meta.insert("source_file".to_string(), self.file_path.to_string());
                            meta
                        },
                    });
                }
            }

            "call" => {
                if let Some(caller) = self.current_function() {
                    if let Some(target) = self.extract_call_target(&node) {
                        self.result.relationships.push(EdgeRelationship {
                            from: caller.to_string(),
                            to: target,
                            edge_type: EdgeType::Calls,
                            metadata: HashMap::new(),
                        });
                    }
                }
            }

            _ => {}
        }

        if cursor.goto_first_child() {
            loop {
                self.walk(cursor);
                if !cursor.goto_next_sibling() {
                    break;
                }
            }
            cursor.goto_parent();
        }

        if pushed_scope {
            self.scopes.pop();
        }
    }

    fn extract_import_name(&self, node: &Node) -> Option<String> {
        if node.kind() == "import_statement" {
            self.child_text_by_kinds(*node, &["dotted_name", "identifier"])
        } else {
            self.child_text_by_kinds(*node, &["dotted_name", "relative_import"])
        }
    }

    fn extract_call_target(&self, node: &Node) -> Option<String> {
        if let Some(function_node) = node.child_by_field_name("function") {
            return Some(self.node_text(&function_node));
        }
        self.child_text_by_kinds(*node, &["identifier", "attribute"])
    }

    fn extract_base_classes(&self, node: &Node) -> Vec<String> {
        let mut cursor = node.walk();
        let mut bases = Vec::new();
        if let Some(arglist) = node
            .children(&mut cursor)
            .find(|n| n.kind() == "argument_list")
        {
            let mut arg_cursor = arglist.walk();
            for child in arglist.children(&mut arg_cursor) {
                if matches!(child.kind(), "identifier" | "attribute") {
                    bases.push(self.node_text(&child));
                }
            }
        }
        bases
    }

    fn extract_parameters(&self, node: &Node) -> Vec<String> {
        let mut params = Vec::new();
        if let Some(param_list) = node.child_by_field_name("parameters") {
            let mut cursor = param_list.walk();
            for child in param_list.children(&mut cursor) {
                match child.kind() {
                    "identifier" => params.push(self.node_text(&child)),
                    "typed_parameter" | "default_parameter" | "typed_default_parameter" => {
                        if let Some(name) = self.child_text_by_kind(child, "identifier") {
                            params.push(name);
                        }
                    }
                    _ => {}
                }
            }
        }
        params
    }

    fn extract_decorators(&self, node: &Node) -> Vec<String> {
        let mut decorators = Vec::new();
        if let Some(parent) = node.parent() {
            if parent.kind() == "decorated_definition" {
                let mut cursor = parent.walk();
                for child in parent.children(&mut cursor) {
                    if child.kind() == "decorator" {
                        if let Some(name) = self.child_text_by_kinds(child, &["identifier", "attribute"]) {
                            decorators.push(name);
                        }
                    }
                }
            }
        }
        decorators
    }

    fn has_decorator(&self, node: &Node, name: &str) -> bool {
        self.extract_decorators(node).iter().any(|d| d == name || d.ends_with(&format!(".{name}")))
    }

    fn subtree_contains_kind(&self, node: Node, kind: &str) -> bool {
        if node.kind() == kind {
            return true;
        }
        let mut cursor = node.walk();
        if cursor.goto_first_child() {
            loop {
                let child = cursor.node();
                // don't descend into nested function bodies' own yield checks twice; harmless either way
                if self.subtree_contains_kind(child, kind) {
                    return true;
                }
                if !cursor.goto_next_sibling() {
                    break;
                }
            }
        }
        false
    }

    fn node_text(&self, node: &Node) -> String {
        node.utf8_text(self.content.as_bytes()).unwrap_or("").to_string()
    }

    fn child_text_by_kind(&self, node: Node, kind: &str) -> Option<String> {
        self.child_text_by_kinds(node, &[kind])
    }

    fn child_text_by_kinds(&self, node: Node, kinds: &[&str]) -> Option<String> {
        let mut cursor = node.walk();
        if cursor.goto_first_child() {
            loop {
                let n = cursor.node();
                if kinds.iter().any(|k| n.kind() == *k) {
                    return Some(self.node_text(&n));
                }
                if !cursor.goto_next_sibling() {
                    break;
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::Parser;

    fn parse(src: &str) -> Tree {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .unwrap();
        parser.parse(src, None).unwrap()
    }

    #[test]
    fn extracts_module_class_and_method_with_dotted_qualified_names() {
        let src = "class Foo:\n    def bar(self):\n        baz()\n";
        let tree = parse(src);
        let result = PythonExtractor::extract(&tree, src, "pkg/mod.py");

        assert_eq!(result.modules[0].qualified_name, "pkg.mod");
        assert_eq!(result.classes.len(), 1);
        assert_eq!(result.classes[0].qualified_name, "pkg.mod.Foo");
        assert_eq!(result.functions.len(), 1);
        assert_eq!(result.functions[0].qualified_name, "pkg.mod.Foo.bar");
        assert!(result.functions[0].is_method);

        let call_edge = result
            .relationships
            .iter()
            .find(|r| r.edge_type == EdgeType::Calls)
            .unwrap();
        assert_eq!(call_edge.from, "pkg.mod.Foo.bar");
        assert_eq!(call_edge.to, "baz");
    }

    #[test]
    fn extracts_import_edge_from_module() {
        let src = "import os\n";
        let tree = parse(src);
        let result = PythonExtractor::extract(&tree, src, "a.py");
        let edge = result
            .relationships
            .iter()
            .find(|r| r.edge_type == EdgeType::Imports)
            .unwrap();
        assert_eq!(edge.from, "a");
        assert_eq!(edge.to, "os");
    }

    #[test]
    fn extracts_inheritance_edge() {
        let src = "class Child(Base):\n    pass\n";
        let tree = parse(src);
        let result = PythonExtractor::extract(&tree, src, "a.py");
        let edge = result
            .relationships
            .iter()
            .find(|r| r.edge_type == EdgeType::Inherits)
            .unwrap();
        assert_eq!(edge.from, "a.Child");
        assert_eq!(edge.to, "Base");
    }

    #[test]
    fn init_file_drops_final_segment_from_module_name() {
        assert_eq!(module_qualified_name("pkg/__init__.py"), "pkg");
        assert_eq!(module_qualified_name("pkg/sub.py"), "pkg.sub");
    }
}
