use std::collections::HashMap;
use std::sync::Arc;

use codegraph_core::{GraphStoreAdapter, Language, QueryRow, RepoId};
use dashmap::{DashMap, DashSet};
use tracing::debug;

use crate::stats::CacheStats;

#[derive(Debug, Clone)]
pub struct FunctionSummary {
    pub file_path: String,
    pub line_start: u32,
    pub line_end: u32,
    pub complexity: u32,
    pub parameters: Vec<String>,
    pub is_method: bool,
    pub is_static: bool,
    pub is_async: bool,
}

#[derive(Debug, Clone)]
pub struct ClassSummary {
    pub file_path: String,
    pub line_start: u32,
    pub line_end: u32,
}

#[derive(Debug, Clone)]
pub struct FileSummary {
    pub file_path: String,
    pub language: Language,
    pub line_count: u32,
    pub is_test: bool,
}

/// The O(1) lookup materialization for a detector run. Built once per
/// analysis run by issuing a small fixed set of aggregation queries against
/// the tenant graph filtered by `repoId`, then held in memory in a
/// `DashMap`-backed concurrent cache for the duration of the detector phase.
/// Never persisted, never shared across a tenant boundary, and rebuilt from
/// scratch on the next run.
#[derive(Clone)]
pub struct QueryCache {
    functions: Arc<DashMap<String, FunctionSummary>>,
    classes: Arc<DashMap<String, ClassSummary>>,
    files: Arc<DashMap<String, FileSummary>>,
    calls: Arc<DashMap<String, DashSet<String>>>,
    called_by: Arc<DashMap<String, DashSet<String>>>,
    inherits: Arc<DashMap<String, DashSet<String>>>,
    inherited_by: Arc<DashMap<String, DashSet<String>>>,
    imports: Arc<DashMap<String, DashSet<String>>>,
    methods_by_class: Arc<DashMap<String, Vec<String>>>,
    parent_class: Arc<DashMap<String, String>>,
    stats: Arc<parking_lot::Mutex<CacheStats>>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::empty()
    }
}

impl QueryCache {
    fn empty() -> Self {
        Self {
            functions: Arc::new(DashMap::new()),
            classes: Arc::new(DashMap::new()),
            files: Arc::new(DashMap::new()),
            calls: Arc::new(DashMap::new()),
            called_by: Arc::new(DashMap::new()),
            inherits: Arc::new(DashMap::new()),
            inherited_by: Arc::new(DashMap::new()),
            imports: Arc::new(DashMap::new()),
            methods_by_class: Arc::new(DashMap::new()),
            parent_class: Arc::new(DashMap::new()),
            stats: Arc::new(parking_lot::Mutex::new(CacheStats::default())),
        }
    }

    /// Materializes the cache for one tenant-scoped repository (spec §4.6).
    pub async fn build(graph: &dyn GraphStoreAdapter, repo_id: &RepoId) -> anyhow::Result<Self> {
        let cache = Self::empty();
        cache.load_functions(graph, repo_id).await?;
        cache.load_classes(graph, repo_id).await?;
        cache.load_files(graph, repo_id).await?;
        cache.load_edge_map(graph, repo_id, "CALLS", &cache.calls, &cache.called_by).await?;
        cache
            .load_edge_map(graph, repo_id, "INHERITS", &cache.inherits, &cache.inherited_by)
            .await?;
        cache.load_imports(graph, repo_id).await?;
        cache.derive_class_membership();

        let entries = cache.functions.len() + cache.classes.len() + cache.files.len();
        cache.stats.lock().entries = entries;
        debug!(
            functions = cache.functions.len(),
            classes = cache.classes.len(),
            files = cache.files.len(),
            "query cache materialized"
        );
        Ok(cache)
    }

    async fn load_functions(&self, graph: &dyn GraphStoreAdapter, repo_id: &RepoId) -> anyhow::Result<()> {
        let rows = query(
            graph,
            "SELECT qualified_name, file_path, line_start, line_end, complexity, \
             parameters, is_method, is_static, is_async FROM function WHERE repo_id = $repo_id",
            repo_id,
        )
        .await?;

        for row in rows {
            let Some(qn) = str_field(&row, "qualified_name") else { continue };
            self.functions.insert(
                qn,
                FunctionSummary {
                    file_path: str_field(&row, "file_path").unwrap_or_default(),
                    line_start: u32_field(&row, "line_start"),
                    line_end: u32_field(&row, "line_end"),
                    complexity: u32_field(&row, "complexity"),
                    parameters: str_array_field(&row, "parameters"),
                    is_method: bool_field(&row, "is_method"),
                    is_static: bool_field(&row, "is_static"),
                    is_async: bool_field(&row, "is_async"),
                },
            );
        }
        Ok(())
    }

    async fn load_classes(&self, graph: &dyn GraphStoreAdapter, repo_id: &RepoId) -> anyhow::Result<()> {
        let rows = query(
            graph,
            "SELECT qualified_name, file_path, line_start, line_end FROM class WHERE repo_id = $repo_id",
            repo_id,
        )
        .await?;

        for row in rows {
            let Some(qn) = str_field(&row, "qualified_name") else { continue };
            self.classes.insert(
                qn,
                ClassSummary {
                    file_path: str_field(&row, "file_path").unwrap_or_default(),
                    line_start: u32_field(&row, "line_start"),
                    line_end: u32_field(&row, "line_end"),
                },
            );
        }
        Ok(())
    }

    async fn load_files(&self, graph: &dyn GraphStoreAdapter, repo_id: &RepoId) -> anyhow::Result<()> {
        let rows = query(
            graph,
            "SELECT path, language, line_count, is_test FROM file WHERE repo_id = $repo_id",
            repo_id,
        )
        .await?;

        for row in rows {
            let Some(path) = str_field(&row, "path") else { continue };
            let language = match str_field(&row, "language").as_deref() {
                Some("rust") => Language::Rust,
                Some("python") => Language::Python,
                Some("typescript") => Language::TypeScript,
                Some("javascript") => Language::JavaScript,
                Some("go") => Language::Go,
                Some("java") => Language::Java,
                Some("cpp") => Language::Cpp,
                _ => Language::Other,
            };
            self.files.insert(
                path.clone(),
                FileSummary {
                    file_path: path,
                    language,
                    line_count: u32_field(&row, "line_count"),
                    is_test: bool_field(&row, "is_test"),
                },
            );
        }
        Ok(())
    }

    /// Loads one directed edge relation and its inverse. Only resolved,
    /// internal-endpoint edges are ever persisted (invariant I2), so this
    /// never needs to special-case unresolved targets.
    async fn load_edge_map(
        &self,
        graph: &dyn GraphStoreAdapter,
        repo_id: &RepoId,
        edge_type: &str,
        forward: &DashMap<String, DashSet<String>>,
        backward: &DashMap<String, DashSet<String>>,
    ) -> anyhow::Result<()> {
        let stmt = format!(
            "SELECT in.qualified_name AS from_qn, out.qualified_name AS to_qn FROM edges \
             WHERE repo_id = $repo_id AND edge_type = '{edge_type}'"
        );
        let rows = query(graph, &stmt, repo_id).await?;

        for row in rows {
            let (Some(from_qn), Some(to_qn)) = (str_field(&row, "from_qn"), str_field(&row, "to_qn"))
            else {
                continue;
            };
            forward.entry(from_qn.clone()).or_default().insert(to_qn.clone());
            backward.entry(to_qn).or_default().insert(from_qn);
        }
        Ok(())
    }

    async fn load_imports(&self, graph: &dyn GraphStoreAdapter, repo_id: &RepoId) -> anyhow::Result<()> {
        let rows = query(
            graph,
            "SELECT in.qualified_name AS from_qn, out.qualified_name AS to_qn FROM edges \
             WHERE repo_id = $repo_id AND edge_type = 'IMPORTS'",
            repo_id,
        )
        .await?;

        for row in rows {
            let (Some(from_qn), Some(to_qn)) = (str_field(&row, "from_qn"), str_field(&row, "to_qn"))
            else {
                continue;
            };
            self.imports.entry(from_qn).or_default().insert(to_qn);
        }
        Ok(())
    }

    /// `methodsByClass`/`parentClass` are derived, not queried directly: a
    /// method's qualified name is always `{owningClass}.{methodName}` (see
    /// `codegraph-parser`'s Python extractor), so the parent is recovered by
    /// trimming the last dotted segment and checking it names a known class.
    fn derive_class_membership(&self) {
        for entry in self.functions.iter() {
            if !entry.value().is_method {
                continue;
            }
            let qn = entry.key();
            if let Some((parent, _)) = qn.rsplit_once('.') {
                if self.classes.contains_key(parent) {
                    self.parent_class.insert(qn.clone(), parent.to_string());
                    self.methods_by_class
                        .entry(parent.to_string())
                        .or_default()
                        .push(qn.clone());
                }
            }
        }
    }

    pub fn function(&self, qualified_name: &str) -> Option<FunctionSummary> {
        self.hit_or_miss(self.functions.get(qualified_name).map(|e| e.value().clone()))
    }

    pub fn class(&self, qualified_name: &str) -> Option<ClassSummary> {
        self.hit_or_miss(self.classes.get(qualified_name).map(|e| e.value().clone()))
    }

    pub fn file(&self, path: &str) -> Option<FileSummary> {
        self.hit_or_miss(self.files.get(path).map(|e| e.value().clone()))
    }

    pub fn calls(&self, caller: &str) -> Vec<String> {
        self.calls.get(caller).map(|s| s.iter().map(|v| v.key().clone()).collect()).unwrap_or_default()
    }

    pub fn called_by(&self, callee: &str) -> Vec<String> {
        self.called_by.get(callee).map(|s| s.iter().map(|v| v.key().clone()).collect()).unwrap_or_default()
    }

    pub fn inherits(&self, child: &str) -> Vec<String> {
        self.inherits.get(child).map(|s| s.iter().map(|v| v.key().clone()).collect()).unwrap_or_default()
    }

    pub fn inherited_by(&self, parent: &str) -> Vec<String> {
        self.inherited_by.get(parent).map(|s| s.iter().map(|v| v.key().clone()).collect()).unwrap_or_default()
    }

    pub fn imports(&self, importer: &str) -> Vec<String> {
        self.imports.get(importer).map(|s| s.iter().map(|v| v.key().clone()).collect()).unwrap_or_default()
    }

    pub fn methods_by_class(&self, class_qn: &str) -> Vec<String> {
        self.methods_by_class.get(class_qn).map(|v| v.clone()).unwrap_or_default()
    }

    pub fn parent_class(&self, function_qn: &str) -> Option<String> {
        self.parent_class.get(function_qn).map(|v| v.clone())
    }

    /// Every qualified name with at least one recorded caller, paired with
    /// its caller count — lets a fan-in style detector rank candidates
    /// without resolving each class name individually (spec §4.8: detectors
    /// read the cache, never the graph store directly).
    pub fn called_by_counts(&self) -> Vec<(String, usize)> {
        self.called_by
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().len()))
            .collect()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }

    fn hit_or_miss<T>(&self, value: Option<T>) -> Option<T> {
        let mut stats = self.stats.lock();
        if value.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        value
    }
}

async fn query(graph: &dyn GraphStoreAdapter, stmt: &str, repo_id: &RepoId) -> anyhow::Result<Vec<QueryRow>> {
    let mut params: QueryRow = HashMap::new();
    params.insert("repo_id".to_string(), serde_json::Value::String(repo_id.clone()));
    graph.execute_query(stmt, params, None).await
}

fn str_field(row: &QueryRow, key: &str) -> Option<String> {
    row.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn u32_field(row: &QueryRow, key: &str) -> u32 {
    row.get(key).and_then(|v| v.as_u64()).unwrap_or(0) as u32
}

fn bool_field(row: &QueryRow, key: &str) -> bool {
    row.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

fn str_array_field(row: &QueryRow, key: &str) -> Vec<String> {
    row.get(key)
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}
