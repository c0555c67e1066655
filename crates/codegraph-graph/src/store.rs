use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use codegraph_core::{
    EdgeRelationship, EdgeType, FileFingerprint, GraphEntity, GraphStoreAdapter, QueryRow, RepoId,
};
use serde_json::{json, Value as JsonValue};
use sha2::{Digest, Sha256};
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info, warn};

use crate::error::GraphStoreError;
use crate::retry::with_retry;
use crate::schema::{EDGE_TABLE, NODE_TABLES, RESOLVABLE_TABLES};

/// `GraphStoreAdapter` backed by SurrealDB (spec §4.1, C1).
///
/// One instance is scoped to a single tenant namespace/database pair — the
/// Tenant Factory (`codegraph-tenant`) owns connecting, selecting `use_ns` /
/// `use_db`, and caching instances per org; this type only knows how to turn
/// adapter calls into SurrealQL against whichever database it was handed.
#[derive(Clone)]
pub struct SurrealGraphStore {
    db: Arc<Surreal<Any>>,
}

/// Deterministic, collision-resistant SurrealDB record id for an entity,
/// scoped by repo so the same qualified name in two repos under one org
/// tenant never collides (spec §3.1: every node carries `repoId`).
fn record_key(repo_id: &str, unique_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(repo_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(unique_key.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn entity_table(entity: &GraphEntity) -> &'static str {
    match entity {
        GraphEntity::File(_) => "file",
        GraphEntity::Module(_) => "module",
        GraphEntity::Class(_) => "class",
        GraphEntity::Function(_) => "function",
        GraphEntity::DetectorMetadata(_) => "detector_metadata",
    }
}

fn entity_to_content(entity: &GraphEntity) -> JsonValue {
    match entity {
        GraphEntity::File(f) => json!({
            "path": f.path,
            "repo_id": f.repo_id,
            "repo_slug": f.repo_slug,
            "language": f.language.to_string(),
            "line_count": f.line_count,
            "content_hash": f.content_hash,
            "last_modified": f.last_modified.to_rfc3339(),
            "is_test": f.is_test,
        }),
        GraphEntity::Module(m) => json!({
            "qualified_name": m.qualified_name,
            "repo_id": m.repo_id,
            "repo_slug": m.repo_slug,
            "is_external": m.is_external,
        }),
        GraphEntity::Class(c) => json!({
            "qualified_name": c.qualified_name,
            "simple_name": c.simple_name,
            "repo_id": c.repo_id,
            "repo_slug": c.repo_slug,
            "file_path": c.file_path,
            "line_start": c.line_start,
            "line_end": c.line_end,
            "is_abstract": c.is_abstract,
            "is_exception": c.is_exception,
            "is_dataclass": c.is_dataclass,
            "nesting_level": c.nesting_level,
        }),
        GraphEntity::Function(fun) => json!({
            "qualified_name": fun.qualified_name,
            "simple_name": fun.simple_name,
            "repo_id": fun.repo_id,
            "repo_slug": fun.repo_slug,
            "file_path": fun.file_path,
            "line_start": fun.line_start,
            "line_end": fun.line_end,
            "complexity": fun.complexity,
            "parameters": fun.parameters,
            "return_type": fun.return_type,
            "is_method": fun.is_method,
            "is_static": fun.is_static,
            "is_async": fun.is_async,
            "has_yield": fun.has_yield,
            "decorators": fun.decorators,
        }),
        GraphEntity::DetectorMetadata(d) => json!({
            "repo_id": d.repo_id,
            "entity_qualified_name": d.entity_qualified_name,
            "detector": d.detector,
            "severity": d.severity.to_string(),
            "issues": d.issues,
            "confidence": d.confidence,
            "timestamp": d.timestamp.to_rfc3339(),
            "metadata_json": d.metadata_json,
            "composite_key": format!("{}::{}", d.entity_qualified_name, d.detector),
        }),
    }
}

impl SurrealGraphStore {
    /// Wraps an already-connected, already namespace/database-selected
    /// client. Connection and tenant selection live in `codegraph-tenant`
    /// (spec §4.2); this constructor just fixes the seam.
    pub fn new(db: Arc<Surreal<Any>>) -> Self {
        Self { db }
    }

    async fn resolve_endpoint(
        &self,
        repo_id: &str,
        qualified_name: &str,
    ) -> anyhow::Result<Option<surrealdb::sql::Thing>> {
        for table in RESOLVABLE_TABLES {
            let key_field = match *table {
                "file" => "path",
                "detector_metadata" => "composite_key",
                _ => "qualified_name",
            };
            let query = format!(
                "SELECT id FROM {table} WHERE repo_id = $repo_id AND {key_field} = $key LIMIT 1"
            );
            let mut result = with_retry("resolve_endpoint", || {
                self.db
                    .query(query.clone())
                    .bind(("repo_id", repo_id.to_string()))
                    .bind(("key", qualified_name.to_string()))
            })
            .await?;
            let rows: Vec<HashMap<String, JsonValue>> = result.take(0)?;
            if let Some(row) = rows.into_iter().next() {
                if let Some(JsonValue::String(id)) = row.get("id") {
                    if let Ok(thing) = surrealdb::sql::thing(id) {
                        return Ok(Some(thing));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Materializes an unresolved CALLS/USES/INHERITS target as an external
    /// symbol node (invariant I2: `BuiltinFunction | ExternalFunction |
    /// ExternalClass`, MERGE target + MERGE edge). Called only once the
    /// target has already failed to resolve against the internal entity
    /// tables, so every name reaching here is, by construction, external.
    async fn materialize_external(
        &self,
        repo_id: &str,
        qualified_name: &str,
        edge_type: EdgeType,
    ) -> anyhow::Result<surrealdb::sql::Thing> {
        let table = match edge_type {
            EdgeType::Inherits => "external_class",
            _ if qualified_name.contains('.') => "external_function",
            _ => "builtin_function",
        };
        let id = record_key(repo_id, qualified_name);

        with_retry("materialize_external", || {
            let db = &self.db;
            let content = json!({
                "qualified_name": qualified_name,
                "repo_id": repo_id,
            });
            let id = id.clone();
            async move {
                let _: Option<HashMap<String, JsonValue>> =
                    db.upsert((table, id.as_str())).content(content).await?;
                Ok(())
            }
        })
        .await?;

        Ok(surrealdb::sql::thing(&format!("{table}:{id}"))?)
    }
}

#[async_trait]
impl GraphStoreAdapter for SurrealGraphStore {
    async fn execute_query(
        &self,
        query: &str,
        params: QueryRow,
        timeout: Option<Duration>,
    ) -> anyhow::Result<Vec<QueryRow>> {
        let run = || async {
            let mut q = self.db.query(query);
            for (k, v) in params.clone() {
                q = q.bind((k, v));
            }
            q.await
        };
        let fut = with_retry("execute_query", run);
        let mut result = match timeout {
            Some(t) => tokio::time::timeout(t, fut)
                .await
                .map_err(|_| GraphStoreError::QueryFailed {
                    attempts: 1,
                    source: anyhow::anyhow!("query exceeded {:?} timeout", t),
                })??,
            None => fut.await?,
        };
        let rows: Vec<QueryRow> = result.take(0)?;
        Ok(rows)
    }

    async fn batch_create_nodes(&self, entities: Vec<GraphEntity>) -> anyhow::Result<usize> {
        let mut grouped: HashMap<&'static str, Vec<&GraphEntity>> = HashMap::new();
        for entity in &entities {
            grouped.entry(entity_table(entity)).or_default().push(entity);
        }

        let mut written = 0usize;
        for (table, items) in grouped {
            for entity in items {
                let id = record_key(entity.repo_id(), &entity.unique_key());
                let content = entity_to_content(entity);
                with_retry("batch_create_nodes", || {
                    let db = &self.db;
                    let content = content.clone();
                    async move {
                        let _: Option<HashMap<String, JsonValue>> =
                            db.upsert((table, id.as_str())).content(content).await?;
                        Ok(())
                    }
                })
                .await?;
                written += 1;
            }
        }

        debug!(count = written, "batch_create_nodes wrote entities");
        Ok(written)
    }

    async fn batch_create_relationships(
        &self,
        rels: Vec<EdgeRelationship>,
        repo_id: &RepoId,
    ) -> anyhow::Result<usize> {
        let mut written = 0usize;
        for rel in rels {
            // Invariant I2: the source endpoint is always internal — never
            // materialize a missing `from`, only MATCH what already exists.
            let Some(from) = self.resolve_endpoint(repo_id, &rel.from).await? else {
                warn!(
                    repo_id = %repo_id,
                    from = %rel.from,
                    to = %rel.to,
                    edge_type = rel.edge_type.as_str(),
                    "skipping relationship with unresolved source endpoint"
                );
                continue;
            };

            let to = match self.resolve_endpoint(repo_id, &rel.to).await? {
                Some(to) => to,
                None if matches!(
                    rel.edge_type,
                    EdgeType::Calls | EdgeType::Uses | EdgeType::Inherits
                ) =>
                {
                    self.materialize_external(repo_id, &rel.to, rel.edge_type)
                        .await?
                }
                None => {
                    warn!(
                        repo_id = %repo_id,
                        from = %rel.from,
                        to = %rel.to,
                        edge_type = rel.edge_type.as_str(),
                        "skipping relationship with unresolved target endpoint"
                    );
                    continue;
                }
            };

            let metadata: HashMap<String, JsonValue> = rel
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
                .collect();

            // Deterministic edge id keyed on (repo, endpoints, type) so this
            // UPSERT creates the edge on first ingestion and idempotently
            // re-applies it on every later one, matching batch_create_nodes.
            let edge_id = record_key(
                repo_id,
                &format!("{from}|{to}|{}", rel.edge_type.as_str()),
            );

            with_retry("batch_create_relationships", || {
                let db = &self.db;
                let from = from.clone();
                let to = to.clone();
                let repo_id = repo_id.clone();
                let edge_type = rel.edge_type.as_str().to_string();
                let metadata = metadata.clone();
                let edge_id = edge_id.clone();
                async move {
                    db.query(
                        "UPSERT type::thing('edges', $edge_id) CONTENT { in: $from, out: $to, \
                         repo_id: $repo_id, edge_type: $edge_type, metadata: $metadata }",
                    )
                    .bind(("edge_id", edge_id))
                    .bind(("from", from))
                    .bind(("to", to))
                    .bind(("repo_id", repo_id))
                    .bind(("edge_type", edge_type))
                    .bind(("metadata", metadata))
                    .await
                }
            })
            .await?;
            written += 1;
        }

        Ok(written)
    }

    async fn delete_file_entities(&self, repo_id: &RepoId, path: &str) -> anyhow::Result<usize> {
        let mut result = with_retry("delete_file_entities", || {
            self.db
                .query(
                    "DELETE function, class, module WHERE repo_id = $repo_id AND file_path = $path \
                     RETURN BEFORE; DELETE file WHERE repo_id = $repo_id AND path = $path RETURN BEFORE",
                )
                .bind(("repo_id", repo_id.clone()))
                .bind(("path", path.to_string()))
        })
        .await?;
        let deleted: Vec<HashMap<String, JsonValue>> = result.take(0).unwrap_or_default();
        let deleted_file: Vec<HashMap<String, JsonValue>> = result.take(1).unwrap_or_default();
        Ok(deleted.len() + deleted_file.len())
    }

    async fn delete_repository(&self, repo_id: &RepoId) -> anyhow::Result<usize> {
        let mut total = 0usize;
        for table in RESOLVABLE_TABLES.iter().chain(["detector_metadata"].iter()) {
            let mut result = with_retry("delete_repository", || {
                self.db
                    .query(format!("DELETE {table} WHERE repo_id = $repo_id RETURN BEFORE"))
                    .bind(("repo_id", repo_id.clone()))
            })
            .await?;
            let deleted: Vec<HashMap<String, JsonValue>> = result.take(0).unwrap_or_default();
            total += deleted.len();
        }
        let mut edges_result = with_retry("delete_repository_edges", || {
            self.db
                .query("DELETE edges WHERE repo_id = $repo_id RETURN BEFORE")
                .bind(("repo_id", repo_id.clone()))
        })
        .await?;
        let deleted_edges: Vec<HashMap<String, JsonValue>> =
            edges_result.take(0).unwrap_or_default();
        total += deleted_edges.len();

        info!(repo_id = %repo_id, entities_deleted = total, "repository deleted from graph");
        Ok(total)
    }

    async fn get_all_file_paths(&self, repo_id: &RepoId) -> anyhow::Result<Vec<String>> {
        let mut result = with_retry("get_all_file_paths", || {
            self.db
                .query("SELECT path FROM file WHERE repo_id = $repo_id")
                .bind(("repo_id", repo_id.clone()))
        })
        .await?;
        let rows: Vec<HashMap<String, JsonValue>> = result.take(0)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.get("path").and_then(|v| v.as_str()).map(str::to_string))
            .collect())
    }

    async fn get_file_metadata(
        &self,
        repo_id: &RepoId,
        path: &str,
    ) -> anyhow::Result<Option<FileFingerprint>> {
        let mut result = with_retry("get_file_metadata", || {
            self.db
                .query(
                    "SELECT content_hash, last_modified FROM file \
                     WHERE repo_id = $repo_id AND path = $path LIMIT 1",
                )
                .bind(("repo_id", repo_id.clone()))
                .bind(("path", path.to_string()))
        })
        .await?;
        let rows: Vec<HashMap<String, JsonValue>> = result.take(0)?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };
        let content_hash = row
            .get("content_hash")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let last_modified = row
            .get("last_modified")
            .and_then(|v| v.as_str())
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(chrono::Utc::now);
        Ok(Some(FileFingerprint {
            content_hash,
            last_modified,
        }))
    }

    async fn create_indexes(&self) -> anyhow::Result<()> {
        for (table, ddl) in NODE_TABLES {
            self.db
                .query(*ddl)
                .await
                .map_err(|e| GraphStoreError::Schema(anyhow::anyhow!("table {table}: {e}")))?;
        }
        self.db
            .query(EDGE_TABLE)
            .await
            .map_err(|e| GraphStoreError::Schema(anyhow::anyhow!("edges table: {e}")))?;
        info!("graph schema indexes created");
        Ok(())
    }

    fn supports_temporal_types(&self) -> bool {
        true
    }

    fn supports_constraints(&self) -> bool {
        true
    }

    fn supports_full_text_index(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::{FileEntity, FunctionEntity, Language};

    #[test]
    fn record_key_is_stable_and_repo_scoped() {
        let a = record_key("acme/web", "src/lib.rs");
        let b = record_key("acme/web", "src/lib.rs");
        let c = record_key("acme/other", "src/lib.rs");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn entity_table_matches_label() {
        let file = GraphEntity::File(FileEntity {
            path: "a.rs".into(),
            repo_id: "r1".into(),
            repo_slug: None,
            language: Language::Rust,
            line_count: 1,
            content_hash: "h".into(),
            last_modified: chrono::Utc::now(),
            is_test: false,
        });
        assert_eq!(entity_table(&file), "file");

        let func = GraphEntity::Function(FunctionEntity {
            qualified_name: "a.b".into(),
            simple_name: "b".into(),
            repo_id: "r1".into(),
            repo_slug: None,
            file_path: "a.rs".into(),
            line_start: 1,
            line_end: 2,
            complexity: 1,
            parameters: vec![],
            return_type: None,
            is_method: false,
            is_static: false,
            is_async: false,
            has_yield: false,
            decorators: vec![],
        });
        assert_eq!(entity_table(&func), "function");
        let content = entity_to_content(&func);
        assert_eq!(content["qualified_name"], "a.b");
    }
}
