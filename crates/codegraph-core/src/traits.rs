use crate::{
    ClassEntity, DetectorMetadata, EdgeRelationship, FileEntity, FunctionEntity, ModuleEntity,
    RepoId,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// One row of a query result: a homogeneous, string-keyed map (spec §4.1
/// `executeQuery(query, params, timeout?) -> rows`).
pub type QueryRow = HashMap<String, serde_json::Value>;

/// Anything `batchCreateNodes` can be handed — one variant per label in
/// spec §3.1, grouped by the adapter before it issues one bulk statement per
/// label (spec §4.1).
#[derive(Debug, Clone)]
pub enum GraphEntity {
    File(FileEntity),
    Module(ModuleEntity),
    Class(ClassEntity),
    Function(FunctionEntity),
    DetectorMetadata(DetectorMetadata),
}

impl GraphEntity {
    pub fn label(&self) -> crate::EntityLabel {
        match self {
            GraphEntity::File(_) => crate::EntityLabel::File,
            GraphEntity::Module(_) => crate::EntityLabel::Module,
            GraphEntity::Class(_) => crate::EntityLabel::Class,
            GraphEntity::Function(_) => crate::EntityLabel::Function,
            GraphEntity::DetectorMetadata(_) => crate::EntityLabel::DetectorMetadata,
        }
    }

    /// The unique key used for MERGE: `filePath` for File, `qualifiedName`
    /// for Module/Class/Function (spec §4.1), and `(entityQualifiedName,
    /// detector)` for DetectorMetadata — a single entity can be flagged by
    /// more than one detector, so `entityQualifiedName` alone is not unique.
    pub fn unique_key(&self) -> String {
        match self {
            GraphEntity::File(f) => f.path.clone(),
            GraphEntity::Module(m) => m.qualified_name.clone(),
            GraphEntity::Class(c) => c.qualified_name.clone(),
            GraphEntity::Function(f) => f.qualified_name.clone(),
            GraphEntity::DetectorMetadata(d) => format!("{}::{}", d.entity_qualified_name, d.detector),
        }
    }

    pub fn repo_id(&self) -> &RepoId {
        match self {
            GraphEntity::File(f) => &f.repo_id,
            GraphEntity::Module(m) => &m.repo_id,
            GraphEntity::Class(c) => &c.repo_id,
            GraphEntity::Function(f) => &f.repo_id,
            GraphEntity::DetectorMetadata(d) => &d.repo_id,
        }
    }
}

/// Stored fingerprint used by the Ingestion Pipeline's incremental diff
/// (spec §4.5 step 3).
#[derive(Debug, Clone, PartialEq)]
pub struct FileFingerprint {
    pub content_hash: String,
    pub last_modified: chrono::DateTime<chrono::Utc>,
}

/// Uniform operations over a property-graph backend (spec §4.1, C1). The
/// concrete implementation (`codegraph-graph::SurrealGraphStore`) is wired
/// in by the Tenant Factory; everything above this trait — ingestion, the
/// query cache, the enricher, detectors — is backend-agnostic.
///
/// Implementations are expected to retry transient faults internally
/// (connection refused, socket/server timeout) with exponential backoff and
/// to propagate permanent faults (syntax, constraint violation) after the
/// first failure, per spec §4.1 and §7.
#[async_trait]
pub trait GraphStoreAdapter: Send + Sync {
    async fn execute_query(
        &self,
        query: &str,
        params: QueryRow,
        timeout: Option<Duration>,
    ) -> anyhow::Result<Vec<QueryRow>>;

    /// Groups by label, MERGEs on each label's unique key, ON MATCH
    /// reassigns all mapped properties. Returns the number of entities
    /// written. Idempotent under repeated application (invariant I3).
    async fn batch_create_nodes(&self, entities: Vec<GraphEntity>) -> anyhow::Result<usize>;

    /// Groups by relationship type, partitions into internal/external
    /// endpoints, and MERGEs edges. MUST NOT invent a missing internal
    /// endpoint (invariant I2).
    async fn batch_create_relationships(
        &self,
        rels: Vec<EdgeRelationship>,
        repo_id: &RepoId,
    ) -> anyhow::Result<usize>;

    async fn delete_file_entities(&self, repo_id: &RepoId, path: &str) -> anyhow::Result<usize>;

    async fn delete_repository(&self, repo_id: &RepoId) -> anyhow::Result<usize>;

    async fn get_all_file_paths(&self, repo_id: &RepoId) -> anyhow::Result<Vec<String>>;

    async fn get_file_metadata(
        &self,
        repo_id: &RepoId,
        path: &str,
    ) -> anyhow::Result<Option<FileFingerprint>>;

    async fn create_indexes(&self) -> anyhow::Result<()>;

    fn supports_temporal_types(&self) -> bool;
    fn supports_constraints(&self) -> bool;
    fn supports_full_text_index(&self) -> bool;
}

/// Parser Bridge contract (spec §4.4, C4) — an external collaborator. The
/// bridge is allowed to fail per file; callers add the file to
/// `skippedFiles` with reason `parse_error` rather than aborting.
#[async_trait]
pub trait ParserBridge: Send + Sync {
    async fn parse(&self, repo_relative_path: &str, bytes: &[u8]) -> anyhow::Result<crate::ExtractionResult>;
    fn supported_languages(&self) -> Vec<crate::Language>;
}

/// Progress sink used by the Ingestion Pipeline (spec §4.5) and the Job
/// Runner (spec §4.9 step 8, flushed at most every ~500ms).
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, percent: u8, current_step: &str);
}

/// No-op sink for callers that don't care about progress.
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn on_progress(&self, _percent: u8, _current_step: &str) {}
}
