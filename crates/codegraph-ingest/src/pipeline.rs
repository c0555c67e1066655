use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use codegraph_core::{
    EdgeRelationship, FileEntity, GraphEntity, GraphStoreAdapter, NullProgressSink, ParserBridge,
    ProgressSink, RepoId,
};
use codegraph_scan::{content_hash, scan_repository, ScanConfig, ScannedFile};
use tracing::{debug, info, warn};

use crate::error::IngestError;
use crate::language::{detect_language, looks_like_test_path};
use crate::summary::IngestSummary;

/// Per-run configuration for the Ingestion Pipeline (spec §4.5 inputs).
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub repo_id: RepoId,
    pub repo_slug: Option<String>,
    pub incremental: bool,
    pub batch_size: usize,
}

impl IngestConfig {
    pub fn new(repo_id: impl Into<RepoId>) -> Self {
        Self {
            repo_id: repo_id.into(),
            repo_slug: None,
            incremental: true,
            batch_size: 100,
        }
    }
}

/// Runs the full scan -> diff -> parse -> batch-load -> flush -> report
/// pipeline against one tenant-scoped graph client (spec §4.5).
pub async fn ingest(
    root: &Path,
    scan_config: &ScanConfig,
    ingest_config: &IngestConfig,
    graph: &dyn GraphStoreAdapter,
    parser: &dyn ParserBridge,
    progress: Option<&dyn ProgressSink>,
) -> Result<IngestSummary, IngestError> {
    let null_sink = NullProgressSink;
    let progress = progress.unwrap_or(&null_sink);
    let start = Instant::now();

    graph.create_indexes().await.map_err(IngestError::Graph)?;

    let scan_result = scan_repository(root, scan_config)?;
    let files_skipped = scan_result.skipped.len();
    info!(
        found = scan_result.files.len(),
        skipped = files_skipped,
        "repository scanned"
    );

    let mut files_new = 0usize;
    let mut files_changed = 0usize;
    let mut files_unchanged = 0usize;
    let mut files_deleted = 0usize;

    let to_process: Vec<&ScannedFile> = if ingest_config.incremental {
        let mut changed_or_new = Vec::new();
        for file in &scan_result.files {
            let bytes = match std::fs::read(&file.absolute_path) {
                Ok(b) => b,
                Err(err) => {
                    warn!(path = %file.path, error = %err, "could not read file during diff, treating as failed");
                    continue;
                }
            };
            let hash = content_hash(&bytes);
            let existing = graph
                .get_file_metadata(&ingest_config.repo_id, &file.path)
                .await
                .map_err(IngestError::Graph)?;

            match existing {
                None => {
                    files_new += 1;
                    changed_or_new.push(file);
                }
                Some(meta) if meta.content_hash == hash => {
                    files_unchanged += 1;
                }
                Some(_) => {
                    graph
                        .delete_file_entities(&ingest_config.repo_id, &file.path)
                        .await
                        .map_err(IngestError::Graph)?;
                    files_changed += 1;
                    changed_or_new.push(file);
                }
            }
        }

        let scanned_paths: HashSet<&str> =
            scan_result.files.iter().map(|f| f.path.as_str()).collect();
        let db_paths = graph
            .get_all_file_paths(&ingest_config.repo_id)
            .await
            .map_err(IngestError::Graph)?;
        for db_path in db_paths {
            if !scanned_paths.contains(db_path.as_str()) {
                graph
                    .delete_file_entities(&ingest_config.repo_id, &db_path)
                    .await
                    .map_err(IngestError::Graph)?;
                files_deleted += 1;
            }
        }

        changed_or_new
    } else {
        scan_result.files.iter().collect()
    };

    let total = to_process.len();
    let mut files_failed = 0usize;
    let mut node_buffer: Vec<GraphEntity> = Vec::new();
    let mut rel_buffer: Vec<EdgeRelationship> = Vec::new();

    for (i, file) in to_process.iter().enumerate() {
        progress.on_progress((((i + 1) * 100) / total.max(1)) as u8, &file.path);

        let bytes = match std::fs::read(&file.absolute_path) {
            Ok(b) => b,
            Err(err) => {
                warn!(path = %file.path, error = %err, "failed to read file, skipping");
                files_failed += 1;
                continue;
            }
        };

        match parser.parse(&file.path, &bytes).await {
            Ok(mut extraction) => {
                for module in extraction.modules.iter_mut() {
                    module.repo_id = ingest_config.repo_id.clone();
                    module.repo_slug = ingest_config.repo_slug.clone();
                }
                for class in extraction.classes.iter_mut() {
                    class.repo_id = ingest_config.repo_id.clone();
                    class.repo_slug = ingest_config.repo_slug.clone();
                    class.file_path = file.path.clone();
                }
                for function in extraction.functions.iter_mut() {
                    function.repo_id = ingest_config.repo_id.clone();
                    function.repo_slug = ingest_config.repo_slug.clone();
                    function.file_path = file.path.clone();
                }

                let file_entity = FileEntity {
                    path: file.path.clone(),
                    repo_id: ingest_config.repo_id.clone(),
                    repo_slug: ingest_config.repo_slug.clone(),
                    language: detect_language(&file.path),
                    line_count: count_lines(&bytes),
                    content_hash: content_hash(&bytes),
                    last_modified: Utc::now(),
                    is_test: looks_like_test_path(&file.path),
                };

                node_buffer.push(GraphEntity::File(file_entity));
                node_buffer.extend(extraction.modules.into_iter().map(GraphEntity::Module));
                node_buffer.extend(extraction.classes.into_iter().map(GraphEntity::Class));
                node_buffer.extend(extraction.functions.into_iter().map(GraphEntity::Function));
                rel_buffer.extend(extraction.relationships);
            }
            Err(err) => {
                warn!(path = %file.path, error = %err, "parse_error");
                files_failed += 1;
            }
        }

        if node_buffer.len() >= ingest_config.batch_size {
            flush(graph, &ingest_config.repo_id, &mut node_buffer, &mut rel_buffer).await?;
        }
    }

    flush(graph, &ingest_config.repo_id, &mut node_buffer, &mut rel_buffer).await?;

    let duration_sec = start.elapsed().as_secs_f64();
    let summary = IngestSummary {
        files_new,
        files_changed,
        files_unchanged,
        files_deleted,
        files_failed,
        files_skipped,
        duration_sec,
        files_per_sec: if duration_sec > 0.0 { total as f64 / duration_sec } else { 0.0 },
        propagated: 0,
    };
    debug!(?summary, "ingestion complete");
    Ok(summary)
}

async fn flush(
    graph: &dyn GraphStoreAdapter,
    repo_id: &RepoId,
    nodes: &mut Vec<GraphEntity>,
    rels: &mut Vec<EdgeRelationship>,
) -> Result<(), IngestError> {
    if !nodes.is_empty() {
        let written = graph
            .batch_create_nodes(std::mem::take(nodes))
            .await
            .map_err(IngestError::Graph)?;
        debug!(written, "flushed node batch");
    }
    if !rels.is_empty() {
        let written = graph
            .batch_create_relationships(std::mem::take(rels), repo_id)
            .await
            .map_err(IngestError::Graph)?;
        debug!(written, "flushed relationship batch");
    }
    Ok(())
}

fn count_lines(bytes: &[u8]) -> u32 {
    String::from_utf8_lossy(bytes).lines().count() as u32
}
