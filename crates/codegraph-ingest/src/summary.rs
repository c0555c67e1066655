use serde::Serialize;

/// Ingestion report (spec §4.5 step 6).
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestSummary {
    pub files_new: usize,
    pub files_changed: usize,
    pub files_unchanged: usize,
    pub files_deleted: usize,
    pub files_failed: usize,
    pub files_skipped: usize,
    pub duration_sec: f64,
    pub files_per_sec: f64,
    /// Always 0. Dependency-aware re-ingestion of files that import a
    /// changed file is left unimplemented — see DESIGN.md Open Question 4.
    pub propagated: u32,
}
