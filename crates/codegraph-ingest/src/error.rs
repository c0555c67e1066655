use thiserror::Error;

/// Fatal ingestion faults (spec §4.5 failure policy: "Security violations
/// ... are fatal for the whole analysis"). Per-file parse failures are never
/// represented here — they degrade into `IngestSummary::files_failed`.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("repository scan failed: {0}")]
    Scan(#[from] codegraph_scan::ScanError),

    #[error("graph store operation failed: {0}")]
    Graph(anyhow::Error),
}
