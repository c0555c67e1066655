use thiserror::Error;

/// Shared error type for the entity/config/trait surface owned by
/// `codegraph-core`. Components with a more specific failure shape define
/// their own `thiserror` enum at their seam (`GraphStoreError` in
/// `codegraph-graph`, `TenantError` in `codegraph-tenant`, `ScanError` in
/// `codegraph-scan`, `IngestError`, `DetectorError`, `JobError`) rather than
/// growing this one into a god-enum.
#[derive(Error, Debug)]
pub enum CodeGraphError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, CodeGraphError>;
