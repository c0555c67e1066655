use thiserror::Error;

/// `codegraph-graph`'s own seam error, kept separate from
/// `codegraph_core::CodeGraphError` per that type's doc comment.
#[derive(Error, Debug)]
pub enum GraphStoreError {
    #[error("failed to connect to graph backend at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("query failed after {attempts} attempt(s): {source}")]
    QueryFailed {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("edge endpoint not found: {qualified_name} (repo {repo_id})")]
    EndpointNotFound {
        repo_id: String,
        qualified_name: String,
    },

    #[error("schema initialization failed: {0}")]
    Schema(#[source] anyhow::Error),
}

impl GraphStoreError {
    /// Transient faults (connection refused, timeout) are worth retrying;
    /// everything else (missing endpoint, bad schema, query syntax) is
    /// permanent. The retry helper in `retry.rs` queries this instead of
    /// re-deriving the classification by string matching.
    pub fn is_transient(&self) -> bool {
        match self {
            GraphStoreError::Connect { .. } => true,
            GraphStoreError::QueryFailed { source, .. } => is_transient_message(&source.to_string()),
            GraphStoreError::EndpointNotFound { .. } | GraphStoreError::Schema(_) => false,
        }
    }
}

pub(crate) fn is_transient_message(msg: &str) -> bool {
    let msg = msg.to_lowercase();
    msg.contains("connection")
        || msg.contains("timed out")
        || msg.contains("timeout")
        || msg.contains("reset")
        || msg.contains("unavailable")
}
