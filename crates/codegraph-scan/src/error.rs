use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("repository root is a symlink: {0}")]
    RootIsSymlink(std::path::PathBuf),

    #[error("repository root does not exist or is not a directory: {0}")]
    RootNotFound(std::path::PathBuf),

    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("io error reading {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}
