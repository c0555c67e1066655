pub mod error;
pub mod hashing;
pub mod scanner;

pub use error::ScanError;
pub use hashing::content_hash;
pub use scanner::{scan_repository, ScanConfig, ScanResult, ScannedFile, SkipReason, SkippedFile};
