pub mod query_cache;
pub mod stats;

pub use query_cache::{ClassSummary, FileSummary, FunctionSummary, QueryCache};
pub use stats::CacheStats;
