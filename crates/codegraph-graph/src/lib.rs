pub mod error;
pub mod retry;
pub mod schema;
pub mod store;

pub use error::GraphStoreError;
pub use store::SurrealGraphStore;
