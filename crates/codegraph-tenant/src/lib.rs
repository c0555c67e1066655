pub mod client;
pub mod error;
pub mod factory;
pub mod naming;

pub use client::TenantClient;
pub use error::TenantError;
pub use factory::GraphClientFactory;
pub use naming::generate_graph_name;
