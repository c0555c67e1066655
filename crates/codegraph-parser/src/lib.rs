pub mod bridge;
pub mod complexity;
pub mod languages;

pub use bridge::TreeSitterBridge;
