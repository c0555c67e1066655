pub mod enricher;
pub mod flag;

pub use enricher::GraphEnricher;
pub use flag::{DuplicateFinding, EntityFlag, FlaggedEntity, Hotspot};
