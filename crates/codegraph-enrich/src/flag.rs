use codegraph_core::Severity;

/// One detector's flag on one entity, as returned by `getEntityFlags`.
#[derive(Debug, Clone)]
pub struct EntityFlag {
    pub detector: String,
    pub severity: Severity,
    pub issues: Vec<String>,
    pub confidence: f32,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub metadata: Option<serde_json::Value>,
}

/// A flag paired with the entity it's attached to, as returned by
/// `getFlaggedEntities`.
#[derive(Debug, Clone)]
pub struct FlaggedEntity {
    pub entity_qualified_name: String,
    pub flag: EntityFlag,
}

/// One entity's flags from two or more detectors (spec §4.7
/// `getDuplicateFindings`).
#[derive(Debug, Clone)]
pub struct DuplicateFinding {
    pub entity_qualified_name: String,
    pub detector: String,
    pub severity: Severity,
    pub confidence: f32,
    pub all_detectors: Vec<String>,
}

/// Repo-wide ranking entry from `findHotspots`: an entity flagged by several
/// detectors, aggregated across all of them.
#[derive(Debug, Clone)]
pub struct Hotspot {
    pub entity_qualified_name: String,
    pub detector_count: usize,
    pub detectors: Vec<String>,
    pub avg_confidence: f32,
    pub severity: Severity,
    pub issues: Vec<String>,
}
