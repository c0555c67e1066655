use codegraph_core::Severity;
use std::collections::HashMap;

/// One detector's corroborating signal on a finding another detector raised
/// (spec §4.8: `collaborationMetadata[]`). `confidence` is expected in
/// `[0, 1]`; the scheduler doesn't enforce that, detectors are trusted to.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CollaborationMetadata {
    pub detector: String,
    pub confidence: f32,
    pub evidence: Vec<String>,
    pub tags: Vec<String>,
}

/// One detector result (spec §4.8). `graph_context` is an opaque,
/// detector-specific bag of facts shown alongside the finding (sample
/// callers, complexity numbers, churn counts) — never interpreted by the
/// scheduler itself.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Finding {
    pub id: String,
    pub detector: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub affected_nodes: Vec<String>,
    pub affected_files: Vec<String>,
    pub line_start: Option<u32>,
    pub line_end: Option<u32>,
    pub suggested_fix: String,
    pub estimated_effort: String,
    pub graph_context: HashMap<String, serde_json::Value>,
    pub collaboration_metadata: Vec<CollaborationMetadata>,
}

impl Finding {
    /// Ordering guarantee from spec §5: `(severity desc, detector, id)`.
    pub fn sort_key(&self) -> (std::cmp::Reverse<u8>, String, String) {
        (
            std::cmp::Reverse(self.severity.rank()),
            self.detector.clone(),
            self.id.clone(),
        )
    }
}

/// Sorts findings in place per spec §5's ordering guarantee.
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}
