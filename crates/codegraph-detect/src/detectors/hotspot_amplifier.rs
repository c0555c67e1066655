use crate::detector::{Detector, DetectorContext};
use crate::finding::{CollaborationMetadata, Finding};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;

/// Phase-2 detector: amplifies severity on entities multiple independent
/// detectors already flagged (spec §4.8: "a hotspot detector amplifies
/// complexity findings on files also flagged for churn"). Reads the
/// enricher's accumulated flags rather than re-deriving anything from the
/// graph itself.
pub struct HotspotAmplifierDetector {
    pub min_detectors: usize,
}

impl Default for HotspotAmplifierDetector {
    fn default() -> Self {
        Self { min_detectors: 2 }
    }
}

#[async_trait]
impl Detector for HotspotAmplifierDetector {
    fn name(&self) -> &'static str {
        "HotspotAmplifierDetector"
    }

    fn needs_previous_findings(&self) -> bool {
        true
    }

    async fn detect(&self, ctx: &DetectorContext) -> Vec<Finding> {
        let hotspots = ctx
            .enricher
            .find_hotspots(self.min_detectors, None, None)
            .await;

        hotspots
            .into_iter()
            .map(|hotspot| {
                let amplified = hotspot.severity.step_up();

                let mut affected_files: Vec<String> = ctx
                    .previous_findings
                    .iter()
                    .filter(|f| {
                        f.affected_nodes
                            .iter()
                            .any(|n| n == &hotspot.entity_qualified_name)
                    })
                    .flat_map(|f| f.affected_files.clone())
                    .collect();
                affected_files.sort();
                affected_files.dedup();

                let mut graph_context = HashMap::new();
                graph_context.insert("detector_count".to_string(), json!(hotspot.detector_count));
                graph_context.insert("detectors".to_string(), json!(hotspot.detectors));
                graph_context.insert("avg_confidence".to_string(), json!(hotspot.avg_confidence));

                Finding {
                    id: format!("hotspot::{}", hotspot.entity_qualified_name),
                    detector: self.name().to_string(),
                    severity: amplified,
                    title: format!("Hotspot: {}", hotspot.entity_qualified_name),
                    description: format!(
                        "'{}' was independently flagged by {} detectors ({}); severity \
                         amplified from {} to {}.",
                        hotspot.entity_qualified_name,
                        hotspot.detector_count,
                        hotspot.detectors.join(", "),
                        hotspot.severity,
                        amplified
                    ),
                    affected_nodes: vec![hotspot.entity_qualified_name.clone()],
                    affected_files,
                    line_start: None,
                    line_end: None,
                    suggested_fix: "Multiple independent signals point at this entity; \
                         prioritize it over single-detector findings of the same severity."
                        .to_string(),
                    estimated_effort: "Varies with the underlying findings".to_string(),
                    graph_context,
                    collaboration_metadata: hotspot
                        .detectors
                        .iter()
                        .map(|d| CollaborationMetadata {
                            detector: d.clone(),
                            confidence: hotspot.avg_confidence,
                            evidence: hotspot.issues.clone(),
                            tags: vec!["hotspot".to_string()],
                        })
                        .collect(),
                }
            })
            .collect()
    }
}
