use codegraph_core::Severity;
use codegraph_detect::Finding;

/// Per-category breakdown persisted alongside the overall health score
/// (spec §6.3 `structureScore`/`qualityScore`/`architectureScore`). The
/// spec names these fields but leaves the scoring formula to the
/// implementation (§8 B1 only pins `healthScore = 100` for an
/// empty/finding-free repo) — see DESIGN.md Open Question for the policy
/// chosen here: 100 minus a severity-weighted penalty per finding, floored
/// at 0, independently per category and overall.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthScores {
    pub overall: f32,
    pub structure: f32,
    pub quality: f32,
    pub architecture: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Structure,
    Quality,
    Architecture,
}

/// Maps a detector to the category its findings count against. Unknown
/// detectors (including ones this crate doesn't ship, added later) default
/// to `Quality` — the catch-all bucket for "code smell, not yet classified".
fn category_for(detector: &str) -> Category {
    match detector {
        "FanInDetector" => Category::Architecture,
        "HotspotAmplifierDetector" => Category::Structure,
        _ => Category::Quality,
    }
}

fn penalty(severity: Severity) -> f32 {
    match severity {
        Severity::Critical => 25.0,
        Severity::High => 12.0,
        Severity::Medium => 5.0,
        Severity::Low => 2.0,
        Severity::Info => 0.5,
    }
}

pub fn score(findings: &[Finding]) -> HealthScores {
    let mut structure_penalty = 0.0f32;
    let mut quality_penalty = 0.0f32;
    let mut architecture_penalty = 0.0f32;

    for finding in findings {
        let p = penalty(finding.severity);
        match category_for(&finding.detector) {
            Category::Structure => structure_penalty += p,
            Category::Quality => quality_penalty += p,
            Category::Architecture => architecture_penalty += p,
        }
    }

    let structure = (100.0 - structure_penalty).max(0.0);
    let quality = (100.0 - quality_penalty).max(0.0);
    let architecture = (100.0 - architecture_penalty).max(0.0);
    let overall = (structure + quality + architecture) / 3.0;

    HealthScores { overall, structure, quality, architecture }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_findings_score_one_hundred() {
        let scores = score(&[]);
        assert_eq!(scores.overall, 100.0);
        assert_eq!(scores.structure, 100.0);
        assert_eq!(scores.quality, 100.0);
        assert_eq!(scores.architecture, 100.0);
    }

    #[test]
    fn score_never_goes_negative() {
        let mut findings = Vec::new();
        for i in 0..50 {
            findings.push(Finding {
                id: format!("f{i}"),
                detector: "FanInDetector".to_string(),
                severity: Severity::Critical,
                title: String::new(),
                description: String::new(),
                affected_nodes: Vec::new(),
                affected_files: Vec::new(),
                line_start: None,
                line_end: None,
                suggested_fix: String::new(),
                estimated_effort: String::new(),
                graph_context: Default::default(),
                collaboration_metadata: Vec::new(),
            });
        }
        let scores = score(&findings);
        assert_eq!(scores.architecture, 0.0);
        assert!(scores.overall >= 0.0);
    }
}
