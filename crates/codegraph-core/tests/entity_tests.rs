use codegraph_core::{EntityLabel, FileEntity, GraphEntity, Language, Severity};

fn sample_file() -> FileEntity {
    FileEntity {
        path: "src/lib.rs".into(),
        repo_id: "r1".into(),
        repo_slug: Some("acme".into()),
        language: Language::Rust,
        line_count: 42,
        content_hash: "abc123".into(),
        last_modified: chrono::Utc::now(),
        is_test: false,
    }
}

#[test]
fn file_entity_unique_key_is_path() {
    let entity = GraphEntity::File(sample_file());
    assert_eq!(entity.unique_key(), "src/lib.rs");
    assert_eq!(entity.label(), EntityLabel::File);
    assert_eq!(entity.repo_id(), "r1");
}

#[test]
fn severity_rank_is_monotonic_with_step_up() {
    assert!(Severity::Critical.rank() > Severity::High.rank());
    assert!(Severity::High.rank() > Severity::Medium.rank());
    assert!(Severity::Medium.rank() > Severity::Low.rank());
    assert!(Severity::Low.rank() > Severity::Info.rank());

    assert_eq!(Severity::Medium.step_up().rank(), Severity::High.rank());
    // Critical cannot step up any further.
    assert_eq!(Severity::Critical.step_up().rank(), Severity::Critical.rank());
}
