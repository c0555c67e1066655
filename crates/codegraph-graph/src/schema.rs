//! DDL applied once per tenant database by `create_indexes` (spec §4.1).
//!
//! Kept as plain `DEFINE ...` strings rather than a builder abstraction —
//! there is no caller here that needs to compose field definitions
//! programmatically.

pub const NODE_TABLES: &[(&str, &str)] = &[
    (
        "file",
        r#"
        DEFINE TABLE IF NOT EXISTS file SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS path ON TABLE file TYPE string;
        DEFINE FIELD IF NOT EXISTS repo_id ON TABLE file TYPE string;
        DEFINE FIELD IF NOT EXISTS repo_slug ON TABLE file TYPE option<string>;
        DEFINE FIELD IF NOT EXISTS language ON TABLE file TYPE string;
        DEFINE FIELD IF NOT EXISTS line_count ON TABLE file TYPE number;
        DEFINE FIELD IF NOT EXISTS content_hash ON TABLE file TYPE string;
        DEFINE FIELD IF NOT EXISTS last_modified ON TABLE file TYPE datetime;
        DEFINE FIELD IF NOT EXISTS is_test ON TABLE file TYPE bool;
        DEFINE INDEX IF NOT EXISTS idx_file_repo ON TABLE file COLUMNS repo_id;
        DEFINE INDEX IF NOT EXISTS idx_file_repo_path ON TABLE file COLUMNS repo_id, path UNIQUE;
        "#,
    ),
    (
        "module",
        r#"
        DEFINE TABLE IF NOT EXISTS module SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS qualified_name ON TABLE module TYPE string;
        DEFINE FIELD IF NOT EXISTS repo_id ON TABLE module TYPE string;
        DEFINE FIELD IF NOT EXISTS repo_slug ON TABLE module TYPE option<string>;
        DEFINE FIELD IF NOT EXISTS is_external ON TABLE module TYPE bool;
        DEFINE INDEX IF NOT EXISTS idx_module_repo ON TABLE module COLUMNS repo_id;
        DEFINE INDEX IF NOT EXISTS idx_module_repo_qn ON TABLE module COLUMNS repo_id, qualified_name UNIQUE;
        "#,
    ),
    (
        "class",
        r#"
        DEFINE TABLE IF NOT EXISTS class SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS qualified_name ON TABLE class TYPE string;
        DEFINE FIELD IF NOT EXISTS simple_name ON TABLE class TYPE string;
        DEFINE FIELD IF NOT EXISTS repo_id ON TABLE class TYPE string;
        DEFINE FIELD IF NOT EXISTS repo_slug ON TABLE class TYPE option<string>;
        DEFINE FIELD IF NOT EXISTS file_path ON TABLE class TYPE string;
        DEFINE FIELD IF NOT EXISTS line_start ON TABLE class TYPE number;
        DEFINE FIELD IF NOT EXISTS line_end ON TABLE class TYPE number;
        DEFINE FIELD IF NOT EXISTS is_abstract ON TABLE class TYPE bool;
        DEFINE FIELD IF NOT EXISTS is_exception ON TABLE class TYPE bool;
        DEFINE FIELD IF NOT EXISTS is_dataclass ON TABLE class TYPE bool;
        DEFINE FIELD IF NOT EXISTS nesting_level ON TABLE class TYPE number;
        DEFINE INDEX IF NOT EXISTS idx_class_repo ON TABLE class COLUMNS repo_id;
        DEFINE INDEX IF NOT EXISTS idx_class_repo_qn ON TABLE class COLUMNS repo_id, qualified_name UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_class_repo_file ON TABLE class COLUMNS repo_id, file_path;
        "#,
    ),
    (
        "function",
        r#"
        DEFINE TABLE IF NOT EXISTS function SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS qualified_name ON TABLE function TYPE string;
        DEFINE FIELD IF NOT EXISTS simple_name ON TABLE function TYPE string;
        DEFINE FIELD IF NOT EXISTS repo_id ON TABLE function TYPE string;
        DEFINE FIELD IF NOT EXISTS repo_slug ON TABLE function TYPE option<string>;
        DEFINE FIELD IF NOT EXISTS file_path ON TABLE function TYPE string;
        DEFINE FIELD IF NOT EXISTS line_start ON TABLE function TYPE number;
        DEFINE FIELD IF NOT EXISTS line_end ON TABLE function TYPE number;
        DEFINE FIELD IF NOT EXISTS complexity ON TABLE function TYPE number;
        DEFINE FIELD IF NOT EXISTS parameters ON TABLE function TYPE array<string>;
        DEFINE FIELD IF NOT EXISTS return_type ON TABLE function TYPE option<string>;
        DEFINE FIELD IF NOT EXISTS is_method ON TABLE function TYPE bool;
        DEFINE FIELD IF NOT EXISTS is_static ON TABLE function TYPE bool;
        DEFINE FIELD IF NOT EXISTS is_async ON TABLE function TYPE bool;
        DEFINE FIELD IF NOT EXISTS has_yield ON TABLE function TYPE bool;
        DEFINE FIELD IF NOT EXISTS decorators ON TABLE function TYPE array<string>;
        DEFINE INDEX IF NOT EXISTS idx_function_repo ON TABLE function COLUMNS repo_id;
        DEFINE INDEX IF NOT EXISTS idx_function_repo_qn ON TABLE function COLUMNS repo_id, qualified_name UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_function_repo_file ON TABLE function COLUMNS repo_id, file_path;
        DEFINE INDEX IF NOT EXISTS idx_function_complexity ON TABLE function COLUMNS repo_id, complexity;
        "#,
    ),
    (
        "detector_metadata",
        r#"
        DEFINE TABLE IF NOT EXISTS detector_metadata SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS repo_id ON TABLE detector_metadata TYPE string;
        DEFINE FIELD IF NOT EXISTS entity_qualified_name ON TABLE detector_metadata TYPE string;
        DEFINE FIELD IF NOT EXISTS detector ON TABLE detector_metadata TYPE string;
        DEFINE FIELD IF NOT EXISTS severity ON TABLE detector_metadata TYPE string;
        DEFINE FIELD IF NOT EXISTS issues ON TABLE detector_metadata TYPE array<string>;
        DEFINE FIELD IF NOT EXISTS confidence ON TABLE detector_metadata TYPE float;
        DEFINE FIELD IF NOT EXISTS timestamp ON TABLE detector_metadata TYPE datetime;
        DEFINE FIELD IF NOT EXISTS metadata_json ON TABLE detector_metadata TYPE option<string>;
        DEFINE FIELD IF NOT EXISTS composite_key ON TABLE detector_metadata TYPE string;
        DEFINE INDEX IF NOT EXISTS idx_detmeta_repo ON TABLE detector_metadata COLUMNS repo_id;
        DEFINE INDEX IF NOT EXISTS idx_detmeta_entity ON TABLE detector_metadata COLUMNS repo_id, entity_qualified_name;
        DEFINE INDEX IF NOT EXISTS idx_detmeta_severity ON TABLE detector_metadata COLUMNS repo_id, severity;
        DEFINE INDEX IF NOT EXISTS idx_detmeta_key ON TABLE detector_metadata
            COLUMNS repo_id, composite_key UNIQUE;
        "#,
    ),
    (
        "builtin_function",
        r#"
        DEFINE TABLE IF NOT EXISTS builtin_function SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS qualified_name ON TABLE builtin_function TYPE string;
        DEFINE FIELD IF NOT EXISTS repo_id ON TABLE builtin_function TYPE string;
        DEFINE INDEX IF NOT EXISTS idx_builtin_repo_qn ON TABLE builtin_function COLUMNS repo_id, qualified_name UNIQUE;
        "#,
    ),
    (
        "external_function",
        r#"
        DEFINE TABLE IF NOT EXISTS external_function SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS qualified_name ON TABLE external_function TYPE string;
        DEFINE FIELD IF NOT EXISTS repo_id ON TABLE external_function TYPE string;
        DEFINE INDEX IF NOT EXISTS idx_extfn_repo_qn ON TABLE external_function COLUMNS repo_id, qualified_name UNIQUE;
        "#,
    ),
    (
        "external_class",
        r#"
        DEFINE TABLE IF NOT EXISTS external_class SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS qualified_name ON TABLE external_class TYPE string;
        DEFINE FIELD IF NOT EXISTS repo_id ON TABLE external_class TYPE string;
        DEFINE INDEX IF NOT EXISTS idx_extclass_repo_qn ON TABLE external_class COLUMNS repo_id, qualified_name UNIQUE;
        "#,
    ),
];

pub const EDGE_TABLE: &str = r#"
    DEFINE TABLE IF NOT EXISTS edges SCHEMAFULL;
    DEFINE FIELD IF NOT EXISTS repo_id ON TABLE edges TYPE string;
    DEFINE FIELD IF NOT EXISTS in ON TABLE edges TYPE record;
    DEFINE FIELD IF NOT EXISTS out ON TABLE edges TYPE record;
    DEFINE FIELD IF NOT EXISTS edge_type ON TABLE edges TYPE string;
    DEFINE FIELD IF NOT EXISTS metadata ON TABLE edges TYPE option<object>;
    DEFINE FIELD IF NOT EXISTS created_at ON TABLE edges TYPE datetime DEFAULT time::now();
    DEFINE INDEX IF NOT EXISTS idx_edges_repo ON TABLE edges COLUMNS repo_id;
    DEFINE INDEX IF NOT EXISTS idx_edges_in ON TABLE edges COLUMNS in;
    DEFINE INDEX IF NOT EXISTS idx_edges_out ON TABLE edges COLUMNS out;
    DEFINE INDEX IF NOT EXISTS idx_edges_type ON TABLE edges COLUMNS repo_id, edge_type;
"#;

/// Tables consulted, in order, when `batch_create_relationships` resolves an
/// edge endpoint named only by qualified name (spec §4.1, invariant I2: never
/// materialize a missing internal endpoint — only match what already exists).
///
/// `detector_metadata` is last: its endpoints are named by the composite
/// `"{entityQualifiedName}::{detector}"` key (see `GraphEntity::unique_key`),
/// matched against the denormalized `composite_key` field rather than
/// `qualified_name`/`path` — see `resolve_endpoint`'s `key_field` match.
pub const RESOLVABLE_TABLES: &[&str] = &[
    "file",
    "function",
    "class",
    "module",
    "builtin_function",
    "external_function",
    "external_class",
    "detector_metadata",
];
