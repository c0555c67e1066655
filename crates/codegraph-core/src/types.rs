use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Stable identifier for a repository within a tenant graph (GLOSSARY: RepoId).
/// Every persisted node carries this tag; every query the core issues filters
/// on it in addition to the tenant graph boundary (spec §3.1).
pub type RepoId = String;

pub type NodeId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Rust,
    Python,
    TypeScript,
    JavaScript,
    Go,
    Java,
    Cpp,
    Other,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Go => "go",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// The five node labels from spec §3.1. `label()` is used anywhere batch
/// operations need to group entities (C1's `batchCreateNodes`/index creation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityLabel {
    File,
    Module,
    Class,
    Function,
    DetectorMetadata,
    /// External call/reference target materialized per invariant I2.
    BuiltinFunction,
    ExternalFunction,
    ExternalClass,
}

impl EntityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityLabel::File => "File",
            EntityLabel::Module => "Module",
            EntityLabel::Class => "Class",
            EntityLabel::Function => "Function",
            EntityLabel::DetectorMetadata => "DetectorMetadata",
            EntityLabel::BuiltinFunction => "BuiltinFunction",
            EntityLabel::ExternalFunction => "ExternalFunction",
            EntityLabel::ExternalClass => "ExternalClass",
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(
            self,
            EntityLabel::BuiltinFunction
                | EntityLabel::ExternalFunction
                | EntityLabel::ExternalClass
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    Contains,
    Calls,
    Uses,
    Imports,
    ImportedBy,
    Inherits,
    FlaggedBy,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Contains => "CONTAINS",
            EdgeType::Calls => "CALLS",
            EdgeType::Uses => "USES",
            EdgeType::Imports => "IMPORTS",
            EdgeType::ImportedBy => "IMPORTED_BY",
            EdgeType::Inherits => "INHERITS",
            EdgeType::FlaggedBy => "FLAGGED_BY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntity {
    pub path: String,
    pub repo_id: RepoId,
    pub repo_slug: Option<String>,
    pub language: Language,
    pub line_count: u32,
    pub content_hash: String,
    pub last_modified: chrono::DateTime<chrono::Utc>,
    pub is_test: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleEntity {
    pub qualified_name: String,
    pub repo_id: RepoId,
    pub repo_slug: Option<String>,
    pub is_external: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassEntity {
    pub qualified_name: String,
    pub simple_name: String,
    pub repo_id: RepoId,
    pub repo_slug: Option<String>,
    pub file_path: String,
    pub line_start: u32,
    pub line_end: u32,
    pub is_abstract: bool,
    pub is_exception: bool,
    pub is_dataclass: bool,
    pub nesting_level: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionEntity {
    pub qualified_name: String,
    pub simple_name: String,
    pub repo_id: RepoId,
    pub repo_slug: Option<String>,
    pub file_path: String,
    pub line_start: u32,
    pub line_end: u32,
    pub complexity: u32,
    pub parameters: Vec<String>,
    pub return_type: Option<String>,
    pub is_method: bool,
    pub is_static: bool,
    pub is_async: bool,
    pub has_yield: bool,
    pub decorators: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    /// Total order used by the aggregation sort in spec §5 ("Ordering
    /// guarantees"): `(severity desc, detector, id)`.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 4,
            Severity::High => 3,
            Severity::Medium => 2,
            Severity::Low => 1,
            Severity::Info => 0,
        }
    }

    pub fn step_up(&self) -> Severity {
        match self {
            Severity::Critical => Severity::Critical,
            Severity::High => Severity::Critical,
            Severity::Medium => Severity::High,
            Severity::Low => Severity::Medium,
            Severity::Info => Severity::Low,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            "info" => Ok(Severity::Info),
            other => Err(format!("unknown severity {other:?}")),
        }
    }
}

/// DetectorMetadata node (spec §3.1). The metadata payload itself stays an
/// opaque JSON string end to end (§9: "JSON-blob metadata on graph nodes ...
/// chosen intentionally to decouple detector evolution from graph schema").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorMetadata {
    pub id: Uuid,
    pub repo_id: RepoId,
    pub entity_qualified_name: String,
    pub detector: String,
    pub severity: Severity,
    pub issues: Vec<String>,
    pub confidence: f32,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub metadata_json: Option<String>,
}

/// A relationship discovered by the Parser Bridge (C4). `to` names the
/// target by qualified name; internal/external resolution happens in C1's
/// `batchCreateRelationships` (spec §4.1, invariant I2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRelationship {
    pub from: String,
    pub to: String,
    pub edge_type: EdgeType,
    pub metadata: HashMap<String, String>,
}

/// Neutral parse result returned by the Parser Bridge for one file.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub modules: Vec<ModuleEntity>,
    pub classes: Vec<ClassEntity>,
    pub functions: Vec<FunctionEntity>,
    pub relationships: Vec<EdgeRelationship>,
}
