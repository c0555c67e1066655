use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use tracing::{debug, warn};

use crate::error::ScanError;

/// Directories never descended into, regardless of include patterns
/// (spec §4.3 step 2).
const EXCLUDED_DIRS: &[&str] = &[".git", "__pycache__", "node_modules", "venv", ".venv", "build", "dist"];

#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Extension/glob patterns a candidate file must match (spec §4.3 step
    /// 1). Default `**/*.py`; callers extend this per the languages they
    /// actually parse.
    pub include_patterns: Vec<String>,
    pub follow_symlinks: bool,
    pub max_file_size_mb: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            include_patterns: vec!["**/*.py".to_string()],
            follow_symlinks: false,
            max_file_size_mb: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Symlink,
    TooLarge,
    PathTraversal,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Symlink => "symlink",
            SkipReason::TooLarge => "too_large",
            SkipReason::PathTraversal => "path_traversal",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SkippedFile {
    /// Repo-relative path (spec §4.3: "Stored paths are always repo-relative").
    pub path: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: String,
    pub absolute_path: PathBuf,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub files: Vec<ScannedFile>,
    pub skipped: Vec<SkippedFile>,
}

fn build_include_set(patterns: &[String]) -> Result<GlobSet, ScanError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| ScanError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| ScanError::InvalidPattern {
        pattern: patterns.join(","),
        source,
    })
}

/// Scans repository root `root` according to spec §4.3's ordered policy
/// chain. `root` itself must not be a symlink; every candidate file is
/// either accepted into `ScanResult::files` or recorded with a reason in
/// `ScanResult::skipped` — nothing is silently dropped.
pub fn scan_repository(root: &Path, config: &ScanConfig) -> Result<ScanResult, ScanError> {
    let root_meta = std::fs::symlink_metadata(root).map_err(|_| ScanError::RootNotFound(root.to_path_buf()))?;
    if root_meta.file_type().is_symlink() {
        return Err(ScanError::RootIsSymlink(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(ScanError::RootNotFound(root.to_path_buf()));
    }

    let canonical_root = root
        .canonicalize()
        .map_err(|source| ScanError::Io { path: root.to_path_buf(), source })?;

    let include_set = build_include_set(&config.include_patterns)?;
    let max_size_bytes = config.max_file_size_mb * 1024 * 1024;

    let mut walker_builder = WalkBuilder::new(root);
    walker_builder
        .hidden(false)
        .git_ignore(false)
        .git_exclude(false)
        .git_global(false)
        .parents(false)
        .ignore(false)
        .follow_links(false) // we apply our own symlink policy per file below
        .filter_entry(|entry| {
            if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
                let name = entry.file_name().to_string_lossy();
                return !EXCLUDED_DIRS.contains(&name.as_ref());
            }
            true
        });

    let mut result = ScanResult::default();

    for entry in walker_builder.build() {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!(error = %err, "scan walker error");
                continue;
            }
        };

        if entry.depth() == 0 {
            continue; // the root itself
        }

        let abs_path = entry.path();
        let is_symlink = entry.path_is_symlink();

        // Follow the link (if any) to find out whether it ultimately names a
        // regular file; directories and symlinks-to-directories are simply
        // not candidates, not rejections.
        let metadata = match std::fs::metadata(abs_path) {
            Ok(m) => m,
            Err(err) => {
                debug!(path = %abs_path.display(), error = %err, "could not stat candidate file");
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }

        if !include_set.is_match(abs_path) {
            continue;
        }

        let rel_path = match abs_path.strip_prefix(root) {
            Ok(p) => p.to_string_lossy().replace('\\', "/"),
            Err(_) => continue,
        };

        if is_symlink && !config.follow_symlinks {
            result.skipped.push(SkippedFile { path: rel_path, reason: SkipReason::Symlink });
            continue;
        }

        if metadata.len() > max_size_bytes {
            result.skipped.push(SkippedFile { path: rel_path, reason: SkipReason::TooLarge });
            continue;
        }

        let canonical = match abs_path.canonicalize() {
            Ok(c) => c,
            Err(_) => {
                result.skipped.push(SkippedFile { path: rel_path, reason: SkipReason::PathTraversal });
                continue;
            }
        };
        if !canonical.starts_with(&canonical_root) {
            warn!(
                path = %rel_path,
                canonical = %canonical.display(),
                security_event = true,
                "path escapes scan root, skipping"
            );
            result.skipped.push(SkippedFile { path: rel_path, reason: SkipReason::PathTraversal });
            continue;
        }

        result.files.push(ScannedFile {
            path: rel_path,
            absolute_path: abs_path.to_path_buf(),
            size_bytes: metadata.len(),
        });
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn collects_matching_files_and_excludes_known_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("node_modules")).unwrap();
        fs::write(tmp.path().join("node_modules/ignored.py"), "x").unwrap();
        fs::write(tmp.path().join("a.py"), "print(1)").unwrap();
        fs::write(tmp.path().join("b.txt"), "not python").unwrap();

        let result = scan_repository(tmp.path(), &ScanConfig::default()).unwrap();
        let paths: Vec<_> = result.files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(paths, vec!["a.py".to_string()]);
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn rejects_oversized_files() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("big.py"), vec![0u8; 200]).unwrap();

        let config = ScanConfig {
            max_file_size_mb: 0,
            ..ScanConfig::default()
        };
        let result = scan_repository(tmp.path(), &config).unwrap();
        assert!(result.files.is_empty());
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].reason, SkipReason::TooLarge);
    }

    #[test]
    fn rejects_root_that_is_itself_a_symlink() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("real");
        fs::create_dir(&target).unwrap();
        let link = tmp.path().join("link");
        #[cfg(unix)]
        std::os::unix::fs::symlink(&target, &link).unwrap();
        #[cfg(unix)]
        {
            let err = scan_repository(&link, &ScanConfig::default()).unwrap_err();
            assert!(matches!(err, ScanError::RootIsSymlink(_)));
        }
    }
}
