//! Git repository access for the Job Runner (C9): cloning a remote at a
//! specific commit into a scratch directory, using libgit2.

pub mod errors;
pub mod repo;

pub use errors::{GitIntegrationError, Result};
pub use repo::GitRepository;
