use crate::errors::*;
use git2::{build::RepoBuilder, Object, ObjectType, Oid, Repository, RepositoryOpenFlags};
use std::path::{Path, PathBuf};

/// Thin wrapper around a `git2::Repository`. The Job Runner (C9) uses only
/// `clone_at_commit`; `open` remains for local-path analyses and tests.
pub struct GitRepository {
    path: PathBuf,
    repo: Repository,
}

impl GitRepository {
    /// Clones `remote_url` into `dest` and checks out `commit_sha` in
    /// detached-HEAD state (Job Runner step 2, spec §4.9: "Clone the repo to
    /// a temporary directory at the requested commit"). `dest`'s parent MUST
    /// already exist; `dest` itself must not.
    pub fn clone_at_commit<P: AsRef<Path>>(remote_url: &str, dest: P, commit_sha: &str) -> Result<Self> {
        let dest_ref = dest.as_ref();
        let repo = RepoBuilder::new()
            .clone(remote_url, dest_ref)
            .map_err(GitIntegrationError::Git)?;

        let oid = Oid::from_str(commit_sha).map_err(GitIntegrationError::Git)?;
        let object = repo.find_object(oid, None).map_err(|_| {
            GitIntegrationError::BranchNotFound(format!("commit {commit_sha} not found after clone"))
        })?;
        checkout_detached(&repo, &object)?;

        Ok(Self { path: dest_ref.to_path_buf(), repo })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let repo = Repository::open_ext(
            path_ref,
            RepositoryOpenFlags::empty(),
            &[] as &[&std::ffi::OsStr],
        )
        .map_err(|_| GitIntegrationError::RepoNotFound(path_ref.display().to_string()))?;
        Ok(Self {
            path: path_ref.to_path_buf(),
            repo,
        })
    }

    pub fn init<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Repository::init(path.as_ref())?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            repo,
        })
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn workdir(&self) -> Option<&Path> {
        self.repo.workdir()
    }
}

fn checkout_detached(repo: &Repository, object: &Object<'_>) -> Result<()> {
    let commit = object.peel(ObjectType::Commit).map_err(GitIntegrationError::Git)?;
    repo.set_head_detached(commit.id()).map_err(GitIntegrationError::Git)?;
    let mut opts = git2::build::CheckoutBuilder::new();
    opts.force();
    repo.checkout_head(Some(&mut opts)).map_err(GitIntegrationError::Git)?;
    Ok(())
}
