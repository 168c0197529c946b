// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Shallow clones of GitHub repositories into ephemeral workspaces.

use std::path::Path;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, io_error};

/// Prefix of every workspace directory name.
const WORKSPACE_PREFIX: &str = "ghloc-";

/// Placeholder substituted for credentials in subprocess output.
const REDACTED: &str = "***";

/// Temporary checkout owned by a single pipeline invocation.
///
/// The directory and everything beneath it is removed when the workspace is
/// dropped, whichever way the owning invocation ends.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir
}

impl Workspace {
    /// Creates a fresh, uniquely named directory under the system temp dir.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the directory cannot be created.
    pub fn create() -> Result<Self, Error> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir()
            .map_err(|source| io_error(&std::env::temp_dir(), source))?;
        Ok(Self {
            dir
        })
    }

    /// Root of the checkout.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Materializes a repository snapshot on local disk.
#[async_trait]
pub trait RepositoryFetcher: Send + Sync {
    /// Fetches `owner/repo` using `token` for authentication.
    async fn fetch(&self, owner: &str, repo: &str, token: &str) -> Result<Workspace, Error>;
}

/// [`RepositoryFetcher`] that shells out to `git clone --depth=1`.
#[derive(Debug, Clone)]
pub struct GitCloneFetcher {
    git:  String,
    host: String
}

impl Default for GitCloneFetcher {
    fn default() -> Self {
        Self {
            git:  "git".to_owned(),
            host: "github.com".to_owned()
        }
    }
}

impl GitCloneFetcher {
    /// Creates a fetcher cloning from `github.com` with the `git` on `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the git executable.
    pub fn with_git_binary<S>(mut self, git: S) -> Self
    where
        S: Into<String>
    {
        self.git = git.into();
        self
    }

    fn clone_url(&self, owner: &str, repo: &str, token: &str) -> String {
        format!("https://x-access-token:{token}@{}/{owner}/{repo}.git", self.host)
    }
}

#[async_trait]
impl RepositoryFetcher for GitCloneFetcher {
    async fn fetch(&self, owner: &str, repo: &str, token: &str) -> Result<Workspace, Error> {
        let workspace = Workspace::create()?;
        let repository = format!("{owner}/{repo}");
        debug!(%repository, dir = %workspace.path().display(), "cloning repository");

        let output = Command::new(&self.git)
            .args(["clone", "--depth=1", "--single-branch"])
            .arg(self.clone_url(owner, repo, token))
            .arg(workspace.path())
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| Error::Clone {
                repository: repository.clone(),
                output:     format!("failed to spawn {}: {source}", self.git)
            })?;

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(Error::Clone {
                repository,
                output: redact(combined.trim(), token)
            });
        }

        Ok(workspace)
    }
}

/// Replaces every occurrence of `secret` in `text`.
pub fn redact(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_owned();
    }
    text.replace(secret, REDACTED)
}
