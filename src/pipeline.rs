// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Push-triggered snapshot pipeline.
//!
//! One [`PushPipeline::process`] call turns a push notification into at most
//! one persisted [`Snapshot`](crate::Snapshot) and, when enabled, a refreshed
//! badge and chart committed back to the repository. The call moves through
//! the [`PipelineStage`]s in order; any failure before publishing abandons the
//! invocation with [`Error::Pipeline`], while publishing failures are only
//! reported in the outcome.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::{
    badge::{BadgeColor, format_loc, render_badge},
    chart::render_history_chart,
    counter::LocCounter,
    error::Error,
    fetch::RepositoryFetcher,
    snapshot::{AggregateResult, Snapshot, now_utc},
    store::SnapshotStore
};

/// Repository path of the committed badge.
pub const BADGE_PATH: &str = ".ghloc/badge.svg";
/// Commit message used when publishing the badge.
pub const BADGE_COMMIT_MESSAGE: &str = "Update LOC badge [skip ci]";
/// Repository path of the committed chart.
pub const CHART_PATH: &str = ".ghloc/chart.svg";
/// Commit message used when publishing the chart.
pub const CHART_COMMIT_MESSAGE: &str = "Update LOC chart [skip ci]";

const FALLBACK_BRANCH: &str = "main";

/// Inbound push notification, already decoded and authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    /// Fully qualified ref that was pushed, e.g. `refs/heads/main`.
    pub git_ref:         String,
    /// Head commit after the push.
    pub head_commit_id:  String,
    /// Repository owner login.
    pub owner:           String,
    /// Repository name.
    pub repo:            String,
    /// Default branch name; empty when the payload omitted it.
    pub default_branch:  String,
    /// App installation that delivered the event, when known.
    pub installation_id: Option<u64>
}

impl PushEvent {
    /// Ref a push must target to be measured.
    pub fn expected_ref(&self) -> String {
        let branch = if self.default_branch.is_empty() {
            FALLBACK_BRANCH
        } else {
            self.default_branch.as_str()
        };
        format!("refs/heads/{branch}")
    }

    fn short_commit(&self) -> &str {
        self.head_commit_id
            .get(..8)
            .unwrap_or(&self.head_commit_id)
    }
}

/// Steps of one pipeline invocation, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Looking up the App installation for the repository.
    ResolvingInstallation,
    /// Checking the pushed ref against the default branch.
    Filtering,
    /// Issuing an installation token.
    Authenticating,
    /// Cloning the repository.
    Fetching,
    /// Counting lines in the workspace.
    Counting,
    /// Saving the snapshot.
    Persisting,
    /// Committing badge and chart back to the repository.
    PublishingArtifacts
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ResolvingInstallation => "resolving installation",
            Self::Filtering => "filtering",
            Self::Authenticating => "authenticating",
            Self::Fetching => "fetching",
            Self::Counting => "counting",
            Self::Persisting => "persisting",
            Self::PublishingArtifacts => "publishing artifacts"
        })
    }
}

/// What happened to the badge and chart after a snapshot was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactStatus {
    /// Publishing is turned off.
    Disabled,
    /// Every applicable artifact was written.
    Published,
    /// Publishing failed; the snapshot is still recorded.
    Failed(String)
}

/// Result of a pipeline invocation that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The push did not target the default branch; nothing was done.
    Skipped {
        /// Ref that was pushed.
        git_ref:  String,
        /// Ref that would have been measured.
        expected: String
    },
    /// A snapshot was persisted.
    Recorded {
        /// Identifier assigned by the store.
        snapshot_id: i64,
        /// Code lines across all languages.
        total_loc:   u64,
        /// Counted files across all languages.
        total_files: u64,
        /// Artifact publishing result.
        artifacts:   ArtifactStatus
    }
}

/// Source of GitHub App credentials.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Finds the installation of the App on `owner/repo`.
    async fn find_installation_id(&self, owner: &str, repo: &str) -> Result<u64, Error>;

    /// Issues a short-lived token for `installation_id`.
    async fn installation_token(&self, installation_id: u64) -> Result<String, Error>;
}

/// Destination for rendered artifacts.
#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    /// Blob SHA of `path` on the default branch, `None` when absent.
    async fn file_sha(
        &self,
        owner: &str,
        repo: &str,
        token: &str,
        path: &str
    ) -> Result<Option<String>, Error>;

    /// Creates `path`, or updates it when `known_sha` is given.
    #[allow(clippy::too_many_arguments)]
    async fn put_file(
        &self,
        owner: &str,
        repo: &str,
        token: &str,
        path: &str,
        content: &[u8],
        message: &str,
        known_sha: Option<&str>
    ) -> Result<(), Error>;
}

/// Orchestrates fetch, count, persist and publish for push events.
#[derive(Clone)]
pub struct PushPipeline {
    credentials:       Arc<dyn CredentialProvider>,
    fetcher:           Arc<dyn RepositoryFetcher>,
    counter:           Arc<LocCounter>,
    store:             Arc<dyn SnapshotStore>,
    publisher:         Arc<dyn ArtifactPublisher>,
    publish_artifacts: bool
}

impl PushPipeline {
    /// Wires the pipeline to its collaborators. Artifact publishing starts
    /// disabled.
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        fetcher: Arc<dyn RepositoryFetcher>,
        counter: Arc<LocCounter>,
        store: Arc<dyn SnapshotStore>,
        publisher: Arc<dyn ArtifactPublisher>
    ) -> Self {
        Self {
            credentials,
            fetcher,
            counter,
            store,
            publisher,
            publish_artifacts: false
        }
    }

    /// Enables or disables committing badge and chart after each snapshot.
    pub fn with_artifacts(mut self, enabled: bool) -> Self {
        self.publish_artifacts = enabled;
        self
    }

    /// Runs [`process`](Self::process) on a detached task and logs the result.
    pub fn spawn(&self, event: PushEvent) -> JoinHandle<()> {
        let pipeline = self.clone();
        tokio::spawn(async move {
            let owner = event.owner.clone();
            let repo = event.repo.clone();
            match pipeline.process(event).await {
                Ok(PushOutcome::Skipped {
                    ..
                }) => {}
                Ok(PushOutcome::Recorded {
                    snapshot_id,
                    total_loc,
                    ..
                }) => {
                    debug!(%owner, %repo, snapshot_id, total_loc, "push processed");
                }
                Err(error) => {
                    error!(%owner, %repo, error = %error, "push processing failed");
                }
            }
        })
    }

    /// Processes one push event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pipeline`] naming the stage that failed. Nothing is
    /// persisted when a stage before [`PipelineStage::Persisting`] fails.
    pub async fn process(&self, event: PushEvent) -> Result<PushOutcome, Error> {
        let installation_id = match event.installation_id {
            Some(id) => id,
            None => {
                let id = self
                    .credentials
                    .find_installation_id(&event.owner, &event.repo)
                    .await
                    .map_err(|e| e.at_stage(PipelineStage::ResolvingInstallation))?;
                info!(
                    owner = %event.owner,
                    repo = %event.repo,
                    installation_id = id,
                    "resolved installation"
                );
                id
            }
        };

        let expected = event.expected_ref();
        if event.git_ref != expected {
            info!(
                owner = %event.owner,
                repo = %event.repo,
                stage = %PipelineStage::Filtering,
                git_ref = %event.git_ref,
                %expected,
                "skipping push to non-default branch"
            );
            return Ok(PushOutcome::Skipped {
                git_ref: event.git_ref,
                expected
            });
        }

        info!(
            owner = %event.owner,
            repo = %event.repo,
            commit = %event.short_commit(),
            "processing push"
        );

        let token = self
            .credentials
            .installation_token(installation_id)
            .await
            .map_err(|e| e.at_stage(PipelineStage::Authenticating))?;

        let aggregate = self.measure(&event, &token).await?;
        info!(
            owner = %event.owner,
            repo = %event.repo,
            code = aggregate.total_code,
            files = aggregate.total_files,
            "counted lines of code"
        );

        let snapshot = aggregate.into_snapshot(
            &event.owner,
            &event.repo,
            &event.head_commit_id,
            now_utc()
        );
        let total_loc = snapshot.total_loc;
        let total_files = snapshot.total_files;
        let snapshot_id = self
            .persist(snapshot)
            .await
            .map_err(|e| e.at_stage(PipelineStage::Persisting))?;

        let artifacts = if self.publish_artifacts {
            match self
                .publish_artifacts(&event.owner, &event.repo, &token, total_loc)
                .await
            {
                Ok(()) => ArtifactStatus::Published,
                Err(error) => {
                    warn!(
                        owner = %event.owner,
                        repo = %event.repo,
                        stage = %PipelineStage::PublishingArtifacts,
                        error = %error,
                        "failed to publish artifacts"
                    );
                    ArtifactStatus::Failed(error.to_string())
                }
            }
        } else {
            ArtifactStatus::Disabled
        };

        Ok(PushOutcome::Recorded {
            snapshot_id,
            total_loc,
            total_files,
            artifacts
        })
    }

    /// Clones and counts. The workspace is dropped on the counting thread
    /// before this returns, whatever the result.
    async fn measure(&self, event: &PushEvent, token: &str) -> Result<AggregateResult, Error> {
        let workspace = self
            .fetcher
            .fetch(&event.owner, &event.repo, token)
            .await
            .map_err(|e| e.at_stage(PipelineStage::Fetching))?;

        let counter = Arc::clone(&self.counter);
        task::spawn_blocking(move || {
            let result = counter.count(workspace.path());
            drop(workspace);
            result
        })
        .await
        .map_err(|e| Error::service(format!("counting task failed: {e}")))
        .and_then(|result| result)
        .map_err(|e| e.at_stage(PipelineStage::Counting))
    }

    async fn persist(&self, mut snapshot: Snapshot) -> Result<i64, Error> {
        let store = Arc::clone(&self.store);
        task::spawn_blocking(move || store.save(&mut snapshot))
            .await
            .map_err(|e| Error::service(format!("persistence task failed: {e}")))?
    }

    async fn history(&self, owner: &str, repo: &str) -> Result<Vec<Snapshot>, Error> {
        let store = Arc::clone(&self.store);
        let owner = owner.to_owned();
        let repo = repo.to_owned();
        task::spawn_blocking(move || store.history(&owner, &repo))
            .await
            .map_err(|e| Error::service(format!("history task failed: {e}")))?
    }

    async fn publish_artifacts(
        &self,
        owner: &str,
        repo: &str,
        token: &str,
        total_loc: u64
    ) -> Result<(), Error> {
        let badge = render_badge(&format_loc(total_loc), BadgeColor::Blue);
        self.publish_file(owner, repo, token, BADGE_PATH, &badge, BADGE_COMMIT_MESSAGE)
            .await?;

        let history = self.history(owner, repo).await?;
        if history.len() > 1 {
            let chart = render_history_chart(&history);
            self.publish_file(owner, repo, token, CHART_PATH, &chart, CHART_COMMIT_MESSAGE)
                .await?;
        }
        Ok(())
    }

    async fn publish_file(
        &self,
        owner: &str,
        repo: &str,
        token: &str,
        path: &str,
        content: &[u8],
        message: &str
    ) -> Result<(), Error> {
        let known_sha = match self.publisher.file_sha(owner, repo, token, path).await {
            Ok(sha) => sha,
            Err(error) => {
                debug!(owner, repo, path, error = %error, "treating artifact as absent");
                None
            }
        };
        self.publisher
            .put_file(owner, repo, token, path, content, message, known_sha.as_deref())
            .await
    }
}
