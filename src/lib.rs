// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Lines-of-code tracking for GitHub repositories.
//!
//! A push to a repository's default branch triggers a shallow clone, a
//! per-language line count and a timestamped [`Snapshot`] in SQLite. The
//! snapshots back a shields.io badge endpoint and an SVG history chart, and
//! can optionally be committed back into the repository.
//!
//! The crate is split along the pipeline: [`PushPipeline`] orchestrates the
//! [`RepositoryFetcher`], [`LocCounter`], [`SnapshotStore`] and
//! [`ArtifactPublisher`] seams, while [`server::router`] exposes webhook
//! intake and the rendered artifacts over HTTP.

mod badge;
mod chart;
mod classifier;
mod config;
mod counter;
mod error;
mod fetch;
mod github;
mod history;
mod pipeline;
pub mod server;
mod snapshot;
mod store;
mod webhook;

pub use badge::{
    BADGE_LABEL, BadgeColor, BadgeEndpoint, NO_DATA_MESSAGE, format_loc, render_badge
};
pub use chart::{format_axis_value, nice_axis_ticks, render_history_chart};
pub use classifier::{FileCounts, LanguageClassifier, TokeiClassifier};
pub use config::{DEFAULT_DB_PATH, DEFAULT_PORT, ServiceConfig};
pub use counter::{
    DISAMBIGUATION_SAMPLE_LEN, EXTENSION_OVERRIDES, FileOutcome, LocCounter, SkipReason,
    override_for
};
pub use error::{Error, io_error};
pub use fetch::{GitCloneFetcher, RepositoryFetcher, Workspace, redact};
pub use github::{ContentsPublisher, GitHubApp};
pub use history::{load_history, save_history};
pub use pipeline::{
    ArtifactPublisher, ArtifactStatus, BADGE_COMMIT_MESSAGE, BADGE_PATH, CHART_COMMIT_MESSAGE,
    CHART_PATH, CredentialProvider, PipelineStage, PushEvent, PushOutcome, PushPipeline
};
pub use snapshot::{AggregateResult, LanguageBreakdown, Snapshot, now_utc};
pub use store::{SCHEMA_VERSION, SnapshotStore, SqliteStore};
pub use webhook::{
    EVENT_HEADER, PushSink, SIGNATURE_HEADER, WebhookEvent, parse_event, verify_signature
};
