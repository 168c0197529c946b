// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Command-line interface for the ghloc binary.
//!
//! `serve` runs the webhook service. `count` measures a local checkout and
//! can append the result to a JSON history and write badge and chart files.

use std::{
    fs, io,
    path::{Path, PathBuf},
    process,
    sync::Arc
};

use clap::{Args, Parser, Subcommand};
use ghloc::{
    BadgeColor, ContentsPublisher, Error, GitCloneFetcher, GitHubApp, LocCounter, PushPipeline,
    ServiceConfig, Snapshot, SnapshotStore, SqliteStore, format_loc, io_error, load_history,
    now_utc, render_badge, render_history_chart, save_history,
    server::{self, AppState}
};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::net::TcpListener;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Tracks lines of code for GitHub repositories.
#[derive(Debug, Parser)]
#[command(name = "ghloc", version, about = "Track lines of code per push")]
struct Cli {
    #[command(subcommand)]
    command: Command
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the GitHub App webhook service.
    Serve(ServiceConfig),
    /// Count lines of code in a local directory.
    Count(CountArgs)
}

#[derive(Debug, Args)]
struct CountArgs {
    /// Directory to measure.
    #[arg(long = "path", value_name = "DIR", default_value = ".")]
    path: PathBuf,

    /// Owner recorded in the snapshot.
    #[arg(long = "owner", default_value = "local")]
    owner: String,

    /// Repository name recorded in the snapshot; defaults to the directory
    /// name.
    #[arg(long = "repo")]
    repo: Option<String>,

    /// Commit recorded in the snapshot.
    #[arg(long = "commit", default_value = "")]
    commit: String,

    /// JSON history file the snapshot is appended to.
    #[arg(long = "history", value_name = "FILE")]
    history: Option<PathBuf>,

    /// Directory receiving `badge.svg` and `chart.svg`.
    #[arg(long = "output", value_name = "DIR")]
    output: Option<PathBuf>
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    if let Err(error) = run(Cli::parse()) {
        eprintln!("{}", error.to_display_string());
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    match cli.command {
        Command::Serve(config) => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|e| Error::service(format!("failed to start async runtime: {e}")))?;
            runtime.block_on(run_serve(config))
        }
        Command::Count(args) => {
            let snapshot = run_count(&args)?;
            let stdout = io::stdout();
            serde_json::to_writer_pretty(stdout.lock(), &snapshot)?;
            println!();
            Ok(())
        }
    }
}

async fn run_serve(config: ServiceConfig) -> Result<(), Error> {
    config.validate()?;
    debug!(?config, "loaded configuration");

    let store: Arc<dyn SnapshotStore> = Arc::new(SqliteStore::open(&config.db_path)?);
    let app = GitHubApp::from_key_file(config.app_id, &config.private_key_path)?;
    let pipeline = PushPipeline::new(
        Arc::new(app),
        Arc::new(GitCloneFetcher::new()),
        Arc::new(LocCounter::default()),
        Arc::clone(&store),
        Arc::new(ContentsPublisher)
    )
    .with_artifacts(config.commit_artifacts);
    info!(
        app_id = config.app_id,
        db_path = %config.db_path.display(),
        commit_artifacts = config.commit_artifacts,
        "service configured"
    );

    let state = AppState::new(store, Arc::new(pipeline), &config.webhook_secret);
    let addr = config.listen_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::service(format!("failed to bind {addr}: {e}")))?;
    server::serve(listener, state).await
}

fn run_count(args: &CountArgs) -> Result<Snapshot, Error> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.yellow} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    );

    pb.set_message(format!("Counting lines in {}...", args.path.display()));
    let aggregate = LocCounter::default().count(&args.path)?;
    let repo = args
        .repo
        .clone()
        .unwrap_or_else(|| directory_name(&args.path));
    let snapshot = aggregate.into_snapshot(&args.owner, &repo, &args.commit, now_utc());
    info!(
        path = %args.path.display(),
        total_loc = snapshot.total_loc,
        total_files = snapshot.total_files,
        languages = snapshot.languages.len(),
        "counted"
    );

    let history = match &args.history {
        Some(path) => {
            pb.set_message(format!("Appending to {}...", path.display()));
            let mut history = load_history(path)?;
            history.push(snapshot.clone());
            save_history(path, &history)?;
            history
        }
        None => vec![snapshot.clone()]
    };

    if let Some(output) = &args.output {
        pb.set_message(format!("Writing artifacts to {}...", output.display()));
        write_artifacts(output, &snapshot, &history)?;
    }

    pb.finish_with_message(format!("{} lines of code", format_loc(snapshot.total_loc)));
    Ok(snapshot)
}

fn write_artifacts(output: &Path, latest: &Snapshot, history: &[Snapshot]) -> Result<(), Error> {
    fs::create_dir_all(output).map_err(|source| io_error(output, source))?;

    let badge_path = output.join("badge.svg");
    let badge = render_badge(&format_loc(latest.total_loc), BadgeColor::Blue);
    fs::write(&badge_path, badge).map_err(|source| io_error(&badge_path, source))?;

    let chart_path = output.join("chart.svg");
    fs::write(&chart_path, render_history_chart(history))
        .map_err(|source| io_error(&chart_path, source))?;

    debug!(output = %output.display(), "wrote badge and chart");
    Ok(())
}

fn directory_name(path: &Path) -> String {
    path.canonicalize()
        .ok()
        .and_then(|resolved| resolved.file_name().map(|name| name.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "local".to_owned())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use clap::Parser;
    use tempfile::tempdir;

    use super::*;

    fn count_args(cli: Cli) -> CountArgs {
        match cli.command {
            Command::Count(args) => args,
            other => panic!("unexpected command variant: {other:?}")
        }
    }

    #[test]
    fn serve_requires_app_settings() {
        let result = Cli::try_parse_from([env!("CARGO_PKG_NAME"), "serve", "--port", "9000"]);
        assert!(result.is_err());
    }

    #[test]
    fn serve_accepts_flags() {
        let cli = Cli::try_parse_from([
            env!("CARGO_PKG_NAME"),
            "serve",
            "--app-id",
            "7",
            "--private-key-path",
            "key.pem",
            "--webhook-secret",
            "s",
            "--port",
            "9000"
        ])
        .expect("failed to parse CLI");
        match cli.command {
            Command::Serve(config) => {
                assert_eq!(config.app_id, 7);
                assert_eq!(config.port, 9000);
            }
            other => panic!("unexpected command variant: {other:?}")
        }
    }

    #[test]
    fn count_defaults() {
        let args = count_args(
            Cli::try_parse_from([env!("CARGO_PKG_NAME"), "count"]).expect("failed to parse CLI")
        );
        assert_eq!(args.path, PathBuf::from("."));
        assert_eq!(args.owner, "local");
        assert!(args.repo.is_none());
        assert!(args.history.is_none());
        assert!(args.output.is_none());
    }

    #[test]
    fn count_appends_history_and_writes_artifacts() {
        let temp = tempdir().expect("failed to create tempdir");
        let source = temp.path().join("project");
        fs::create_dir_all(&source).expect("failed to create source dir");
        fs::write(source.join("main.go"), "package main\nfunc main() {}\n")
            .expect("failed to write source");
        let history_path = temp.path().join("state/history.json");
        let output = temp.path().join("out");

        let args = count_args(
            Cli::try_parse_from([
                env!("CARGO_PKG_NAME"),
                "count",
                "--path",
                source.to_str().expect("utf8"),
                "--history",
                history_path.to_str().expect("utf8"),
                "--output",
                output.to_str().expect("utf8")
            ])
            .expect("failed to parse CLI")
        );

        let first = run_count(&args).expect("first count failed");
        assert_eq!(first.repo, "project");
        assert_eq!(first.total_files, 1);
        assert!(first.total_loc > 0);
        assert_eq!(first.languages.len(), 1);
        assert_eq!(first.languages[0].language, "Go");

        run_count(&args).expect("second count failed");
        let history = load_history(&history_path).expect("history should load");
        assert_eq!(history.len(), 2);

        let badge = fs::read_to_string(output.join("badge.svg")).expect("badge written");
        assert!(badge.contains("lines of code"));
        let chart = fs::read_to_string(output.join("chart.svg")).expect("chart written");
        assert_eq!(chart.matches("class=\"loc-point\"").count(), 2);
    }

    #[test]
    fn count_of_missing_directory_fails() {
        let temp = tempdir().expect("failed to create tempdir");
        let args = CountArgs {
            path:    temp.path().join("absent"),
            owner:   "local".to_owned(),
            repo:    Some("absent".to_owned()),
            commit:  String::new(),
            history: None,
            output:  None
        };
        let error = run_count(&args).expect_err("missing directory should fail");
        assert!(matches!(error, Error::Walk { .. }));
    }
}
