// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Service configuration read from flags and the environment.

use std::{
    fmt,
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf
};

use clap::{ArgAction, Args};

use crate::error::Error;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8080;
/// Default SQLite database location.
pub const DEFAULT_DB_PATH: &str = "ghloc.db";

/// Settings for the `serve` subcommand.
///
/// Every field can be given as a flag or through its environment variable.
///
/// # Examples
///
/// ```
/// use clap::Parser;
/// use ghloc::ServiceConfig;
///
/// #[derive(Parser)]
/// struct Cli {
///     #[command(flatten)]
///     config: ServiceConfig
/// }
///
/// let cli = Cli::try_parse_from([
///     "ghloc",
///     "--app-id",
///     "42",
///     "--private-key-path",
///     "key.pem",
///     "--webhook-secret",
///     "s3cret"
/// ])
/// .expect("valid arguments");
/// assert_eq!(cli.config.port, 8080);
/// cli.config.validate().expect("valid configuration");
/// ```
#[derive(Clone, Args)]
pub struct ServiceConfig {
    /// GitHub App identifier.
    #[arg(long = "app-id", env = "GITHUB_APP_ID", value_name = "ID")]
    pub app_id: u64,

    /// PEM file holding the App's RSA private key.
    #[arg(long = "private-key-path", env = "GITHUB_PRIVATE_KEY_PATH", value_name = "PATH")]
    pub private_key_path: PathBuf,

    /// Shared secret used to sign webhook deliveries.
    #[arg(
        long = "webhook-secret",
        env = "GITHUB_WEBHOOK_SECRET",
        value_name = "SECRET",
        hide_env_values = true
    )]
    pub webhook_secret: String,

    /// Port to listen on.
    #[arg(long = "port", env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// SQLite database file.
    #[arg(long = "db-path", env = "DB_PATH", value_name = "PATH", default_value = DEFAULT_DB_PATH)]
    pub db_path: PathBuf,

    /// Commit the badge and chart back into the pushed repository.
    #[arg(
        long = "commit-artifacts",
        env = "COMMIT_ARTIFACTS",
        action = ArgAction::SetTrue
    )]
    pub commit_artifacts: bool
}

impl ServiceConfig {
    /// Checks values clap cannot express as constraints.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty secret, an empty path or
    /// port 0.
    pub fn validate(&self) -> Result<(), Error> {
        if self.webhook_secret.trim().is_empty() {
            return Err(Error::validation("GITHUB_WEBHOOK_SECRET must not be empty"));
        }
        if self.private_key_path.as_os_str().is_empty() {
            return Err(Error::validation("GITHUB_PRIVATE_KEY_PATH must not be empty"));
        }
        if self.db_path.as_os_str().is_empty() {
            return Err(Error::validation("DB_PATH must not be empty"));
        }
        if self.port == 0 {
            return Err(Error::validation("PORT must be between 1 and 65535"));
        }
        Ok(())
    }

    /// Address the server binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("app_id", &self.app_id)
            .field("private_key_path", &self.private_key_path)
            .field("webhook_secret", &"***")
            .field("port", &self.port)
            .field("db_path", &self.db_path)
            .field("commit_artifacts", &self.commit_artifacts)
            .finish()
    }
}
