// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! GitHub App client.
//!
//! [`GitHubApp`] authenticates as the App itself (a JWT signed with the App's
//! private key) to locate installations and mint installation tokens.
//! [`ContentsPublisher`] uses those tokens to write artifacts through the
//! repository contents API.

use std::{fs, path::Path};

use async_trait::async_trait;
use jsonwebtoken::EncodingKey;
use masterror::AppError;
use octocrab::{Octocrab, models::AppId};
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::{Error, io_error},
    pipeline::{ArtifactPublisher, CredentialProvider}
};

#[derive(Debug, Deserialize)]
struct InstallationRecord {
    id: u64
}

#[derive(Debug, Deserialize)]
struct AccessToken {
    token: String
}

/// App-authenticated GitHub client.
#[derive(Clone)]
pub struct GitHubApp {
    client: Octocrab
}

impl GitHubApp {
    /// Builds a client for App `app_id` from a PEM-encoded RSA private key.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] when the key cannot be parsed or the HTTP client
    /// cannot be constructed.
    pub fn new(app_id: u64, private_key_pem: &[u8]) -> Result<Self, AppError> {
        let key = EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(|e| AppError::unauthorized(format!("invalid GitHub App private key: {e}")))?;
        let client = Octocrab::builder()
            .app(AppId(app_id), key)
            .build()
            .map_err(|e| AppError::service(format!("failed to initialize GitHub client: {e}")))?;
        Ok(Self {
            client
        })
    }

    /// Reads the private key from `path` and builds the client.
    pub fn from_key_file(app_id: u64, path: &Path) -> Result<Self, Error> {
        let pem = fs::read(path).map_err(|source| io_error(path, source))?;
        Ok(Self::new(app_id, &pem)?)
    }
}

#[async_trait]
impl CredentialProvider for GitHubApp {
    async fn find_installation_id(&self, owner: &str, repo: &str) -> Result<u64, Error> {
        let installation: InstallationRecord = self
            .client
            .get(format!("/repos/{owner}/{repo}/installation"), None::<&()>)
            .await
            .map_err(|e| {
                AppError::service(format!("failed to find installation for {owner}/{repo}: {e}"))
            })?;
        debug!(owner, repo, installation_id = installation.id, "resolved installation");
        Ok(installation.id)
    }

    async fn installation_token(&self, installation_id: u64) -> Result<String, Error> {
        let token: AccessToken = self
            .client
            .post(
                format!("/app/installations/{installation_id}/access_tokens"),
                None::<&()>
            )
            .await
            .map_err(|e| {
                AppError::unauthorized(format!(
                    "failed to issue token for installation {installation_id}: {e}"
                ))
            })?;
        Ok(token.token)
    }
}

/// Writes files through the repository contents API.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentsPublisher;

impl ContentsPublisher {
    fn client(token: &str) -> Result<Octocrab, AppError> {
        Octocrab::builder()
            .personal_token(token)
            .build()
            .map_err(|e| AppError::unauthorized(format!("failed to initialize GitHub client: {e}")))
    }
}

#[async_trait]
impl ArtifactPublisher for ContentsPublisher {
    async fn file_sha(
        &self,
        owner: &str,
        repo: &str,
        token: &str,
        path: &str
    ) -> Result<Option<String>, Error> {
        let contents = Self::client(token)?
            .repos(owner, repo)
            .get_content()
            .path(path)
            .send()
            .await
            .map_err(|e| AppError::service(format!("failed to look up {path}: {e}")))?;
        Ok(contents.items.into_iter().next().map(|item| item.sha))
    }

    async fn put_file(
        &self,
        owner: &str,
        repo: &str,
        token: &str,
        path: &str,
        content: &[u8],
        message: &str,
        known_sha: Option<&str>
    ) -> Result<(), Error> {
        let client = Self::client(token)?;
        let repos = client.repos(owner, repo);
        let result = match known_sha {
            Some(sha) => repos.update_file(path, message, content, sha).send().await,
            None => repos.create_file(path, message, content).send().await
        };
        result.map_err(|e| AppError::service(format!("failed to write {path}: {e}")))?;
        debug!(owner, repo, path, updated = known_sha.is_some(), "published artifact");
        Ok(())
    }
}
