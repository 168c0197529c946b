// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Webhook intake: signature verification and event decoding.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::{
    error::Error,
    pipeline::{PushEvent, PushPipeline}
};

/// Header carrying the HMAC-SHA256 signature of the body.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
/// Header naming the event type.
pub const EVENT_HEADER: &str = "x-github-event";

const SIGNATURE_PREFIX: &str = "sha256=";

type HmacSha256 = Hmac<Sha256>;

/// Checks `signature` (`sha256=<hex>`) against the HMAC of `body` under
/// `secret`. The comparison is constant time.
///
/// # Errors
///
/// Returns [`Error::Validation`] for a missing, malformed or mismatched
/// signature.
pub fn verify_signature(secret: &[u8], signature: Option<&str>, body: &[u8]) -> Result<(), Error> {
    let signature = signature.ok_or_else(|| Error::validation("missing webhook signature"))?;
    let digest = signature
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or_else(|| Error::validation("unsupported webhook signature scheme"))?;
    let expected =
        hex::decode(digest).map_err(|e| Error::validation(format!("malformed signature: {e}")))?;

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| Error::validation(format!("unusable webhook secret: {e}")))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| Error::validation("webhook signature mismatch"))
}

/// Decoded webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// A push to any ref.
    Push(PushEvent),
    /// The App was installed, removed or changed.
    Installation {
        /// Action reported by GitHub, e.g. `created`.
        action:          String,
        /// Installation the action applies to.
        installation_id: Option<u64>
    },
    /// Delivery test sent when the hook is created.
    Ping,
    /// Any other event type; acknowledged and ignored.
    Other(String)
}

#[derive(Debug, Deserialize)]
struct PushPayload {
    #[serde(rename = "ref")]
    git_ref:      String,
    #[serde(default)]
    after:        Option<String>,
    #[serde(default)]
    head_commit:  Option<CommitPayload>,
    repository:   RepositoryPayload,
    #[serde(default)]
    installation: Option<InstallationPayload>
}

#[derive(Debug, Deserialize)]
struct CommitPayload {
    id: String
}

#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    name:           String,
    owner:          OwnerPayload,
    #[serde(default)]
    default_branch: Option<String>
}

#[derive(Debug, Deserialize)]
struct OwnerPayload {
    login: String
}

#[derive(Debug, Deserialize)]
struct InstallationPayload {
    id: u64
}

#[derive(Debug, Deserialize)]
struct InstallationEventPayload {
    #[serde(default)]
    action:       String,
    #[serde(default)]
    installation: Option<InstallationPayload>
}

impl From<PushPayload> for PushEvent {
    fn from(payload: PushPayload) -> Self {
        let head_commit_id = payload
            .head_commit
            .map(|commit| commit.id)
            .or(payload.after)
            .unwrap_or_default();
        Self {
            git_ref: payload.git_ref,
            head_commit_id,
            owner: payload.repository.owner.login,
            repo: payload.repository.name,
            default_branch: payload.repository.default_branch.unwrap_or_default(),
            installation_id: payload.installation.map(|installation| installation.id)
        }
    }
}

/// Decodes a delivery of type `event_type`.
///
/// # Errors
///
/// Returns [`Error::Serialize`] when a push or installation payload does not
/// decode.
pub fn parse_event(event_type: &str, body: &[u8]) -> Result<WebhookEvent, Error> {
    match event_type {
        "push" => {
            let payload: PushPayload = serde_json::from_slice(body)?;
            Ok(WebhookEvent::Push(payload.into()))
        }
        "installation" => {
            let payload: InstallationEventPayload = serde_json::from_slice(body)?;
            Ok(WebhookEvent::Installation {
                action:          payload.action,
                installation_id: payload.installation.map(|installation| installation.id)
            })
        }
        "ping" => Ok(WebhookEvent::Ping),
        other => Ok(WebhookEvent::Other(other.to_owned()))
    }
}

/// Receiver of accepted push events.
///
/// Submission must not wait for processing to finish.
pub trait PushSink: Send + Sync {
    /// Hands `event` off for background processing.
    fn submit(&self, event: PushEvent);
}

impl PushSink for PushPipeline {
    fn submit(&self, event: PushEvent) {
        drop(self.spawn(event));
    }
}

#[cfg(test)]
pub(crate) fn sign(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(body);
    format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}
