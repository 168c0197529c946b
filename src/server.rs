// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! HTTP surface: webhook intake, badge and chart endpoints, health check.

use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post}
};
use tokio::{net::TcpListener, sync::Notify, task};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::{
    badge::{BadgeColor, BadgeEndpoint, NO_DATA_MESSAGE, format_loc, render_badge},
    chart::render_history_chart,
    error::Error,
    store::SnapshotStore,
    webhook::{EVENT_HEADER, PushSink, SIGNATURE_HEADER, WebhookEvent, parse_event, verify_signature}
};

/// Cache lifetime advertised for badge and chart responses.
pub const CACHE_POLICY: &str = "max-age=300";

/// Upper bound on in-flight request draining after a shutdown signal.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

const SVG_CONTENT_TYPE: &str = "image/svg+xml";

const INDEX_HTML: &str = "<!DOCTYPE html>
<html>
<head><title>ghloc</title></head>
<body>
<h1>ghloc: GitHub Lines of Code</h1>
<p>A GitHub App that counts lines of code in your repositories.</p>
<h2>Endpoints</h2>
<ul>
<li><code>GET /badge/{owner}/{repo}</code> shields.io endpoint JSON</li>
<li><code>GET /badge/{owner}/{repo}/svg</code> SVG badge</li>
<li><code>GET /chart/{owner}/{repo}</code> LOC history chart</li>
<li><code>POST /webhook</code> GitHub webhook receiver</li>
</ul>
</body>
</html>
";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    store:          Arc<dyn SnapshotStore>,
    pushes:         Arc<dyn PushSink>,
    webhook_secret: Arc<[u8]>
}

impl AppState {
    /// Creates state serving snapshots from `store` and handing verified
    /// pushes to `pushes`.
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        pushes: Arc<dyn PushSink>,
        webhook_secret: impl AsRef<[u8]>
    ) -> Self {
        Self {
            store,
            pushes,
            webhook_secret: Arc::from(webhook_secret.as_ref())
        }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/webhook", post(receive_webhook))
        .route("/badge/{owner}/{repo}", get(badge_endpoint))
        .route("/badge/{owner}/{repo}/svg", get(badge_svg))
        .route("/chart/{owner}/{repo}", get(history_chart))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves `state` on `listener` until SIGINT or SIGTERM.
///
/// After the signal, in-flight requests get [`SHUTDOWN_GRACE`] to finish.
/// Detached push processing is not awaited.
///
/// # Errors
///
/// Returns [`Error::Service`] when the server fails.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "starting ghloc server");
    }

    let signalled = Arc::new(Notify::new());
    let trigger = Arc::clone(&signalled);
    let server = axum::serve(listener, router(state)).with_graceful_shutdown(async move {
        shutdown_signal().await;
        info!("shutting down");
        trigger.notify_one();
    });

    tokio::select! {
        result = async move { server.await } => {
            result.map_err(|e| Error::service(format!("http server failed: {e}")))?;
        }
        () = async move {
            signalled.notified().await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        } => {
            warn!(grace_secs = SHUTDOWN_GRACE.as_secs(), "grace period elapsed, dropping connections");
        }
    }

    info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!(error = %error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                error!(error = %error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> &'static str {
    "ok"
}

async fn receive_webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let signature = header_str(&headers, SIGNATURE_HEADER);
    if let Err(error) = verify_signature(&state.webhook_secret, signature, &body) {
        warn!(error = %error, "rejected webhook delivery");
        return (StatusCode::UNAUTHORIZED, "invalid signature").into_response();
    }

    let event_type = header_str(&headers, EVENT_HEADER).unwrap_or_default();
    match parse_event(event_type, &body) {
        Err(error) => {
            warn!(event = event_type, error = %error, "undecodable webhook payload");
            (StatusCode::BAD_REQUEST, "parse error").into_response()
        }
        Ok(WebhookEvent::Push(event)) => {
            debug!(
                owner = %event.owner,
                repo = %event.repo,
                git_ref = %event.git_ref,
                "accepted push"
            );
            state.pushes.submit(event);
            StatusCode::ACCEPTED.into_response()
        }
        Ok(WebhookEvent::Installation {
            action,
            installation_id
        }) => {
            info!(%action, ?installation_id, "installation event");
            StatusCode::OK.into_response()
        }
        Ok(WebhookEvent::Ping) => StatusCode::OK.into_response(),
        Ok(WebhookEvent::Other(kind)) => {
            debug!(event = %kind, "ignoring webhook event");
            StatusCode::OK.into_response()
        }
    }
}

async fn badge_endpoint(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>
) -> Response {
    match with_store(&state, move |store| store.latest(&owner, &repo)).await {
        Ok(latest) => (
            [(header::CACHE_CONTROL, CACHE_POLICY)],
            Json(BadgeEndpoint::from_snapshot(latest.as_ref()))
        )
            .into_response(),
        Err(error) => internal_error(&error)
    }
}

async fn badge_svg(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>
) -> Response {
    match with_store(&state, move |store| store.latest(&owner, &repo)).await {
        Ok(latest) => {
            let svg = match latest {
                Some(snapshot) => render_badge(&format_loc(snapshot.total_loc), BadgeColor::Blue),
                None => render_badge(NO_DATA_MESSAGE, BadgeColor::LightGrey)
            };
            svg_response(svg)
        }
        Err(error) => internal_error(&error)
    }
}

async fn history_chart(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>
) -> Response {
    match with_store(&state, move |store| store.history(&owner, &repo)).await {
        Ok(history) => svg_response(render_history_chart(&history)),
        Err(error) => internal_error(&error)
    }
}

async fn with_store<T, F>(state: &AppState, query: F) -> Result<T, Error>
where
    F: FnOnce(&dyn SnapshotStore) -> Result<T, Error> + Send + 'static,
    T: Send + 'static
{
    let store = Arc::clone(&state.store);
    task::spawn_blocking(move || query(store.as_ref()))
        .await
        .map_err(|e| Error::service(format!("store task failed: {e}")))?
}

fn svg_response(svg: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, SVG_CONTENT_TYPE),
            (header::CACHE_CONTROL, CACHE_POLICY)
        ],
        svg
    )
        .into_response()
}

fn internal_error(error: &Error) -> Response {
    error!(error = %error, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
