// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `triage authorize`: one-time Basecamp OAuth authorization.
//!
//! Prints the Launchpad authorization URL, waits for the browser redirect on
//! the configured redirect URI, exchanges the code and writes the credential
//! file that `serve` refreshes from then on.

use std::net::{Ipv4Addr, SocketAddr};

use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use triage_basecamp::FileCredentialStore;
use triage_config::TriageConfig;
use triage_core::{CredentialStore, TriageError};

use crate::serve::{launchpad, required};

const RECEIVED_PAGE: &str = "<!DOCTYPE html><html><body><p>Authorization received. You can close this tab and return to the terminal.</p></body></html>";

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

/// Port and path the redirect URI points at.
fn callback_target(redirect_uri: &str) -> Result<(u16, String), TriageError> {
    let uri: Uri = redirect_uri.parse().map_err(|e| {
        TriageError::Config(format!(
            "basecamp.redirect_uri must be a full URL such as http://localhost:3456/callback: {e}"
        ))
    })?;
    if uri.host().is_none() {
        return Err(TriageError::Config(
            "basecamp.redirect_uri must include a host".into(),
        ));
    }
    let port = uri
        .port_u16()
        .unwrap_or(if uri.scheme_str() == Some("https") { 443 } else { 80 });
    let path = match uri.path() {
        "" => "/".to_string(),
        path => path.to_string(),
    };
    Ok((port, path))
}

fn callback_router(path: &str, codes: mpsc::Sender<String>) -> Router {
    Router::new()
        .route(path, get(oauth_callback))
        .with_state(codes)
}

async fn oauth_callback(
    State(codes): State<mpsc::Sender<String>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        if let Some(error) = params.error {
            warn!(error = %error, "authorization was declined");
        }
        return (
            StatusCode::BAD_REQUEST,
            "No code in URL. Did you authorize the app?",
        )
            .into_response();
    };
    if codes.try_send(code).is_err() {
        warn!("authorization code already received, ignoring another");
    }
    Html(RECEIVED_PAGE).into_response()
}

/// Runs the `triage authorize` command.
pub async fn run_authorize(config: TriageConfig) -> Result<(), TriageError> {
    crate::init_tracing(&config);

    let redirect_uri = required(&config.basecamp.redirect_uri, "basecamp.redirect_uri")?;
    let client = launchpad(&config)?.ok_or_else(|| {
        TriageError::Config("basecamp.client_id and basecamp.client_secret are required".into())
    })?;
    let (port, path) = callback_target(redirect_uri)?;

    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| TriageError::Http {
            message: format!("failed to listen on {addr} for the OAuth redirect: {e}"),
            source: Some(Box::new(e)),
        })?;

    println!("1. Open this URL in your browser and authorize the app:\n");
    println!("{}", client.authorization_url(redirect_uri)?);
    println!("\n2. After authorizing you will be redirected. Listening on {redirect_uri}\n");

    let (tx, mut rx) = mpsc::channel::<String>(1);
    let app = callback_router(&path, tx);
    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    let code = rx.recv().await.ok_or_else(|| {
        TriageError::Internal("callback server stopped before a code arrived".into())
    })?;
    server.abort();
    info!("authorization code received, exchanging");

    let grant = client.exchange_code(&code, redirect_uri).await?;
    let record = grant.into_record(None, chrono::Utc::now());
    let store = FileCredentialStore::new(&config.basecamp.token_file);
    store.save(&record).await?;

    println!("Tokens saved to {}", store.path().display());
    println!("You can now start the bot. It will refresh the token automatically when it expires.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[test]
    fn callback_target_uses_port_and_path() {
        assert_eq!(
            callback_target("http://localhost:3456/callback").unwrap(),
            (3456, "/callback".to_string())
        );
        assert_eq!(
            callback_target("https://example.com").unwrap(),
            (443, "/".to_string())
        );
        assert_eq!(
            callback_target("http://localhost/oauth").unwrap(),
            (80, "/oauth".to_string())
        );
        assert!(callback_target("/callback").is_err());
    }

    #[tokio::test]
    async fn callback_forwards_code() {
        let (tx, mut rx) = mpsc::channel(1);
        let response = callback_router("/callback", tx)
            .oneshot(
                Request::get("/callback?code=abc123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(rx.recv().await.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn callback_without_code_is_bad_request() {
        let (tx, mut rx) = mpsc::channel(1);
        let response = callback_router("/callback", tx)
            .oneshot(
                Request::get("/callback?error=access_denied")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn other_paths_are_not_found() {
        let (tx, _rx) = mpsc::channel(1);
        let response = callback_router("/callback", tx)
            .oneshot(Request::get("/favicon.ico").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
