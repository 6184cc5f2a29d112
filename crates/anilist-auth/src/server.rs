//! Local callback server for the implicit grant
//!
//! AniList redirects the browser to `/callback` with the access token in the
//! URL fragment. Fragments never reach the server, so `/callback` answers
//! with a page whose script reads `access_token` from `location.hash` and
//! POSTs `{"token": "..."}` back to `/token`. The token handler writes into
//! the session's slot and requests shutdown after the first delivery.
//!
//! The serving task is supervised: it logs if `axum::serve` ends before a
//! shutdown was requested, and `stop` inspects the join result.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bridge::TokenSender;
use crate::constants::{CALLBACK_PATH, TOKEN_PATH};
use crate::error::{Error, Result};
use crate::metrics;

/// Served on `/callback`. Runs in the user's browser.
const CALLBACK_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Hisame Auth</title>
    <script>
        function show(message) {
            document.body.innerHTML = "<h1>" + message + "</h1>";
        }

        window.addEventListener("load", function () {
            var params = new URLSearchParams(window.location.hash.slice(1));
            var token = params.get("access_token");

            if (!token) {
                show("No access token found in the redirect. Please return to Hisame and try again.");
                return;
            }

            fetch("/token", {
                method: "POST",
                headers: { "Content-Type": "application/json" },
                body: JSON.stringify({ token: token })
            })
                .then(function (response) {
                    if (!response.ok) {
                        throw new Error("status " + response.status);
                    }
                    return response.json();
                })
                .then(function () {
                    show("Logged in. You can close this window and return to Hisame.");
                })
                .catch(function (err) {
                    show("Could not hand the token to Hisame: " + err);
                });
        });
    </script>
</head>
<body>
    <h1>Completing AniList login...</h1>
</body>
</html>
"#;

/// Body accepted on `/token`.
#[derive(Debug, Deserialize)]
struct TokenPayload {
    token: String,
}

/// Shared state for the callback routes.
#[derive(Clone)]
struct CallbackState {
    tokens: TokenSender,
    shutdown: CancellationToken,
}

/// Build the callback router.
///
/// `shutdown` is cancelled once the first token has been written to the
/// slot; the serving task uses it as its graceful shutdown signal.
pub fn build_router(tokens: TokenSender, shutdown: CancellationToken) -> Router {
    Router::new()
        .route(CALLBACK_PATH, get(callback_page))
        .route(TOKEN_PATH, post(receive_token))
        .with_state(CallbackState { tokens, shutdown })
}

/// GET /callback: fragment extraction page.
async fn callback_page() -> impl IntoResponse {
    debug!("serving callback page");
    metrics::record_callback_request("callback");
    (StatusCode::OK, [(CONTENT_TYPE, "text/html")], CALLBACK_PAGE)
}

/// POST /token: accept the token extracted by the callback page.
///
/// Malformed bodies get a 400 and leave the slot untouched so the session
/// keeps waiting.
async fn receive_token(State(state): State<CallbackState>, body: Bytes) -> Response {
    metrics::record_callback_request("token");

    let payload: TokenPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "rejected malformed token post");
            metrics::record_token_post("rejected");
            return (
                StatusCode::BAD_REQUEST,
                [(CONTENT_TYPE, "text/plain; charset=utf-8")],
                "Invalid request",
            )
                .into_response();
        }
    };

    if state.tokens.send(payload.token) {
        debug!("token delivered, requesting callback server shutdown");
        metrics::record_token_post("accepted");
        state.shutdown.cancel();
    } else {
        metrics::record_token_post("duplicate");
    }

    (
        StatusCode::OK,
        [(CONTENT_TYPE, "application/json")],
        serde_json::json!({ "status": "token stored" }).to_string(),
    )
        .into_response()
}

/// A running callback server.
///
/// Dropping it without calling `stop` still signals shutdown; the serving
/// task then exits on its own once connections drain.
#[derive(Debug)]
pub struct CallbackServer {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl CallbackServer {
    /// Bind `addr` and start serving the callback routes on a spawned task.
    ///
    /// Bind failures (most commonly the port already being held by another
    /// login attempt) are returned before anything is spawned.
    pub async fn start(addr: SocketAddr, tokens: TokenSender) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            error!(%addr, error = %e, "could not bind callback server");
            Error::Bind(format!("{addr}: {e}"))
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::Bind(format!("{addr}: {e}")))?;

        let shutdown = CancellationToken::new();
        let app = build_router(tokens, shutdown.clone());

        let signal = shutdown.clone();
        let handle = tokio::spawn(async move {
            let watch = signal.clone();
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await;

            match result {
                Ok(()) if watch.is_cancelled() => debug!("callback server drained"),
                Ok(()) => error!("callback server exited before shutdown was requested"),
                Err(e) => error!(error = %e, "callback server terminated unexpectedly"),
            }
        });

        info!(addr = %local_addr, "callback server listening");

        Ok(Self {
            local_addr,
            shutdown,
            handle,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether shutdown has been requested, either by `stop` or by the token
    /// route after the first delivery.
    #[cfg(test)]
    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Request graceful shutdown and wait up to `grace` for it to finish.
    ///
    /// On timeout the serving task is aborted and the overrun is logged; it
    /// is never returned as an error.
    pub async fn stop(mut self, grace: Duration) {
        debug!(addr = %self.local_addr, "stopping callback server");
        self.shutdown.cancel();

        match tokio::time::timeout(grace, &mut self.handle).await {
            Ok(Ok(())) => debug!("callback server shut down"),
            Ok(Err(e)) if e.is_panic() => error!(error = %e, "callback server task panicked"),
            Ok(Err(e)) => warn!(error = %e, "callback server task was cancelled"),
            Err(_) => {
                error!(
                    ?grace,
                    "callback server shutdown exceeded grace period, aborting"
                );
                self.handle.abort();
                let _ = (&mut self.handle).await;
            }
        }
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
