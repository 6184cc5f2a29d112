//! One login attempt
//!
//! An `AuthSession` owns the authorization URL, the token slot and the
//! callback server for a single attempt:
//!
//! 1. `AuthSession::new()` builds the URL and an empty slot (no I/O)
//! 2. `start_callback_server()` binds the fixed callback port
//! 3. the caller opens `authorization_url()` in a browser
//! 4. `wait_for_token()` resolves with the token, a cancellation or a failure,
//!    and always stops the server before returning
//!
//! Sessions are not reused; build a new one per attempt.

use std::net::SocketAddr;

use common::Secret;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::bridge::{TokenReceiver, TokenSender, token_slot};
use crate::constants::{
    AUTHORIZE_ENDPOINT, CALLBACK_PORT, CLIENT_ID, RESPONSE_TYPE, SHUTDOWN_GRACE, TOKEN_PATH,
};
use crate::error::{Error, Result};
use crate::metrics;
use crate::server::CallbackServer;

/// Build the implicit-grant authorization URL.
///
/// No `redirect_uri` is sent; AniList uses the one registered for the client.
pub fn authorization_url() -> Result<Url> {
    Url::parse_with_params(
        AUTHORIZE_ENDPOINT,
        &[("client_id", CLIENT_ID), ("response_type", RESPONSE_TYPE)],
    )
    .map_err(|e| Error::AuthorizationUrl(format!("{AUTHORIZE_ENDPOINT}: {e}")))
}

/// Address the callback server binds: the fixed port on all interfaces.
pub fn callback_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], CALLBACK_PORT))
}

/// State for a single login attempt.
#[derive(Debug)]
pub struct AuthSession {
    id: Uuid,
    authorization_url: Url,
    bind_addr: SocketAddr,
    tokens: TokenSender,
    receiver: Option<TokenReceiver>,
    server: Option<CallbackServer>,
}

impl AuthSession {
    /// Create a session with a fresh authorization URL and an empty slot.
    ///
    /// Only fails if the URL cannot be built, which is a configuration
    /// error the application should not try to recover from.
    pub fn new() -> Result<Self> {
        Self::with_bind_addr(callback_addr())
    }

    pub(crate) fn with_bind_addr(bind_addr: SocketAddr) -> Result<Self> {
        let (tokens, receiver) = token_slot();
        Ok(Self {
            id: Uuid::new_v4(),
            authorization_url: authorization_url()?,
            bind_addr,
            tokens,
            receiver: Some(receiver),
            server: None,
        })
    }

    /// Identifier used to correlate this attempt's log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// URL the user must open to authorize Hisame.
    pub fn authorization_url(&self) -> &Url {
        &self.authorization_url
    }

    /// Whether the callback server is currently running for this session.
    #[cfg(test)]
    pub(crate) fn is_serving(&self) -> bool {
        self.server.is_some()
    }

    /// Bind the callback port and start serving on a background task.
    ///
    /// A bind failure means no token can ever arrive, so it is returned
    /// before the caller starts waiting.
    pub async fn start_callback_server(&mut self) -> Result<()> {
        if self.server.is_some() {
            warn!(session = %self.id, "callback server already running for this session");
            return Ok(());
        }

        info!(session = %self.id, addr = %self.bind_addr, "starting auth callback server");
        let server = CallbackServer::start(self.bind_addr, self.tokens.clone()).await?;
        self.server = Some(server);
        Ok(())
    }

    /// Wait until a token arrives or `cancel` fires.
    ///
    /// Returns `Error::Cancelled` on cancellation and
    /// `Error::TokenNotReceived` when the slot closes or delivers an empty
    /// token. The callback server is stopped before this returns, whatever
    /// the outcome. Only one wait per session: later calls get
    /// `Error::AlreadyWaited`.
    pub async fn wait_for_token(&mut self, cancel: &CancellationToken) -> Result<Secret<String>> {
        let Some(receiver) = self.receiver.take() else {
            self.stop_callback_server().await;
            return Err(Error::AlreadyWaited);
        };

        debug!(session = %self.id, route = TOKEN_PATH, "waiting for token");
        let outcome = receiver.recv(cancel).await;
        self.stop_callback_server().await;

        match &outcome {
            Ok(_) => {
                info!(session = %self.id, "received token");
                metrics::record_wait_outcome("token");
            }
            Err(Error::Cancelled) => {
                debug!(session = %self.id, "stopped waiting for token: cancelled");
                metrics::record_wait_outcome("cancelled");
            }
            Err(e) => {
                warn!(session = %self.id, error = %e, "failed to receive token");
                metrics::record_wait_outcome("failed");
            }
        }

        outcome
    }

    /// Stop the callback server, waiting up to five seconds for it to drain.
    ///
    /// Logs a warning and returns if the server is not running.
    pub async fn stop_callback_server(&mut self) {
        match self.server.take() {
            Some(server) => server.stop(SHUTDOWN_GRACE).await,
            None => warn!(session = %self.id, "stop requested but callback server was not started"),
        }
    }

    #[cfg(test)]
    pub(crate) fn token_sender(&self) -> TokenSender {
        self.tokens.clone()
    }
}
