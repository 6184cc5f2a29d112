//! AniList login core for Hisame
//!
//! Captures an implicit-grant access token through a short-lived local
//! callback server and persists it between runs. This crate has no
//! dependency on the Hisame binary and can be exercised on its own.
//!
//! Login flow:
//! 1. `AuthSession::new()` builds the authorization URL and an empty token slot
//! 2. `AuthSession::start_callback_server()` binds the fixed callback port
//! 3. The user authorizes in a browser; AniList redirects to `/callback`
//! 4. The callback page POSTs the fragment token to `/token`, which fills the slot
//! 5. `AuthSession::wait_for_token()` returns the token and stops the server
//! 6. The token is persisted via `TokenStore::save()`

pub mod bridge;
pub mod constants;
pub mod error;
pub mod metrics;
pub mod server;
pub mod session;
pub mod token_store;

pub use bridge::{TokenReceiver, TokenSender, token_slot};
pub use constants::*;
pub use error::{Error, Result};
pub use server::CallbackServer;
pub use session::{AuthSession, authorization_url, callback_addr};
pub use token_store::TokenStore;
