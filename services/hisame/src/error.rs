//! Application error types

use thiserror::Error;

/// Errors surfaced by the application state and front end.
///
/// Login-attempt failures (bind, wait, cancellation) are not errors at this
/// level; `login::run_login` reports them as a `LoginOutcome`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no authentication token to save")]
    NoToken,

    #[error(transparent)]
    Auth(#[from] anilist_auth::Error),

    #[error(transparent)]
    Common(#[from] common::Error),
}

/// Result alias using the application Error
pub type Result<T> = std::result::Result<T, Error>;
