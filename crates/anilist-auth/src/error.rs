//! Error types for the login flow

/// Errors from the AniList login flow and token persistence.
///
/// `Cancelled` and `TokenNotReceived` both end a wait but are reported
/// differently: cancellation is user intent, the other is a failed attempt.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid authorization URL: {0}")]
    AuthorizationUrl(String),

    #[error("could not start callback server: {0}")]
    Bind(String),

    #[error("login cancelled")]
    Cancelled,

    #[error("failed to receive token")]
    TokenNotReceived,

    #[error("a wait for this session's token has already been started")]
    AlreadyWaited,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("could not determine the per-user data directory")]
    NoDataDir,
}

impl Error {
    /// Whether the error came from the caller cancelling the attempt.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
