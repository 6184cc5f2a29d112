//! Common error types

use thiserror::Error;

/// Errors raised while reading settings or resolving per-user paths
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("could not determine {0} directory for this platform")]
    NoPlatformDir(&'static str),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;
