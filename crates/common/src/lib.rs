//! Types shared by the Hisame crates
//!
//! Configuration/I-O errors and the `Secret` wrapper that keeps bearer
//! tokens out of logs.

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
