//! Terminal front end for the login flow
//!
//! Prints the authorization URL while waiting and surfaces notices on
//! stderr. Holds on to the cancel token from `show_waiting` so Ctrl+C can
//! abort the attempt.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::login::{LoginPresenter, Notice};

#[derive(Default)]
pub struct TerminalPresenter {
    cancel: Mutex<Option<CancellationToken>>,
}

impl TerminalPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the attempt currently waiting, if any. Returns whether there
    /// was one.
    pub fn cancel(&self) -> bool {
        match self.cancel.lock().unwrap_or_else(PoisonError::into_inner).take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    fn is_waiting(&self) -> bool {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl LoginPresenter for TerminalPresenter {
    fn show_waiting(&self, authorization_url: &Url, cancel: CancellationToken) {
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = Some(cancel);

        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "Waiting for AniList login...");
        let _ = writeln!(
            out,
            "If your browser did not open, visit:\n\n    {authorization_url}\n"
        );
        let _ = writeln!(out, "Press Ctrl+C to cancel.");
        let _ = out.flush();
    }

    fn hide_waiting(&self) {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn notify(&self, notice: Notice) {
        eprintln!("{}: {}", notice.title, notice.content);
    }
}
