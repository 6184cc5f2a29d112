//! Login orchestration
//!
//! Drives one `AuthSession` on behalf of a front end:
//! 1. start the callback server (bind failure ends the attempt before any
//!    waiting is shown)
//! 2. show the waiting indicator with a cancel control
//! 3. open the authorization URL in the browser (failure is only a warning,
//!    the user can follow the link manually)
//! 4. wait for the token, then store and persist it
//!
//! `run_login` is meant to run on its own task so the front end stays
//! responsive while it waits.

use anilist_auth::AuthSession;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use url::Url;

use crate::state::AppState;

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: &'static str,
    pub content: &'static str,
}

impl Notice {
    const START_FAILED: Notice = Notice {
        title: "Login error",
        content: "Error starting the login flow. Please check the logs and try again.",
    };

    const BROWSER_FAILED: Notice = Notice {
        title: "Error opening login URL",
        content: "Hisame was unable to open the AniList login page in your browser.",
    };

    const WAIT_FAILED: Notice = Notice {
        title: "Login error",
        content: "There was an error reading the auth token. Please check the logs and try again.",
    };

    const SAVE_FAILED: Notice = Notice {
        title: "Login saved for this run only",
        content: "Hisame could not save your login to disk; you will need to log in again next time.",
    };
}

/// What the front end displays during a login attempt.
pub trait LoginPresenter: Send + Sync {
    /// Show the waiting indicator. Cancelling `cancel` aborts the attempt.
    fn show_waiting(&self, authorization_url: &Url, cancel: CancellationToken);

    fn hide_waiting(&self);

    fn notify(&self, notice: Notice);
}

/// Opens URLs outside the application.
pub trait BrowserOpener: Send + Sync {
    fn open(&self, url: &Url) -> std::io::Result<()>;
}

/// The user's default browser.
pub struct SystemBrowser;

impl BrowserOpener for SystemBrowser {
    fn open(&self, url: &Url) -> std::io::Result<()> {
        webbrowser::open(url.as_str())
    }
}

/// Why an attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// The callback server could not start
    Start(String),
    /// The wait ended without a usable token
    Wait(String),
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureCause::Start(e) => write!(f, "could not start login: {e}"),
            FailureCause::Wait(e) => write!(f, "no token received: {e}"),
        }
    }
}

/// Result of one login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Token stored in the application state
    LoggedIn,
    /// The user cancelled; nothing changed
    Cancelled,
    Failed(FailureCause),
}

/// Run one login attempt.
///
/// Only an unbuildable authorization URL is returned as `Err`; it is a
/// configuration error the application should not continue past. Every
/// other failure is reported to the presenter and returned as an outcome.
pub async fn run_login(
    state: &AppState,
    presenter: &dyn LoginPresenter,
    browser: &dyn BrowserOpener,
    cancel: CancellationToken,
) -> anilist_auth::Result<LoginOutcome> {
    let mut session = AuthSession::new()?;
    let url = session.authorization_url().clone();
    info!(session = %session.id(), %url, "starting login");

    if let Err(e) = session.start_callback_server().await {
        error!(session = %session.id(), error = %e, "error starting login flow");
        presenter.notify(Notice::START_FAILED);
        return Ok(LoginOutcome::Failed(FailureCause::Start(e.to_string())));
    }

    presenter.show_waiting(&url, cancel.clone());

    if let Err(e) = browser.open(&url) {
        warn!(error = %e, "error opening login URL");
        presenter.notify(Notice::BROWSER_FAILED);
    }

    let outcome = match session.wait_for_token(&cancel).await {
        Ok(token) => {
            state.set_auth_token(token).await;
            if let Err(e) = state.save_auth_token().await {
                warn!(error = %e, "could not persist token");
                presenter.notify(Notice::SAVE_FAILED);
            }
            info!(session = %session.id(), "login complete");
            LoginOutcome::LoggedIn
        }
        Err(e) if e.is_cancelled() => {
            info!(session = %session.id(), "login cancelled by user");
            LoginOutcome::Cancelled
        }
        Err(e) => {
            error!(session = %session.id(), error = %e, "error waiting for token");
            presenter.notify(Notice::WAIT_FAILED);
            LoginOutcome::Failed(FailureCause::Wait(e.to_string()))
        }
    };

    presenter.hide_waiting();
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use anilist_auth::{CALLBACK_PORT, TOKEN_PATH, TokenStore};

    use crate::config::UserConfig;

    /// Every test here binds the fixed callback port.
    static CALLBACK_PORT_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Waiting(String),
        Hidden,
        Notified(Notice),
    }

    /// Records what the flow asked the UI to do. Optionally presses cancel
    /// as soon as the waiting indicator appears.
    #[derive(Default)]
    struct RecordingPresenter {
        events: Mutex<Vec<Event>>,
        cancel_immediately: bool,
    }

    impl RecordingPresenter {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        fn notices(&self) -> Vec<Notice> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    Event::Notified(n) => Some(n),
                    _ => None,
                })
                .collect()
        }
    }

    impl LoginPresenter for RecordingPresenter {
        fn show_waiting(&self, authorization_url: &Url, cancel: CancellationToken) {
            self.events
                .lock()
                .unwrap()
                .push(Event::Waiting(authorization_url.to_string()));
            if self.cancel_immediately {
                cancel.cancel();
            }
        }

        fn hide_waiting(&self) {
            self.events.lock().unwrap().push(Event::Hidden);
        }

        fn notify(&self, notice: Notice) {
            self.events.lock().unwrap().push(Event::Notified(notice));
        }
    }

    /// Stands in for the browser + AniList: on open it POSTs `token` to the
    /// local token route after a short delay, like the callback page would.
    struct ScriptedBrowser {
        token: Option<&'static str>,
        fail_open: bool,
    }

    impl BrowserOpener for ScriptedBrowser {
        fn open(&self, _url: &Url) -> std::io::Result<()> {
            if let Some(token) = self.token {
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    let _ = reqwest::Client::new()
                        .post(format!("http://127.0.0.1:{CALLBACK_PORT}{TOKEN_PATH}"))
                        .json(&serde_json::json!({ "token": token }))
                        .send()
                        .await;
                });
            }
            if self.fail_open {
                return Err(std::io::Error::other("no browser available"));
            }
            Ok(())
        }
    }

    fn state_in(dir: &std::path::Path) -> AppState {
        AppState::new(
            UserConfig::default(),
            TokenStore::new(dir.join("hisame").join("token")),
        )
    }

    #[tokio::test]
    async fn successful_login_stores_and_persists_token() {
        let _lock = CALLBACK_PORT_LOCK.lock().await;
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        let presenter = RecordingPresenter::default();
        let browser = ScriptedBrowser {
            token: Some("fresh-token"),
            fail_open: false,
        };

        let outcome = tokio::time::timeout(
            Duration::from_secs(10),
            run_login(&state, &presenter, &browser, CancellationToken::new()),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(outcome, LoginOutcome::LoggedIn);
        assert_eq!(state.auth_token().await.unwrap().expose(), "fresh-token");
        let saved = state.token_store().load().await.unwrap().unwrap();
        assert_eq!(saved.expose(), "fresh-token");

        assert_eq!(
            presenter.events(),
            vec![
                Event::Waiting(
                    "https://anilist.co/api/v2/oauth/authorize?client_id=18776&response_type=token"
                        .into()
                ),
                Event::Hidden,
            ]
        );
    }

    #[tokio::test]
    async fn browser_failure_is_a_soft_warning() {
        let _lock = CALLBACK_PORT_LOCK.lock().await;
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        let presenter = RecordingPresenter::default();
        // the user follows the manual link instead
        let browser = ScriptedBrowser {
            token: Some("manual-token"),
            fail_open: true,
        };

        let outcome = run_login(&state, &presenter, &browser, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, LoginOutcome::LoggedIn);
        assert_eq!(presenter.notices(), vec![Notice::BROWSER_FAILED]);
        assert_eq!(presenter.events().last(), Some(&Event::Hidden));
    }

    #[tokio::test]
    async fn cancellation_returns_quietly() {
        let _lock = CALLBACK_PORT_LOCK.lock().await;
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        let presenter = RecordingPresenter {
            cancel_immediately: true,
            ..Default::default()
        };
        let browser = ScriptedBrowser {
            token: None,
            fail_open: false,
        };

        let outcome = run_login(&state, &presenter, &browser, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, LoginOutcome::Cancelled);
        assert!(presenter.notices().is_empty(), "cancel must not alarm the user");
        assert_eq!(presenter.events().last(), Some(&Event::Hidden));
        assert!(!state.is_authenticated().await);
        assert!(
            tokio::net::TcpStream::connect(("127.0.0.1", CALLBACK_PORT))
                .await
                .is_err(),
            "callback port must be released after cancellation"
        );
    }

    #[tokio::test]
    async fn empty_token_fails_with_notice() {
        let _lock = CALLBACK_PORT_LOCK.lock().await;
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        let presenter = RecordingPresenter::default();
        let browser = ScriptedBrowser {
            token: Some(""),
            fail_open: false,
        };

        let outcome = run_login(&state, &presenter, &browser, CancellationToken::new())
            .await
            .unwrap();

        assert!(
            matches!(outcome, LoginOutcome::Failed(FailureCause::Wait(_))),
            "got: {outcome:?}"
        );
        assert_eq!(presenter.notices(), vec![Notice::WAIT_FAILED]);
        assert!(!state.is_authenticated().await);
    }

    #[tokio::test]
    async fn busy_port_fails_before_waiting() {
        let _lock = CALLBACK_PORT_LOCK.lock().await;
        let _squatter = tokio::net::TcpListener::bind(("0.0.0.0", CALLBACK_PORT))
            .await
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        let presenter = RecordingPresenter::default();
        let browser = ScriptedBrowser {
            token: None,
            fail_open: false,
        };

        let outcome = run_login(&state, &presenter, &browser, CancellationToken::new())
            .await
            .unwrap();

        assert!(
            matches!(outcome, LoginOutcome::Failed(FailureCause::Start(_))),
            "got: {outcome:?}"
        );
        assert_eq!(
            presenter.events(),
            vec![Event::Notified(Notice::START_FAILED)],
            "no waiting indicator after a bind failure"
        );
    }

    #[test]
    fn failure_causes_read_well() {
        assert_eq!(
            FailureCause::Start("0.0.0.0:19331: address in use".into()).to_string(),
            "could not start login: 0.0.0.0:19331: address in use"
        );
        assert_eq!(
            FailureCause::Wait("failed to receive token".into()).to_string(),
            "no token received: failed to receive token"
        );
    }
}
