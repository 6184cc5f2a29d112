//! Hisame
//!
//! AniList client. This binary:
//! 1. Sets up logging and loads user settings
//! 2. Restores the saved AniList token, if any
//! 3. Runs the requested command: `login` (default), `logout` or `status`

mod config;
mod error;
mod logging;
mod login;
mod state;
mod terminal;

use std::sync::Arc;

use anilist_auth::TokenStore;
use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::UserConfig;
use crate::login::{LoginOutcome, SystemBrowser};
use crate::state::AppState;
use crate::terminal::TerminalPresenter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Login,
    Logout,
    Status,
}

#[derive(Debug, PartialEq, Eq)]
struct Cli {
    config: Option<String>,
    command: Command,
}

const USAGE: &str = "usage: hisame [--config <path>] [login|logout|status]";

/// Parse `[--config <path>] [command]` in any order. The command defaults
/// to `login`.
fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Cli> {
    let mut config = None;
    let mut command = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config requires a path")?;
                config = Some(path);
            }
            "-h" | "--help" => anyhow::bail!("{USAGE}"),
            name => {
                let parsed = match name {
                    "login" => Command::Login,
                    "logout" => Command::Logout,
                    "status" => Command::Status,
                    other => anyhow::bail!("unknown argument '{other}'\n{USAGE}"),
                };
                if command.replace(parsed).is_some() {
                    anyhow::bail!("only one command may be given\n{USAGE}");
                }
            }
        }
    }

    Ok(Cli {
        config,
        command: command.unwrap_or(Command::Login),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = parse_args(std::env::args().skip(1))?;

    let logging = logging::init();

    let config = load_config(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "could not load configuration, using defaults");
        UserConfig::default()
    });
    logging.apply_configured_level(&config.log_level);
    info!(
        title_language = ?config.anime.title_language,
        display_layout = %config.anime.display_layout,
        "configuration loaded"
    );

    let token_store = TokenStore::at_default_location()
        .context("failed to determine where to store the AniList token")?;
    let state = AppState::new(config, token_store);

    if let Err(e) = state.load_auth_token().await {
        warn!(error = %e, "could not load saved token, continuing unauthenticated");
    }

    match cli.command {
        Command::Login => login(&state).await,
        Command::Logout => {
            state
                .clear_auth_token()
                .await
                .context("failed to remove saved token")?;
            println!("Logged out of AniList.");
            Ok(())
        }
        Command::Status => {
            status(&state, &logging).await;
            Ok(())
        }
    }
}

fn load_config(cli_path: Option<&str>) -> error::Result<UserConfig> {
    let path = UserConfig::resolve_path(cli_path)?;
    info!(path = %path.display(), "loading configuration");
    Ok(UserConfig::load(&path)?)
}

async fn login(state: &AppState) -> Result<()> {
    if state.is_authenticated().await {
        info!("already logged in, starting a new login to replace the saved token");
    }

    let presenter = Arc::new(TerminalPresenter::new());
    let root = CancellationToken::new();

    let interrupt = {
        let presenter = Arc::clone(&presenter);
        let root = root.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received");
                if !presenter.cancel() {
                    root.cancel();
                }
            }
        })
    };

    let outcome = login::run_login(state, presenter.as_ref(), &SystemBrowser, root)
        .await
        .context("login could not be started")?;
    interrupt.abort();

    match outcome {
        LoginOutcome::LoggedIn => {
            println!("Logged in to AniList.");
            Ok(())
        }
        LoginOutcome::Cancelled => {
            println!("Login cancelled.");
            Ok(())
        }
        LoginOutcome::Failed(cause) => anyhow::bail!("login failed: {cause}"),
    }
}

async fn status(state: &AppState, logging: &logging::Logging) {
    if state.is_authenticated().await {
        println!("Logged in to AniList.");
    } else {
        println!("Not logged in. Run `hisame login` to connect your AniList account.");
    }
    let config = state.config().await;
    println!("Titles:     {:?}", config.anime.title_language);
    println!("Layout:     {}", config.anime.display_layout);
    println!("Token file: {}", state.token_store().path().display());
    if let Some(path) = logging.log_file() {
        println!("Log file:   {}", path.display());
    }
    println!("Log level:  {}", logging.level());
}
