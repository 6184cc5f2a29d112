//! User settings and loading
//!
//! Path precedence: `--config` CLI arg > `HISAME_CONFIG_FILE` env var >
//! `<config dir>/hisame/config.toml`. A missing file is not an error: every
//! field has a default and a partial file only overrides what it names.

use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Env var naming an alternative settings file. `~` and `$VARS` are expanded.
pub const CONFIG_FILE_ENV: &str = "HISAME_CONFIG_FILE";

/// Root settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// One of trace, debug, info, warn, error
    pub log_level: String,
    pub anime: AnimeConfig,
}

/// Anime list presentation settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnimeConfig {
    #[serde(deserialize_with = "title_language_or_default")]
    pub title_language: TitleLanguage,
    pub display_layout: String,
}

/// Which of AniList's title variants to display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TitleLanguage {
    #[default]
    English,
    Romaji,
    Native,
}

impl TitleLanguage {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "english" => Some(Self::English),
            "romaji" => Some(Self::Romaji),
            "native" => Some(Self::Native),
            _ => None,
        }
    }
}

/// An unknown title language falls back to the default instead of failing
/// the whole file.
fn title_language_or_default<'de, D>(deserializer: D) -> Result<TitleLanguage, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(TitleLanguage::parse(&raw).unwrap_or_else(|| {
        let fallback = TitleLanguage::default();
        warn!(value = %raw, ?fallback, "unknown anime.title_language, using default");
        fallback
    }))
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            anime: AnimeConfig::default(),
        }
    }
}

impl Default for AnimeConfig {
    fn default() -> Self {
        Self {
            title_language: TitleLanguage::default(),
            display_layout: "list".into(),
        }
    }
}

impl UserConfig {
    /// Load settings from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };

        let config: UserConfig = toml::from_str(&contents)?;

        if config.log_level.trim().is_empty() {
            return Err(common::Error::Config("log_level must not be empty".into()));
        }
        if config.anime.display_layout.trim().is_empty() {
            return Err(common::Error::Config(
                "anime.display_layout must not be empty".into(),
            ));
        }

        Ok(config)
    }

    /// Resolve the settings path from a CLI arg, `HISAME_CONFIG_FILE` or the
    /// platform config directory.
    pub fn resolve_path(cli_path: Option<&str>) -> common::Result<PathBuf> {
        if let Some(p) = cli_path {
            return Ok(PathBuf::from(p));
        }
        match std::env::var(CONFIG_FILE_ENV) {
            Ok(p) if !p.is_empty() => return expand_path(&p),
            _ => {}
        }
        let dir = dirs::config_dir().ok_or(common::Error::NoPlatformDir("config"))?;
        Ok(dir.join("hisame").join("config.toml"))
    }
}

/// Expand a leading `~` to the home directory and `$VAR` / `${VAR}`
/// references to their values (unset variables expand to nothing).
fn expand_path(raw: &str) -> common::Result<PathBuf> {
    let expanded = expand_env(raw);

    if let Some(rest) = expanded.strip_prefix('~') {
        let home = dirs::home_dir().ok_or(common::Error::NoPlatformDir("home"))?;
        let rest = rest.trim_start_matches(['/', '\\']);
        return Ok(home.join(rest));
    }

    Ok(PathBuf::from(expanded))
}

fn expand_env(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        let name: String = if chars.peek() == Some(&'{') {
            chars.next();
            chars.by_ref().take_while(|&c| c != '}').collect()
        } else {
            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    name.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            if name.is_empty() {
                out.push('$');
                continue;
            }
            name
        };

        out.push_str(&std::env::var(&name).unwrap_or_default());
    }

    out
}
