//! Runtime configuration and its line-oriented `key value` file format.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Compiled-in location of the configuration file.
pub const DEFAULT_PATH: &str = "/etc/pronound.conf";

/// Environment variable overriding [`DEFAULT_PATH`].
pub const PATH_ENV: &str = "PRONOUND_CONFIG";

/// Active configuration of the daemon.
///
/// A value is never edited once it is live: loading builds a new `Config` from the current one,
/// which the caller installs as the next snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Fork into the background at startup.
    pub daemonize: bool,
    /// Response when a user has no pronoun file. Always newline-terminated.
    pub default_pronouns: String,
    /// Name of the pronoun file, relative to each user's home directory.
    pub pronoun_file_name: String,
    /// TCP port to listen on.
    pub port: u16,
    /// Unprivileged account to switch to once the socket is bound.
    pub run_as_user: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemonize: false,
            default_pronouns: "not specified\n".to_owned(),
            pronoun_file_name: ".pronouns".to_owned(),
            port: 731,
            run_as_user: "_pronound".to_owned(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("line {line}: invalid port {value:?}")]
    InvalidPort { line: usize, value: String },
}

type Result<T> = std::result::Result<T, ConfigError>;

impl Config {
    /// Layer the file at `path` over this configuration.
    ///
    /// `self` is left untouched; on failure the caller keeps whatever it had.
    pub fn load(&self, path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;

        self.clone().apply(&text)
    }

    /// [`Config::load`] without blocking the async runtime.
    pub async fn load_async(&self, path: &Path) -> Result<Config> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_owned(),
                source,
            })?;

        self.clone().apply(&text)
    }

    /// Apply configuration text. Keys absent from `text` keep their current value.
    pub fn apply(mut self, text: &str) -> Result<Config> {
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = match line.split_once(char::is_whitespace) {
                Some((key, rest)) => (key, rest.trim_start()),
                None => (line, ""),
            };

            match key {
                "daemonise" => self.daemonize = matches!(value, "true" | "1"),
                "defaults" => self.default_pronouns = format!("{value}\n"),
                "file" => self.pronoun_file_name = value.to_owned(),
                "port" => {
                    self.port = value.parse().map_err(|_| ConfigError::InvalidPort {
                        line: idx + 1,
                        value: value.to_owned(),
                    })?
                }
                "user" => self.run_as_user = value.to_owned(),
                _ => debug!(key, line = idx + 1, "ignoring unknown configuration key"),
            }
        }

        Ok(self)
    }
}

/// Path re-read on reload: `$PRONOUND_CONFIG`, else [`DEFAULT_PATH`].
///
/// The `-C` startup override is deliberately not part of this.
pub fn reload_path() -> PathBuf {
    env::var_os(PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PATH))
}
