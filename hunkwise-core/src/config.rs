//! User configuration loaded from `config.toml`.
//!
//! Every key is optional. A missing file yields [`Config::default`]; a file
//! that fails to parse is a soft failure: the error is logged and defaults
//! are used so the tool always starts.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::store::ReviewStore;

/// Default theme name.
pub const DEFAULT_THEME: &str = "catppuccin-mocha";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub theme: String,
    /// Argv of the diff producer, run in the working directory.
    pub diff_command: Vec<String>,
    /// Argv of the LLM producer; the prompt is appended as the final element.
    pub llm_command: Vec<String>,
    /// Port for the HTTP ingest endpoint; `0` picks an ephemeral port.
    pub http_port: u16,
    pub http_enabled: bool,
    /// Apply strict importance validation to HTTP submissions too.
    pub strict_http: bool,
    pub store_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: DEFAULT_THEME.to_owned(),
            diff_command: ["git", "diff", "HEAD", "--no-color", "--no-ext-diff"]
                .map(String::from)
                .to_vec(),
            llm_command: ["claude", "-p"].map(String::from).to_vec(),
            http_port: 0,
            http_enabled: true,
            strict_http: false,
            store_dir: None,
        }
    }
}

impl Config {
    /// Loads the config from [`config_path`].
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    /// Loads the config from `path`, falling back to defaults on any error.
    pub fn load_from(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no config file, using defaults");
                return Self::default();
            }
        };
        Self::parse(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "config parse error, using defaults");
            Self::default()
        })
    }

    /// Parses config text. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns the `toml` error when the text is not valid TOML or a known
    /// key has the wrong type.
    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// The review store this config points at.
    pub fn store(&self) -> ReviewStore {
        ReviewStore::new(self.store_dir.clone().unwrap_or_else(ReviewStore::default_base))
    }
}

/// Returns the path to the config file.
///
/// Prefers `$XDG_CONFIG_HOME/hunkwise/config.toml`; falls back to
/// `~/.config/hunkwise/config.toml` when the env var is absent.
pub fn config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
        .unwrap_or_else(|| PathBuf::from(".config"));
    base.join(crate::APP_NAME).join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn keys_override_defaults() {
        let cfg = Config::parse(
            r#"
            theme = "dark"
            llm_command = ["llm", "--json"]
            http_port = 7777
            strict_http = true
            store_dir = "/tmp/reviews"
            something_else = 1
            "#,
        )
        .unwrap();
        assert_eq!(cfg.theme, "dark");
        assert_eq!(cfg.llm_command, ["llm", "--json"]);
        assert_eq!(cfg.http_port, 7777);
        assert!(cfg.strict_http);
        assert!(cfg.http_enabled);
        assert_eq!(cfg.diff_command[0], "git");
        assert_eq!(cfg.store().base(), Path::new("/tmp/reviews"));
    }

    #[test]
    fn malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "theme = [unterminated").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
        assert_eq!(Config::load_from(&dir.path().join("missing.toml")), Config::default());
    }
}
