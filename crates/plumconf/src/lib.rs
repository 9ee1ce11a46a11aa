//! Configuration loading for the plum dataset tools.
//!
//! Every plum crate takes its settings from [`PlumConfig`], which is built
//! once per process from compiled defaults, TOML files and environment
//! variables.
//!
//! # Usage
//!
//! ```rust,no_run
//! use plumconf::PlumConfig;
//!
//! let config = PlumConfig::load().expect("Failed to load config");
//!
//! println!("LMD root: {}", config.paths.data_dir.display());
//! println!("Match scores: {}", config.paths.match_scores_file().display());
//! println!("Encoder: {}", config.model.encoder_url);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/plum/config.toml` (system)
//! 2. `~/.config/plum/config.toml` (user)
//! 3. `./plum.toml` (local override, replaced by `--config <path>`)
//! 4. Environment variables (`PLUM_*`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! data_dir = "~/datasets/lmd"
//! models_dir = "~/models/music_vae"
//!
//! [lastfm]
//! credentials_file = "config/lastFM-api.json"
//! concurrency = 8
//!
//! [model]
//! encoder_url = "http://127.0.0.1:2010"
//! default_model = "cat-mel_2bar_big"
//!
//! [telemetry]
//! log_level = "info"
//! log_file = "logs/plum.log"
//! ```

pub mod credentials;
pub mod loader;
pub mod paths;
pub mod services;

pub use credentials::{load_api_key, read_credentials_file};
pub use loader::{discover_config_files_with_override, expand_path, ConfigSources};
pub use paths::{PathsConfig, TelemetryConfig};
pub use services::{LastFmConfig, ModelConfig};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("No Last.fm API key configured and no credentials file at {path}")]
    MissingApiKey { path: PathBuf },
}

/// Complete plum configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PlumConfig {
    pub paths: PathsConfig,
    pub lastfm: LastFmConfig,
    pub model: ModelConfig,
    pub telemetry: TelemetryConfig,
}

impl PlumConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    ///
    /// If `config_path` is provided, it takes precedence over the local
    /// `./plum.toml` override. System and user configs still load first.
    pub fn load_from(config_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&std::path::Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = PlumConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            let file_config = loader::load_from_file(&path)?;
            config = loader::merge_configs(config, file_config);
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize the effective config to TOML, derived paths included.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# plum configuration (effective)\n\n");

        output.push_str("[paths]\n");
        output.push_str(&format!("data_dir = \"{}\"\n", self.paths.data_dir.display()));
        output.push_str(&format!(
            "match_scores_file = \"{}\"\n",
            self.paths.match_scores_file().display()
        ));
        output.push_str(&format!(
            "metadata_csv = \"{}\"\n",
            self.paths.metadata_csv().display()
        ));
        output.push_str(&format!(
            "genre_json = \"{}\"\n",
            self.paths.genre_json().display()
        ));
        output.push_str(&format!(
            "cleaned_dir = \"{}\"\n",
            self.paths.cleaned_dir().display()
        ));
        output.push_str(&format!(
            "msd_sqlite_dir = \"{}\"\n",
            self.paths.msd_sqlite_dir().display()
        ));
        output.push_str(&format!("models_dir = \"{}\"\n", self.paths.models_dir.display()));
        output.push_str(&format!("output_dir = \"{}\"\n", self.paths.output_dir.display()));

        output.push_str("\n[lastfm]\n");
        if self.lastfm.api_key.is_some() {
            // Never echo the key itself
            output.push_str("api_key = \"<set>\"\n");
        }
        output.push_str(&format!(
            "credentials_file = \"{}\"\n",
            self.lastfm.credentials_file.display()
        ));
        output.push_str(&format!("base_url = \"{}\"\n", self.lastfm.base_url));
        output.push_str(&format!("timeout_secs = {}\n", self.lastfm.timeout_secs));
        output.push_str(&format!("concurrency = {}\n", self.lastfm.concurrency));
        output.push_str(&format!("max_retries = {}\n", self.lastfm.max_retries));

        output.push_str("\n[model]\n");
        output.push_str(&format!("encoder_url = \"{}\"\n", self.model.encoder_url));
        output.push_str(&format!("default_model = \"{}\"\n", self.model.default_model));
        output.push_str(&format!("batch_size = {}\n", self.model.batch_size));
        output.push_str(&format!("timeout_secs = {}\n", self.model.timeout_secs));
        output.push_str(&format!(
            "multitrack_checkpoint = \"{}\"\n",
            self.model.multitrack_checkpoint
        ));
        output.push_str(&format!(
            "multitrack_chords_checkpoint = \"{}\"\n",
            self.model.multitrack_chords_checkpoint
        ));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));
        if let Some(file) = &self.telemetry.log_file {
            output.push_str(&format!("log_file = \"{}\"\n", file.display()));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlumConfig::default();
        assert_eq!(config.paths.data_dir, PathBuf::from("data"));
        assert_eq!(config.lastfm.concurrency, 8);
        assert_eq!(config.model.default_model, "cat-mel_2bar_big");
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn test_to_toml_parses_back() {
        let config = PlumConfig::default();
        let rendered = config.to_toml();
        assert!(rendered.contains("[paths]"));
        assert!(rendered.contains("[lastfm]"));
        assert!(rendered.contains("[model]"));

        let reparsed: PlumConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(reparsed.model, config.model);
        assert_eq!(reparsed.paths.match_scores_file(), config.paths.match_scores_file());
    }

    #[test]
    fn test_to_toml_hides_api_key() {
        let mut config = PlumConfig::default();
        config.lastfm.api_key = Some("secret-key".to_string());
        let rendered = config.to_toml();
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("api_key = \"<set>\""));
    }
}
