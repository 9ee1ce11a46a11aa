//! External services: the Last.fm tag API and the MusicVAE encoder service.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Last.fm `track.getTopTags` client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LastFmConfig {
    /// API key. When unset, the key is read from `credentials_file`.
    pub api_key: Option<String>,

    /// JSON credentials file of the form `{"API key": "..."}`.
    /// Default: ./config/lastFM-api.json
    pub credentials_file: PathBuf,

    /// API root.
    /// Default: https://ws.audioscrobbler.com/2.0/
    pub base_url: String,

    /// Per-request timeout in seconds.
    /// Default: 10
    pub timeout_secs: u64,

    /// Maximum requests in flight during a batch lookup.
    /// Default: 8
    pub concurrency: usize,

    /// Retries for transient failures (network, 5xx, rate limiting).
    /// Default: 3
    pub max_retries: u32,
}

impl LastFmConfig {
    pub(crate) fn default_credentials_file() -> PathBuf {
        PathBuf::from("config").join("lastFM-api.json")
    }

    pub(crate) fn default_base_url() -> String {
        "https://ws.audioscrobbler.com/2.0/".to_string()
    }

    pub(crate) fn default_timeout_secs() -> u64 {
        10
    }

    pub(crate) fn default_concurrency() -> usize {
        8
    }

    pub(crate) fn default_max_retries() -> u32 {
        3
    }
}

impl Default for LastFmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            credentials_file: Self::default_credentials_file(),
            base_url: Self::default_base_url(),
            timeout_secs: Self::default_timeout_secs(),
            concurrency: Self::default_concurrency(),
            max_retries: Self::default_max_retries(),
        }
    }
}

/// MusicVAE encoder service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL of the model-serving process hosting the encoder.
    /// Default: http://127.0.0.1:2010
    pub encoder_url: String,

    /// Model used when a command does not name one.
    /// Default: cat-mel_2bar_big
    pub default_model: String,

    /// Batch size the service builds its graph with.
    /// Default: 8
    pub batch_size: u32,

    /// Request timeout in seconds. Encoding a long file can be slow.
    /// Default: 120
    pub timeout_secs: u64,

    /// Checkpoint file for `hier-multiperf_vel_1bar_med`.
    pub multitrack_checkpoint: String,

    /// Checkpoint file for `hier-multiperf_vel_1bar_med_chords`.
    pub multitrack_chords_checkpoint: String,
}

impl ModelConfig {
    pub(crate) fn default_encoder_url() -> String {
        "http://127.0.0.1:2010".to_string()
    }

    pub(crate) fn default_model() -> String {
        "cat-mel_2bar_big".to_string()
    }

    pub(crate) fn default_batch_size() -> u32 {
        8
    }

    pub(crate) fn default_timeout_secs() -> u64 {
        120
    }

    pub(crate) fn default_multitrack_checkpoint() -> String {
        "model_fb256.ckpt".to_string()
    }

    pub(crate) fn default_multitrack_chords_checkpoint() -> String {
        "model_chords_fb64.ckpt".to_string()
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            encoder_url: Self::default_encoder_url(),
            default_model: Self::default_model(),
            batch_size: Self::default_batch_size(),
            timeout_secs: Self::default_timeout_secs(),
            multitrack_checkpoint: Self::default_multitrack_checkpoint(),
            multitrack_chords_checkpoint: Self::default_multitrack_chords_checkpoint(),
        }
    }
}
