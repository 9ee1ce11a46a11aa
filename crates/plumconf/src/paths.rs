//! Dataset and output locations, plus logging settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filesystem locations for the Lakh/MSD data and everything derived from it.
///
/// Only `data_dir`, `models_dir` and `output_dir` are required. The other
/// locations default to well-known names under `data_dir`, so moving the
/// dataset only needs one setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root of the dataset: holds `lmd_matched/`, `lmd_matched_h5/` and the
    /// match-score file.
    /// Default: ./data
    pub data_dir: PathBuf,

    /// `match_scores.json` distributed with the LMD.
    pub match_scores_file: Option<PathBuf>,

    /// Metadata table written by `plum metadata`.
    pub metadata_csv: Option<PathBuf>,

    /// `{msdID: genre}` table written by `plum genres`.
    pub genre_json: Option<PathBuf>,

    /// Destination for cleaned and split MIDI files.
    pub cleaned_dir: Option<PathBuf>,

    /// Directory holding the MSD SQLite dumps (`track_metadata.db`,
    /// `artist_term.db`).
    pub msd_sqlite_dir: Option<PathBuf>,

    /// MusicVAE checkpoint directory.
    /// Default: ./models/music_vae
    pub models_dir: PathBuf,

    /// Generated MIDI files and encoding dumps.
    /// Default: ./output
    pub output_dir: PathBuf,
}

impl PathsConfig {
    pub(crate) fn default_data_dir() -> PathBuf {
        PathBuf::from("data")
    }

    pub(crate) fn default_models_dir() -> PathBuf {
        PathBuf::from("models").join("music_vae")
    }

    pub(crate) fn default_output_dir() -> PathBuf {
        PathBuf::from("output")
    }

    /// Sharded MIDI tree: `<data>/lmd_matched`.
    pub fn lmd_matched_dir(&self) -> PathBuf {
        self.data_dir.join("lmd_matched")
    }

    /// Sharded h5 tree: `<data>/lmd_matched_h5`.
    pub fn lmd_matched_h5_dir(&self) -> PathBuf {
        self.data_dir.join("lmd_matched_h5")
    }

    pub fn match_scores_file(&self) -> PathBuf {
        self.match_scores_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("match_scores.json"))
    }

    pub fn metadata_csv(&self) -> PathBuf {
        self.metadata_csv
            .clone()
            .unwrap_or_else(|| self.data_dir.join("lmd_metadata.csv"))
    }

    pub fn genre_json(&self) -> PathBuf {
        self.genre_json
            .clone()
            .unwrap_or_else(|| self.data_dir.join("lastfm_genre_msdid_matched.json"))
    }

    pub fn cleaned_dir(&self) -> PathBuf {
        self.cleaned_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("cleaned"))
    }

    pub fn msd_sqlite_dir(&self) -> PathBuf {
        self.msd_sqlite_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.clone())
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: Self::default_data_dir(),
            match_scores_file: None,
            metadata_csv: None,
            genre_json: None,
            cleaned_dir: None,
            msd_sqlite_dir: None,
            models_dir: Self::default_models_dir(),
            output_dir: Self::default_output_dir(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Filter directive (trace, debug, info, warn, error, or a full
    /// `EnvFilter` string).
    /// Default: info
    pub log_level: String,

    /// Also append logs to this file.
    pub log_file: Option<PathBuf>,
}

impl TelemetryConfig {
    pub(crate) fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            log_file: None,
        }
    }
}
