//! Lakh MIDI Dataset / Million Song Dataset plumbing.
//!
//! Everything the plum tools need to find files and tables on disk:
//! - **MsdId**: validated track IDs and the 3-level directory shard
//! - **LakhLayout**: `lmd_matched` / `lmd_matched_h5` paths under a data root
//! - **MatchScores**: the `{msd_id: {md5: score}}` match table
//! - **MetadataTable**: the per-song genre CSV
//! - **GenreTable**: the `{msdID: genre}` Last.fm lookup
//! - **msd**: per-song MSD metadata readers (SQLite, optional HDF5)
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use lakh::{LakhLayout, MatchScores, MsdId};
//!
//! let layout = LakhLayout::new("data");
//! let scores = MatchScores::load("data/match_scores.json").unwrap();
//!
//! let id: MsdId = "TRAAAGR128F425B14B".parse().unwrap();
//! let md5 = scores.best_match(&id).unwrap();
//! println!("{}", layout.midi_path(&id, &md5).display());
//! ```
//!
//! # Layout
//!
//! ```text
//! data/
//!   lmd_matched/A/A/A/TRAAAGR128F425B14B/<md5>.mid
//!   lmd_matched_h5/A/A/A/TRAAAGR128F425B14B.h5
//!   match_scores.json
//! ```

pub mod genre;
pub mod layout;
pub mod metadata;
pub mod msd;
pub mod msd_id;
pub mod scores;

pub use genre::GenreTable;
pub use layout::{count_matched_songs, scan_h5_ids, LakhLayout};
pub use metadata::{MetadataTable, SongRecord};
pub use msd::{SongMetadata, SongMetadataReader, SqliteReader};
pub use msd_id::MsdId;
pub use scores::MatchScores;

#[cfg(feature = "hdf5")]
pub use msd::H5Reader;

use std::path::PathBuf;
use thiserror::Error;

/// Errors from dataset lookups and table IO.
#[derive(Debug, Error)]
pub enum LakhError {
    #[error("invalid MSD ID {0:?}: need at least 5 ASCII alphanumeric characters")]
    InvalidMsdId(String),

    #[error("MSD ID {0} is not in the match-score table")]
    UnknownMsdId(String),

    #[error("no MIDI candidate with a positive match score for {id}")]
    NotMatched { id: String },

    #[error("genre {0:?} does not appear in the metadata table")]
    UnknownGenre(String),

    #[error("no MSD metadata record for {0}")]
    MissingRecord(String),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    H5(String),
}

impl LakhError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, LakhError>;
