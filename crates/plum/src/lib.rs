//! plum - Lakh MIDI dataset preparation and MusicVAE latent encoding.
//!
//! - **lastfm**: Last.fm top-tag client with bounded fan-out
//! - **encoder**: the [`LatentEncoder`] seam and its HTTP implementation
//! - **batch**: the skip-and-count encode loop
//! - **dataset**: builders for the metadata CSV, genre JSON and cleaned MIDI
//! - **telemetry**: logging setup for the binary

pub mod batch;
pub mod dataset;
pub mod encoder;
pub mod lastfm;
pub mod telemetry;

pub use batch::{encode_songs, EncodeMode, EncodeTally, EncodedSample, EncodingSet};
pub use dataset::{
    make_genre_json, make_metadata_csv, prepare_midi, random_song_from_genre, songs_from_genre,
    BuildReport, SongFile,
};
pub use encoder::{EncodeError, FailureKind, LatentEncoder, LatentVector, MusicVaeClient};
pub use lastfm::{fetch_top_genres, LastFmClient, LastFmError, TagQuery};
