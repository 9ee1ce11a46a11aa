//! Per-song Million Song Dataset metadata.
//!
//! The MSD ships the same fields two ways: one HDF5 file per song, and the
//! summary SQLite databases (`track_metadata.db`, `artist_term.db`). Both
//! sit behind [`SongMetadataReader`] so the table builders don't care which
//! one is on disk.

mod sqlite;
#[cfg(feature = "hdf5")]
mod h5;

pub use sqlite::SqliteReader;
#[cfg(feature = "hdf5")]
pub use h5::H5Reader;

use crate::{MsdId, Result};

/// The subset of an MSD record the metadata table needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SongMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub artist_terms: Vec<String>,
    /// MusicBrainz artist tags.
    pub mb_tags: Vec<String>,
    /// Vote counts parallel to `mb_tags`. Empty when the source has none.
    pub mb_tag_counts: Vec<u32>,
}

impl SongMetadata {
    /// The most-voted MusicBrainz tag and its count.
    ///
    /// Without counts the first tag wins with a count of zero. Ties keep the
    /// earlier tag.
    pub fn top_mb_tag(&self) -> Option<(&str, u32)> {
        if self.mb_tag_counts.len() != self.mb_tags.len() {
            return self.mb_tags.first().map(|t| (t.as_str(), 0));
        }

        let mut best: Option<(&str, u32)> = None;
        for (tag, &count) in self.mb_tags.iter().zip(&self.mb_tag_counts) {
            match best {
                Some((_, c)) if c >= count => {}
                _ => best = Some((tag.as_str(), count)),
            }
        }
        best
    }
}

/// Reads MSD metadata for one song.
pub trait SongMetadataReader {
    fn read(&self, id: &MsdId) -> Result<SongMetadata>;
}
