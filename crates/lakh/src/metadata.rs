//! The per-song metadata table (`lmd_metadata.csv`).
//!
//! One row per matched song. The table is always rebuilt wholesale, never
//! patched in place.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::{LakhError, Result};

/// CSV column order.
pub const METADATA_HEADER: [&str; 7] = [
    "msdID",
    "md5",
    "artist",
    "track",
    "album",
    "mb_genre",
    "mb_genre_count",
];

/// One song in the metadata table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongRecord {
    #[serde(rename = "msdID")]
    pub msd_id: String,
    pub md5: String,
    pub artist: String,
    pub track: String,
    pub album: String,
    /// Top MusicBrainz artist tag, if the record has any.
    pub mb_genre: Option<String>,
    pub mb_genre_count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataTable {
    records: Vec<SongRecord>,
}

impl MetadataTable {
    pub fn new(records: Vec<SongRecord>) -> Self {
        Self { records }
    }

    pub fn push(&mut self, record: SongRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[SongRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the table, header first, truncating any existing file.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| LakhError::io(parent, e))?;
        }

        let mut writer = csv::Writer::from_path(path)?;
        if self.records.is_empty() {
            // serde only emits the header alongside the first record
            writer.write_record(METADATA_HEADER)?;
        }
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush().map_err(|e| LakhError::io(path, e))?;
        Ok(())
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let records = reader
            .deserialize()
            .collect::<std::result::Result<Vec<SongRecord>, _>>()?;
        Ok(Self { records })
    }

    /// All songs tagged with `genre`.
    pub fn songs_in_genre(&self, genre: &str) -> Result<Vec<&SongRecord>> {
        let songs: Vec<&SongRecord> = self
            .records
            .iter()
            .filter(|r| r.mb_genre.as_deref() == Some(genre))
            .collect();

        if songs.is_empty() {
            return Err(LakhError::UnknownGenre(genre.to_string()));
        }
        Ok(songs)
    }

    pub fn random_song_in_genre<R: Rng + ?Sized>(
        &self,
        genre: &str,
        rng: &mut R,
    ) -> Result<&SongRecord> {
        let songs = self.songs_in_genre(genre)?;
        songs
            .choose(rng)
            .copied()
            .ok_or_else(|| LakhError::UnknownGenre(genre.to_string()))
    }

    /// Genres with at least `n` distinct MSD IDs, sorted by name.
    pub fn genres_with_at_least(&self, n: usize) -> Vec<String> {
        let mut ids_per_genre: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for record in &self.records {
            if let Some(genre) = record.mb_genre.as_deref() {
                ids_per_genre
                    .entry(genre)
                    .or_default()
                    .insert(record.msd_id.as_str());
            }
        }

        ids_per_genre
            .into_iter()
            .filter(|(_, ids)| ids.len() >= n)
            .map(|(genre, _)| genre.to_string())
            .collect()
    }

    /// Songs of every genre that has at least `n` distinct IDs.
    pub fn songs_by_genre_of_size(&self, n: usize) -> BTreeMap<String, Vec<&SongRecord>> {
        let mut by_genre = BTreeMap::new();
        for genre in self.genres_with_at_least(n) {
            let songs: Vec<&SongRecord> = self
                .records
                .iter()
                .filter(|r| r.mb_genre.as_deref() == Some(genre.as_str()))
                .collect();
            by_genre.insert(genre, songs);
        }
        by_genre
    }
}
