//! Per-song MSD HDF5 records (`lmd_matched_h5/A/B/C/<id>.h5`).

use hdf5_metno as hdf5;
use hdf5::types::FixedAscii;
use hdf5::H5Type;

use super::{SongMetadata, SongMetadataReader};
use crate::{LakhError, LakhLayout, MsdId, Result};

/// MSD string columns are fixed 1024-byte ASCII (`MAXSTRLEN`).
type MsdString = FixedAscii<1024>;

#[derive(H5Type, Clone, Debug)]
#[repr(C)]
struct SongRow {
    title: MsdString,
    artist_name: MsdString,
    release: MsdString,
}

fn h5_err(e: hdf5::Error) -> LakhError {
    LakhError::H5(e.to_string())
}

fn text(s: &MsdString) -> String {
    String::from_utf8_lossy(s.as_bytes()).trim_end_matches('\0').to_string()
}

/// Reads metadata straight from the per-song `.h5` files.
pub struct H5Reader {
    layout: LakhLayout,
}

impl H5Reader {
    pub fn new(layout: LakhLayout) -> Self {
        Self { layout }
    }

    fn strings(file: &hdf5::File, name: &str) -> Result<Vec<String>> {
        let ds = file.dataset(name).map_err(h5_err)?;
        let values: Vec<MsdString> = ds.read_raw().map_err(h5_err)?;
        Ok(values.iter().map(text).collect())
    }
}

impl SongMetadataReader for H5Reader {
    fn read(&self, id: &MsdId) -> Result<SongMetadata> {
        let path = self.layout.h5_path(id);
        if !path.exists() {
            return Err(LakhError::MissingRecord(id.to_string()));
        }
        let file = hdf5::File::open(&path).map_err(h5_err)?;

        let songs: Vec<SongRow> = file
            .dataset("metadata/songs")
            .and_then(|ds| ds.read_raw())
            .map_err(h5_err)?;
        let song = songs
            .first()
            .ok_or_else(|| LakhError::MissingRecord(id.to_string()))?;

        let counts: Vec<i32> = file
            .dataset("musicbrainz/artist_mbtags_count")
            .and_then(|ds| ds.read_raw())
            .map_err(h5_err)?;

        Ok(SongMetadata {
            title: text(&song.title),
            artist: text(&song.artist_name),
            album: text(&song.release),
            artist_terms: Self::strings(&file, "metadata/artist_terms")?,
            mb_tags: Self::strings(&file, "musicbrainz/artist_mbtags")?,
            mb_tag_counts: counts.into_iter().map(|c| c.max(0) as u32).collect(),
        })
    }
}
