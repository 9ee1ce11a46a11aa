//! MSD summary databases: `track_metadata.db` and `artist_term.db`.

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;

use super::{SongMetadata, SongMetadataReader};
use crate::{LakhError, MsdId, Result};

pub const TRACK_METADATA_DB: &str = "track_metadata.db";
pub const ARTIST_TERM_DB: &str = "artist_term.db";

/// Reads song metadata from the MSD SQLite dumps.
///
/// `artist_term.db` is optional; without it terms and tags come back empty.
/// The dumps carry MusicBrainz tags without vote counts.
pub struct SqliteReader {
    conn: Connection,
    has_terms: bool,
}

impl SqliteReader {
    /// Open the databases in `dir` read-only.
    pub fn open(dir: &Path) -> Result<Self> {
        let track_db = dir.join(TRACK_METADATA_DB);
        if !track_db.exists() {
            return Err(LakhError::io(
                &track_db,
                std::io::Error::new(std::io::ErrorKind::NotFound, "track_metadata.db not found"),
            ));
        }

        let conn = Connection::open_with_flags(
            &track_db,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        let term_db = dir.join(ARTIST_TERM_DB);
        let has_terms = term_db.exists();
        if has_terms {
            conn.execute(
                "ATTACH DATABASE ?1 AS terms",
                params![term_db.to_string_lossy().into_owned()],
            )?;
        } else {
            tracing::warn!(path = %term_db.display(), "artist_term.db missing, tags will be empty");
        }

        Ok(Self { conn, has_terms })
    }

    fn artist_strings(&self, sql: &str, artist_id: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params![artist_id], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

impl SongMetadataReader for SqliteReader {
    fn read(&self, id: &MsdId) -> Result<SongMetadata> {
        let row = self
            .conn
            .query_row(
                "SELECT title, artist_name, release, artist_id FROM songs WHERE track_id = ?1",
                params![id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((title, artist, album, artist_id)) = row else {
            return Err(LakhError::MissingRecord(id.to_string()));
        };

        let mut metadata = SongMetadata {
            title: title.unwrap_or_default(),
            artist: artist.unwrap_or_default(),
            album: album.unwrap_or_default(),
            ..Default::default()
        };

        if let (true, Some(artist_id)) = (self.has_terms, artist_id) {
            metadata.artist_terms = self.artist_strings(
                "SELECT term FROM terms.artist_term WHERE artist_id = ?1 ORDER BY rowid",
                &artist_id,
            )?;
            metadata.mb_tags = self.artist_strings(
                "SELECT mbtag FROM terms.artist_mbtag WHERE artist_id = ?1 ORDER BY rowid",
                &artist_id,
            )?;
        }

        Ok(metadata)
    }
}
