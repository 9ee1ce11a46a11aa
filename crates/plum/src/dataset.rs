//! Builders for the derived dataset files, and song selection by genre.
//!
//! Builders rebuild their output wholesale. Per-song problems are logged and
//! counted, while a missing input table stops the run.

use anyhow::{Context, Result};
use lakh::{
    scan_h5_ids, GenreTable, LakhLayout, MatchScores, MetadataTable, MsdId, SongMetadataReader,
    SongRecord,
};
use midi_prep::{split_tracks, strip_changes};
use plumconf::PlumConfig;
use rand::Rng;
use std::path::PathBuf;

use crate::lastfm::{fetch_top_genres, LastFmClient, TagQuery};

/// A song and the MIDI file chosen for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongFile {
    pub msd_id: MsdId,
    pub path: PathBuf,
}

/// What a builder wrote and what it had to leave out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub path: PathBuf,
    pub written: usize,
    pub skipped: usize,
}

fn lakh_layout(config: &PlumConfig) -> LakhLayout {
    LakhLayout::new(&config.paths.data_dir)
}

fn build_record(
    id: &MsdId,
    scores: &MatchScores,
    reader: &dyn SongMetadataReader,
) -> lakh::Result<SongRecord> {
    let md5 = scores.best_match(id)?;
    let meta = reader.read(id)?;

    let top = meta.top_mb_tag();
    let mb_genre = top.map(|(tag, _)| tag.to_string());
    let mb_genre_count = if meta.mb_tag_counts.is_empty() {
        None
    } else {
        top.map(|(_, count)| count)
    };

    Ok(SongRecord {
        msd_id: id.to_string(),
        md5,
        artist: meta.artist,
        track: meta.title,
        album: meta.album,
        mb_genre,
        mb_genre_count,
    })
}

/// Write `lmd_metadata.csv`: one row per h5 record that has a match and
/// readable metadata.
pub fn make_metadata_csv(config: &PlumConfig, reader: &dyn SongMetadataReader) -> Result<BuildReport> {
    let scores_path = config.paths.match_scores_file();
    let scores = MatchScores::load(&scores_path)
        .with_context(|| format!("Failed to load match scores from {}", scores_path.display()))?;

    let h5_dir = config.paths.lmd_matched_h5_dir();
    let ids = scan_h5_ids(&h5_dir)
        .with_context(|| format!("Failed to scan {}", h5_dir.display()))?;
    tracing::info!(count = ids.len(), dir = %h5_dir.display(), "found h5 records");

    let mut table = MetadataTable::default();
    let mut skipped = 0usize;
    for id in &ids {
        match build_record(id, &scores, reader) {
            Ok(record) => {
                tracing::debug!(msd_id = %id, md5 = %record.md5, "metadata row");
                table.push(record);
            }
            Err(e) => {
                tracing::warn!(msd_id = %id, error = %e, "skipping song");
                skipped += 1;
            }
        }
    }

    let path = config.paths.metadata_csv();
    table
        .write_csv(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), written = table.len(), skipped, "wrote metadata table");

    Ok(BuildReport {
        path,
        written: table.len(),
        skipped,
    })
}

fn read_metadata(config: &PlumConfig) -> Result<MetadataTable> {
    let path = config.paths.metadata_csv();
    MetadataTable::read_csv(&path).with_context(|| {
        format!(
            "Failed to read {}; run `plum metadata` first",
            path.display()
        )
    })
}

/// Write `{msdID: genre}` from each song's top Last.fm tag. Songs without a
/// tag are left out.
pub async fn make_genre_json(config: &PlumConfig, client: &LastFmClient) -> Result<BuildReport> {
    let table = read_metadata(config)?;

    let queries: Vec<TagQuery> = table
        .records()
        .iter()
        .filter_map(|r| match MsdId::parse(&r.msd_id) {
            Ok(msd_id) => Some(TagQuery {
                msd_id,
                artist: r.artist.clone(),
                title: r.track.clone(),
            }),
            Err(e) => {
                tracing::warn!(error = %e, "skipping metadata row");
                None
            }
        })
        .collect();
    let total = queries.len();
    tracing::info!(count = total, concurrency = config.lastfm.concurrency, "fetching Last.fm genres");

    let mut genres = GenreTable::new();
    for (id, genre) in fetch_top_genres(client, queries, config.lastfm.concurrency).await {
        if let Some(genre) = genre {
            genres.insert(id.into_inner(), genre);
        }
    }

    let path = config.paths.genre_json();
    genres
        .save(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), tagged = genres.len(), total, "wrote genre table");

    Ok(BuildReport {
        path,
        written: genres.len(),
        skipped: total.saturating_sub(genres.len()),
    })
}

/// Clean and split the best-matching MIDI file of each song.
///
/// Writes `<cleaned>/<md5>/<md5>_cleaned.mid` with key, meter and tempo
/// events removed, then one `track<i>_<name>.mid` per track beside it.
/// Returns the per-song directories in input order.
pub fn prepare_midi(config: &PlumConfig, scores: &MatchScores, ids: &[MsdId]) -> Result<Vec<PathBuf>> {
    let layout = lakh_layout(config);
    let cleaned_root = config.paths.cleaned_dir();
    let mut dirs = Vec::with_capacity(ids.len());

    for id in ids {
        let md5 = scores.best_match(id)?;
        let source = layout.midi_path(id, &md5);
        let bytes = std::fs::read(&source)
            .with_context(|| format!("Failed to read {}", source.display()))?;

        let cleaned = strip_changes(&bytes)
            .with_context(|| format!("Failed to clean {}", source.display()))?;

        let dir = cleaned_root.join(&md5);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let cleaned_path = dir.join(format!("{md5}_cleaned.mid"));
        std::fs::write(&cleaned_path, &cleaned)
            .with_context(|| format!("Failed to write {}", cleaned_path.display()))?;

        let tracks = split_tracks(&cleaned)
            .with_context(|| format!("Failed to split {}", cleaned_path.display()))?;
        for track in &tracks {
            tracing::info!(msd_id = %id, index = track.index, name = %track.name, "split track");
            let track_path = dir.join(track.file_name());
            std::fs::write(&track_path, &track.bytes)
                .with_context(|| format!("Failed to write {}", track_path.display()))?;
        }

        tracing::info!(msd_id = %id, %md5, tracks = tracks.len(), dir = %dir.display(), "prepared MIDI");
        dirs.push(dir);
    }

    Ok(dirs)
}

fn song_file(layout: &LakhLayout, record: &SongRecord) -> Result<SongFile> {
    let msd_id = MsdId::parse(&record.msd_id)?;
    let path = layout.midi_path(&msd_id, &record.md5);
    Ok(SongFile { msd_id, path })
}

/// Every song of `genre` with the path of its matched MIDI file.
pub fn songs_from_genre(config: &PlumConfig, genre: &str) -> Result<Vec<SongFile>> {
    let table = read_metadata(config)?;
    songs_in_table(&table, &lakh_layout(config), genre)
}

pub fn songs_in_table(table: &MetadataTable, layout: &LakhLayout, genre: &str) -> Result<Vec<SongFile>> {
    table
        .songs_in_genre(genre)?
        .into_iter()
        .map(|record| song_file(layout, record))
        .collect()
}

pub fn random_song_from_genre<R: Rng + ?Sized>(
    config: &PlumConfig,
    genre: &str,
    rng: &mut R,
) -> Result<SongFile> {
    let table = read_metadata(config)?;
    let record = table.random_song_in_genre(genre, rng)?;
    tracing::info!(genre, msd_id = %record.msd_id, artist = %record.artist, track = %record.track, "selected random song");
    song_file(&lakh_layout(config), record)
}

/// Number of songs with an MSD match, counted from the h5 tree.
pub fn count_matched(config: &PlumConfig) -> Result<usize> {
    let dir = config.paths.lmd_matched_h5_dir();
    lakh::count_matched_songs(&dir).with_context(|| format!("Failed to scan {}", dir.display()))
}

/// Path of the best-matching MIDI file when match scores are given,
/// otherwise the song's h5 record.
pub fn locate(config: &PlumConfig, scores: Option<&MatchScores>, id: &MsdId) -> Result<PathBuf> {
    let layout = lakh_layout(config);
    match scores {
        Some(scores) => Ok(layout.midi_path(id, &scores.best_match(id)?)),
        None => Ok(layout.h5_path(id)),
    }
}
