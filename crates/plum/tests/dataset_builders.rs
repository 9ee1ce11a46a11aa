//! Dataset builders over a miniature LMD tree.

use anyhow::Result;
use lakh::{
    GenreTable, LakhError, LakhLayout, MetadataTable, MatchScores, MsdId, SongMetadata,
    SongMetadataReader, SqliteReader,
};
use midi_prep::{sequence_to_midi, NoteSequence, SeqNote};
use plum::dataset::{
    count_matched, locate, make_genre_json, make_metadata_csv, prepare_midi, random_song_from_genre,
    songs_from_genre,
};
use plum::LastFmClient;
use plumconf::PlumConfig;
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GOOD: &str = "TRAAAGR128F425B14B";
const UNMATCHED: &str = "TRAAAHD128F42635A5";
const NO_RECORD: &str = "TRABBCD128F4213456";
const BEST_MD5: &str = "1d9d16a9da90c090809c153754823c2b";

struct FixedReader(HashMap<String, SongMetadata>);

impl SongMetadataReader for FixedReader {
    fn read(&self, id: &MsdId) -> lakh::Result<SongMetadata> {
        self.0
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| LakhError::MissingRecord(id.to_string()))
    }
}

fn two_instrument_song() -> NoteSequence {
    let mut seq = NoteSequence::empty();
    for (instrument, pitch) in [(0u32, 60u8), (1, 36)] {
        seq.notes.push(SeqNote {
            pitch,
            velocity: 100,
            start_time: 0.0,
            end_time: 1.0,
            instrument,
            program: if instrument == 0 { 0 } else { 33 },
            is_drum: false,
        });
    }
    seq.total_time = 1.0;
    seq
}

/// Three h5 stubs (one unmatched, one without MSD metadata) and one MIDI file.
fn fixture() -> Result<(PlumConfig, TempDir)> {
    let temp = TempDir::new()?;
    let mut config = PlumConfig::default();
    config.paths.data_dir = temp.path().to_path_buf();
    let layout = LakhLayout::new(temp.path());

    for raw in [GOOD, UNMATCHED, NO_RECORD] {
        let h5 = layout.h5_path(&MsdId::parse(raw)?);
        std::fs::create_dir_all(h5.parent().unwrap())?;
        std::fs::write(h5, b"")?;
    }

    let scores = json!({
        GOOD: {BEST_MD5: 0.82, "5dd29e99ed7bd3cc0c5177a6e9de22ea": 0.31},
        UNMATCHED: {"ff0c6e02a8a25ebc3ce3a6ba6d0dbf2e": 0.0},
        NO_RECORD: {"0a1b2c3d4e5f60718293a4b5c6d7e8f9": 0.6}
    });
    std::fs::write(config.paths.match_scores_file(), scores.to_string())?;

    let midi = layout.midi_path(&MsdId::parse(GOOD)?, BEST_MD5);
    std::fs::create_dir_all(midi.parent().unwrap())?;
    std::fs::write(midi, sequence_to_midi(&two_instrument_song()))?;

    Ok((config, temp))
}

fn reader() -> FixedReader {
    let mut songs = HashMap::new();
    songs.insert(
        GOOD.to_string(),
        SongMetadata {
            title: "Into the Nightlife".into(),
            artist: "Cyndi Lauper".into(),
            album: "Flip The Switch".into(),
            artist_terms: vec!["pop".into()],
            mb_tags: vec!["american".into(), "pop".into()],
            mb_tag_counts: vec![1, 4],
        },
    );
    songs.insert(
        UNMATCHED.to_string(),
        SongMetadata {
            title: "Unmatched".into(),
            ..Default::default()
        },
    );
    FixedReader(songs)
}

#[test]
fn metadata_csv_skips_unmatched_and_unreadable() -> Result<()> {
    let (config, _temp) = fixture()?;

    let report = make_metadata_csv(&config, &reader())?;
    assert_eq!(report.path, config.paths.metadata_csv());
    assert_eq!(report.written, 1);
    assert_eq!(report.skipped, 2);

    let table = MetadataTable::read_csv(&report.path)?;
    let row = &table.records()[0];
    assert_eq!(row.msd_id, GOOD);
    assert_eq!(row.md5, BEST_MD5);
    assert_eq!(row.artist, "Cyndi Lauper");
    assert_eq!(row.track, "Into the Nightlife");
    assert_eq!(row.album, "Flip The Switch");
    assert_eq!(row.mb_genre.as_deref(), Some("pop"));
    assert_eq!(row.mb_genre_count, Some(4));
    Ok(())
}

#[test]
fn metadata_csv_from_sqlite_has_no_counts() -> Result<()> {
    let (config, temp) = fixture()?;
    let conn = Connection::open(temp.path().join("track_metadata.db"))?;
    conn.execute_batch(&format!(
        "CREATE TABLE songs (track_id TEXT PRIMARY KEY, title TEXT, song_id TEXT,
            release TEXT, artist_id TEXT, artist_name TEXT);
         INSERT INTO songs VALUES ('{GOOD}', 'Into the Nightlife', 'SO1',
            'Flip The Switch', 'AR1', 'Cyndi Lauper');"
    ))?;
    let conn = Connection::open(temp.path().join("artist_term.db"))?;
    conn.execute_batch(
        "CREATE TABLE artist_term (artist_id TEXT, term TEXT);
         CREATE TABLE artist_mbtag (artist_id TEXT, mbtag TEXT);
         INSERT INTO artist_mbtag VALUES ('AR1', 'pop'), ('AR1', 'american');",
    )?;

    let reader = SqliteReader::open(&config.paths.msd_sqlite_dir())?;
    let report = make_metadata_csv(&config, &reader)?;
    assert_eq!(report.written, 1);

    let table = MetadataTable::read_csv(&report.path)?;
    assert_eq!(table.records()[0].mb_genre.as_deref(), Some("pop"));
    assert_eq!(table.records()[0].mb_genre_count, None);
    Ok(())
}

#[test]
fn missing_match_scores_is_fatal() -> Result<()> {
    let (config, _temp) = fixture()?;
    std::fs::remove_file(config.paths.match_scores_file())?;
    assert!(make_metadata_csv(&config, &reader()).is_err());
    Ok(())
}

#[tokio::test]
async fn genre_json_keeps_first_tag_of_found_songs() -> Result<()> {
    let (mut config, _temp) = fixture()?;
    make_metadata_csv(&config, &reader())?;

    // Add a second song by hand so one lookup can miss.
    let mut table = MetadataTable::read_csv(&config.paths.metadata_csv())?;
    let mut other = table.records()[0].clone();
    other.msd_id = NO_RECORD.into();
    other.artist = "Unknown Artist".into();
    table.push(other);
    table.write_csv(&config.paths.metadata_csv())?;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("artist", "Cyndi Lauper"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "toptags": {"tag": [{"name": "Pop", "count": 100}, {"name": "80s", "count": 60}]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("artist", "Unknown Artist"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"error": 6, "message": "Track not found"})),
        )
        .mount(&server)
        .await;

    config.lastfm.concurrency = 2;
    let client = LastFmClient::new("key", &server.uri(), Duration::from_secs(5))?;
    let report = make_genre_json(&config, &client).await?;
    assert_eq!(report.written, 1);
    assert_eq!(report.skipped, 1);

    let genres = GenreTable::load(&config.paths.genre_json())?;
    assert_eq!(genres.len(), 1);
    assert_eq!(genres.get(GOOD), Some("pop"));

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(config.paths.genre_json())?)?;
    assert_eq!(raw, json!({GOOD: "pop"}));
    Ok(())
}

#[tokio::test]
async fn genre_json_needs_metadata_table() -> Result<()> {
    let (config, _temp) = fixture()?;
    let client = LastFmClient::new("key", "http://127.0.0.1:1/", Duration::from_secs(1))?;
    assert!(make_genre_json(&config, &client).await.is_err());
    Ok(())
}

#[test]
fn prepare_writes_cleaned_and_split_files() -> Result<()> {
    let (config, _temp) = fixture()?;
    let scores = MatchScores::load(config.paths.match_scores_file())?;

    let dirs = prepare_midi(&config, &scores, &[MsdId::parse(GOOD)?])?;
    let dir = config.paths.cleaned_dir().join(BEST_MD5);
    assert_eq!(dirs, vec![dir.clone()]);

    let cleaned = std::fs::read(dir.join(format!("{BEST_MD5}_cleaned.mid")))?;
    let (_, timeline) = midi_prep::timing::parse(&cleaned)?;
    assert!(timeline.tempo_changes.is_empty());
    assert!(timeline.time_signatures.is_empty());
    assert_eq!(timeline.notes.len(), 2);

    let mut names: Vec<String> = std::fs::read_dir(&dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            format!("{BEST_MD5}_cleaned.mid"),
            "track0_.mid".to_string(),
            "track1_Instrument 0.mid".to_string(),
            "track2_Instrument 1.mid".to_string(),
        ]
    );

    let bass = NoteSequence::from_file(&dir.join("track2_Instrument 1.mid"))?;
    assert_eq!(bass.notes.len(), 1);
    assert_eq!(bass.notes[0].pitch, 36);
    Ok(())
}

#[test]
fn prepare_fails_for_unmatched_song() -> Result<()> {
    let (config, _temp) = fixture()?;
    let scores = MatchScores::load(config.paths.match_scores_file())?;
    assert!(prepare_midi(&config, &scores, &[MsdId::parse(UNMATCHED)?]).is_err());
    Ok(())
}

#[test]
fn songs_by_genre_resolve_to_midi_paths() -> Result<()> {
    let (config, _temp) = fixture()?;
    make_metadata_csv(&config, &reader())?;

    let songs = songs_from_genre(&config, "pop")?;
    assert_eq!(songs.len(), 1);
    assert_eq!(songs[0].msd_id.as_str(), GOOD);
    assert!(songs[0].path.exists());

    let mut rng = StdRng::seed_from_u64(7);
    assert_eq!(random_song_from_genre(&config, "pop", &mut rng)?, songs[0]);

    assert!(songs_from_genre(&config, "polka").is_err());
    Ok(())
}

#[test]
fn locate_and_count() -> Result<()> {
    let (config, temp) = fixture()?;
    let id = MsdId::parse(GOOD)?;

    assert_eq!(
        locate(&config, None, &id)?,
        temp.path().join("lmd_matched_h5/A/A/A/TRAAAGR128F425B14B.h5")
    );
    let scores = MatchScores::load(config.paths.match_scores_file())?;
    assert_eq!(
        locate(&config, Some(&scores), &id)?,
        temp.path()
            .join("lmd_matched/A/A/A/TRAAAGR128F425B14B")
            .join(format!("{BEST_MD5}.mid"))
    );
    assert_eq!(count_matched(&config)?, 3);
    Ok(())
}
