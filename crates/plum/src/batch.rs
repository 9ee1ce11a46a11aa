//! Drive many MIDI files through the encoder, skipping and counting failures.
//!
//! Nothing a single file does can stop the loop. Each failure lands in one
//! of three buckets and the tally is logged when the batch ends.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use lakh::MsdId;
use midi_prep::{split_by_num_bars, NoteSequence};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::dataset::SongFile;
use crate::encoder::{EncodeError, FailureKind, LatentEncoder, LatentVector};

/// Outcome counts for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeTally {
    /// Input files seen.
    pub files: usize,
    pub successful: usize,
    pub no_extracted: usize,
    pub multiple_extracted: usize,
    pub other: usize,
}

impl EncodeTally {
    pub fn record<T>(&mut self, result: &Result<T, EncodeError>) {
        match result {
            Ok(_) => self.successful += 1,
            Err(e) => self.record_failure(e.kind()),
        }
    }

    pub fn record_failure(&mut self, kind: FailureKind) {
        match kind {
            FailureKind::NoExtracted => self.no_extracted += 1,
            FailureKind::MultipleExtracted => self.multiple_extracted += 1,
            FailureKind::Other => self.other += 1,
        }
    }

    pub fn skipped(&self) -> usize {
        self.no_extracted + self.multiple_extracted + self.other
    }

    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for EncodeTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Extracted {} encodings from a total of {} files. Skipped {} \
             (no extracted examples: {}, multiple extracted examples: {}, other: {})",
            self.successful,
            self.files,
            self.skipped(),
            self.no_extracted,
            self.multiple_extracted,
            self.other
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeMode {
    /// Each file is one sequence.
    Whole,
    /// Each file is cut into windows of this many bars, encoded one by one.
    SplitBars(u32),
}

/// One latent vector and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedSample {
    pub msd_id: MsdId,
    pub genre: String,
    pub z: LatentVector,
}

fn progress_bar(len: usize, genre: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner:.cyan} [{bar:40.green/dim}] {pos}/{len} {msg:.dim}")
    {
        pb.set_style(style);
    }
    pb.set_message(genre.to_string());
    pb
}

async fn encode_one(encoder: &dyn LatentEncoder, seq: NoteSequence) -> Result<LatentVector, EncodeError> {
    encoder
        .encode(std::slice::from_ref(&seq))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| EncodeError::Other("encoder returned no vector".to_string()))
}

/// Encode every song of a genre.
///
/// Samples come back in input order. In [`EncodeMode::SplitBars`] the tally
/// counts windows, except that a file which cannot be loaded or split counts
/// once as `other`.
pub async fn encode_songs(
    encoder: &dyn LatentEncoder,
    genre: &str,
    songs: &[SongFile],
    mode: EncodeMode,
) -> (Vec<EncodedSample>, EncodeTally) {
    let mut samples = Vec::new();
    let mut tally = EncodeTally {
        files: songs.len(),
        ..Default::default()
    };
    let pb = progress_bar(songs.len(), genre);

    for song in songs {
        pb.inc(1);

        let seq = match NoteSequence::from_file(&song.path) {
            Ok(seq) => seq,
            Err(e) => {
                tracing::debug!(msd_id = %song.msd_id, path = %song.path.display(), error = %e, "skipping unreadable file");
                tally.record_failure(FailureKind::Other);
                continue;
            }
        };

        let windows = match mode {
            EncodeMode::Whole => vec![seq],
            EncodeMode::SplitBars(n_bars) => match split_by_num_bars(&seq, n_bars) {
                Ok(windows) => windows,
                Err(e) => {
                    tracing::debug!(msd_id = %song.msd_id, error = %e, "skipping file that cannot be split");
                    tally.record_failure(FailureKind::Other);
                    continue;
                }
            },
        };

        for window in windows {
            let result = encode_one(encoder, window).await;
            tally.record(&result);
            match result {
                Ok(z) => samples.push(EncodedSample {
                    msd_id: song.msd_id.clone(),
                    genre: genre.to_string(),
                    z,
                }),
                Err(e) => tracing::debug!(msd_id = %song.msd_id, error = %e, "encode skipped"),
            }
        }
    }

    pb.finish_and_clear();
    tracing::info!(
        genre,
        files = tally.files,
        successful = tally.successful,
        no_extracted = tally.no_extracted,
        multiple_extracted = tally.multiple_extracted,
        other = tally.other,
        "{}",
        tally.summary()
    );

    (samples, tally)
}

/// The on-disk shape: three arrays aligned by position.
#[derive(Serialize, Deserialize)]
struct EncodingFile {
    genres: Vec<String>,
    encodings: Vec<LatentVector>,
    ids: Vec<MsdId>,
}

/// A collection of encodings, saved as aligned `genres`/`encodings`/`ids`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodingSet {
    pub samples: Vec<EncodedSample>,
}

impl EncodingSet {
    pub fn new(samples: Vec<EncodedSample>) -> Self {
        Self { samples }
    }

    pub fn extend(&mut self, samples: impl IntoIterator<Item = EncodedSample>) {
        self.samples.extend(samples);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn genres(&self) -> Vec<&str> {
        self.samples.iter().map(|s| s.genre.as_str()).collect()
    }

    pub fn encodings(&self) -> Vec<&LatentVector> {
        self.samples.iter().map(|s| &s.z).collect()
    }

    pub fn ids(&self) -> Vec<&MsdId> {
        self.samples.iter().map(|s| &s.msd_id).collect()
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let file = EncodingFile {
            genres: self.samples.iter().map(|s| s.genre.clone()).collect(),
            encodings: self.samples.iter().map(|s| s.z.clone()).collect(),
            ids: self.samples.iter().map(|s| s.msd_id.clone()).collect(),
        };
        let json = serde_json::to_string(&file)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::info!(path = %path.display(), count = self.samples.len(), "saved encodings");
        Ok(())
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file: EncodingFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        anyhow::ensure!(
            file.genres.len() == file.encodings.len() && file.ids.len() == file.encodings.len(),
            "{} is misaligned: {} genres, {} encodings, {} ids",
            path.display(),
            file.genres.len(),
            file.encodings.len(),
            file.ids.len()
        );

        let samples = file
            .genres
            .into_iter()
            .zip(file.encodings)
            .zip(file.ids)
            .map(|((genre, z), msd_id)| EncodedSample { msd_id, genre, z })
            .collect();
        Ok(Self { samples })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sample(id: &str, genre: &str, z: &[f32]) -> EncodedSample {
        EncodedSample {
            msd_id: id.parse().unwrap(),
            genre: genre.to_string(),
            z: LatentVector(z.to_vec()),
        }
    }

    #[test]
    fn tally_buckets() {
        let mut tally = EncodeTally::default();
        tally.record(&Ok::<_, EncodeError>(()));
        tally.record::<()>(&Err(EncodeError::NoExtractedExamples));
        tally.record::<()>(&Err(EncodeError::MultipleExtractedExamples));
        tally.record::<()>(&Err(EncodeError::Other("x".into())));
        tally.record::<()>(&Err(EncodeError::Other("y".into())));

        assert_eq!(tally.successful, 1);
        assert_eq!(tally.no_extracted, 1);
        assert_eq!(tally.multiple_extracted, 1);
        assert_eq!(tally.other, 2);
        assert_eq!(tally.skipped(), 4);
    }

    #[test]
    fn summary_mentions_every_bucket() {
        let tally = EncodeTally {
            files: 10,
            successful: 6,
            no_extracted: 2,
            multiple_extracted: 1,
            other: 1,
        };
        assert_eq!(
            tally.summary(),
            "Extracted 6 encodings from a total of 10 files. Skipped 4 \
             (no extracted examples: 2, multiple extracted examples: 1, other: 1)"
        );
    }

    #[test]
    fn views_stay_aligned() {
        let set = EncodingSet::new(vec![
            sample("TRAAAAA", "rock", &[1.0]),
            sample("TRBBBBB", "jazz", &[2.0]),
        ]);
        assert_eq!(set.genres(), vec!["rock", "jazz"]);
        assert_eq!(set.ids()[1].as_str(), "TRBBBBB");
        assert_eq!(set.encodings()[1], &LatentVector(vec![2.0]));
    }

    #[test]
    fn save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("enc").join("rock.json");
        let set = EncodingSet::new(vec![
            sample("TRAAAAA", "rock", &[0.25, -1.5]),
            sample("TRAAAAA", "rock", &[0.0, 3.0]),
        ]);
        set.save_json(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["genres"], serde_json::json!(["rock", "rock"]));
        assert_eq!(raw["ids"], serde_json::json!(["TRAAAAA", "TRAAAAA"]));
        assert_eq!(raw["encodings"][0], serde_json::json!([0.25, -1.5]));

        assert_eq!(EncodingSet::load_json(&path).unwrap(), set);
    }

    #[test]
    fn misaligned_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"genres": ["a"], "encodings": [], "ids": []}"#).unwrap();
        assert!(EncodingSet::load_json(&path).is_err());
    }
}
