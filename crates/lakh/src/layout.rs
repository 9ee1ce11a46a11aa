//! Sharded dataset paths under a data root.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::{LakhError, MsdId, Result};

/// Directory of matched MIDI files, one subdirectory per MSD ID.
pub const LMD_MATCHED: &str = "lmd_matched";
/// Directory of per-song MSD HDF5 records for the matched subset.
pub const LMD_MATCHED_H5: &str = "lmd_matched_h5";

/// Resolves MSD IDs to files in the published LMD tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LakhLayout {
    data_dir: PathBuf,
}

impl LakhLayout {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn matched_dir(&self) -> PathBuf {
        self.data_dir.join(LMD_MATCHED)
    }

    pub fn matched_h5_dir(&self) -> PathBuf {
        self.data_dir.join(LMD_MATCHED_H5)
    }

    /// `<data>/lmd_matched_h5/A/B/C/<id>.h5`
    pub fn h5_path(&self, id: &MsdId) -> PathBuf {
        let mut path = self.matched_h5_dir().join(id.shard_dirs());
        path.set_extension("h5");
        path
    }

    /// `<data>/lmd_matched/A/B/C/<id>`
    pub fn midi_dir(&self, id: &MsdId) -> PathBuf {
        self.matched_dir().join(id.shard_dirs())
    }

    /// `<data>/lmd_matched/A/B/C/<id>/<md5>.mid`
    pub fn midi_path(&self, id: &MsdId, md5: &str) -> PathBuf {
        self.midi_dir(id).join(format!("{md5}.mid"))
    }
}

/// Walk an `lmd_matched_h5` tree and collect the IDs of every `TR*.h5` file.
///
/// Returned sorted. Files whose stem is not a valid MSD ID are skipped.
pub fn scan_h5_ids(dir: &Path) -> Result<Vec<MsdId>> {
    if !dir.exists() {
        return Err(LakhError::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "h5 directory not found"),
        ));
    }

    let mut ids = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
            LakhError::io(path, std::io::Error::other(e.to_string()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("h5") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !stem.starts_with("TR") {
            continue;
        }

        match MsdId::parse(stem) {
            Ok(id) => ids.push(id),
            Err(_) => tracing::debug!(path = %path.display(), "skipping h5 file with bad ID"),
        }
    }

    ids.sort();
    Ok(ids)
}

/// Number of songs in the matched subset (one h5 record per song).
pub fn count_matched_songs(dir: &Path) -> Result<usize> {
    Ok(scan_h5_ids(dir)?.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id(s: &str) -> MsdId {
        MsdId::parse(s).unwrap()
    }

    #[test]
    fn test_h5_path() {
        let layout = LakhLayout::new("/data");
        assert_eq!(
            layout.h5_path(&id("TRABCD12345678")),
            PathBuf::from("/data/lmd_matched_h5/A/B/C/TRABCD12345678.h5")
        );
    }

    #[test]
    fn test_midi_path() {
        let layout = LakhLayout::new("/data");
        assert_eq!(
            layout.midi_path(&id("TRABCD12345678"), "0123abcd"),
            PathBuf::from("/data/lmd_matched/A/B/C/TRABCD12345678/0123abcd.mid")
        );
    }

    #[test]
    fn test_scan_h5_ids_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        let layout = LakhLayout::new(dir.path());

        for raw in ["TRZZZAA1234", "TRAAABB5678", "TRMMMCC0000"] {
            let path = layout.h5_path(&id(raw));
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, b"").unwrap();
        }
        // Noise that should be ignored
        let noise = layout.matched_h5_dir().join("A/A/A");
        std::fs::write(noise.join("notes.txt"), b"x").unwrap();
        std::fs::write(noise.join("XXAAA1.h5"), b"x").unwrap();

        let ids = scan_h5_ids(&layout.matched_h5_dir()).unwrap();
        let names: Vec<&str> = ids.iter().map(MsdId::as_str).collect();
        assert_eq!(names, vec!["TRAAABB5678", "TRMMMCC0000", "TRZZZAA1234"]);
        assert_eq!(count_matched_songs(&layout.matched_h5_dir()).unwrap(), 3);
    }

    #[test]
    fn test_scan_missing_dir_errors() {
        let dir = TempDir::new().unwrap();
        let result = scan_h5_ids(&dir.path().join("nope"));
        assert!(matches!(result, Err(LakhError::Io { .. })));
    }
}
