//! The LMD match-score table: `{msd_id: {midi_md5: score}}`.

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::{LakhError, MsdId, Result};

/// One song's `{md5: score}` object, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
struct Candidates(Vec<(String, f64)>);

impl<'de> Deserialize<'de> for Candidates {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct CandidatesVisitor;

        impl<'de> Visitor<'de> for CandidatesVisitor {
            type Value = Candidates;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of md5 to match score")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Candidates, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((md5, score)) = map.next_entry::<String, f64>()? {
                    pairs.push((md5, score));
                }
                Ok(Candidates(pairs))
            }
        }

        deserializer.deserialize_map(CandidatesVisitor)
    }
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct RawScores(HashMap<String, Candidates>);

/// Read-only match scores, loaded once per process.
///
/// Candidates keep the order they appear in the file.
#[derive(Debug, Clone, Default)]
pub struct MatchScores {
    scores: HashMap<String, Candidates>,
}

impl MatchScores {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| LakhError::io(path, e))?;
        let raw: RawScores =
            serde_json::from_str(&contents).map_err(|e| LakhError::json(path, e))?;
        tracing::debug!(path = %path.display(), songs = raw.0.len(), "loaded match scores");
        Ok(Self { scores: raw.0 })
    }

    pub fn from_json_str(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let raw: RawScores = serde_json::from_str(json)?;
        Ok(Self { scores: raw.0 })
    }

    /// MD5 of the highest-scoring MIDI candidate.
    ///
    /// Only a strictly greater score replaces the current best, starting
    /// from zero, so ties keep the candidate listed first and a song whose
    /// candidates all score zero counts as unmatched.
    pub fn best_match(&self, id: &MsdId) -> Result<String> {
        let candidates = self
            .scores
            .get(id.as_str())
            .ok_or_else(|| LakhError::UnknownMsdId(id.to_string()))?;

        let mut best: Option<&str> = None;
        let mut max_score = 0.0;
        for (md5, score) in &candidates.0 {
            let score = *score;
            if score > max_score {
                max_score = score;
                best = Some(md5);
            }
        }

        best.map(str::to_string).ok_or_else(|| LakhError::NotMatched {
            id: id.to_string(),
        })
    }

    /// Every candidate md5 for a song, best score first.
    pub fn all_matches(&self, id: &MsdId) -> Result<Vec<String>> {
        let candidates = self
            .scores
            .get(id.as_str())
            .ok_or_else(|| LakhError::UnknownMsdId(id.to_string()))?;

        let mut ranked: Vec<(&String, f64)> = candidates.0.iter().map(|(m, s)| (m, *s)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(ranked.into_iter().map(|(m, _)| m.clone()).collect())
    }

    /// All song IDs in the table, sorted. Keys that are not valid IDs are skipped.
    pub fn ids(&self) -> Vec<MsdId> {
        let mut ids: Vec<MsdId> = self
            .scores
            .keys()
            .filter_map(|k| MsdId::parse(k).ok())
            .collect();
        ids.sort();
        ids
    }

    pub fn contains(&self, id: &MsdId) -> bool {
        self.scores.contains_key(id.as_str())
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}
