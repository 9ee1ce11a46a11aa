//! `{msdID: genre}` lookup built from Last.fm top tags.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::{LakhError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenreTable(BTreeMap<String, String>);

impl GenreTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| LakhError::io(path, e))?;
        serde_json::from_str(&contents).map_err(|e| LakhError::json(path, e))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| LakhError::io(parent, e))?;
        }
        let json = serde_json::to_string(&self.0).map_err(|e| LakhError::json(path, e))?;
        std::fs::write(path, json).map_err(|e| LakhError::io(path, e))
    }

    /// Returns the previous genre for the ID, if any.
    pub fn insert(&mut self, msd_id: impl Into<String>, genre: impl Into<String>) -> Option<String> {
        self.0.insert(msd_id.into(), genre.into())
    }

    pub fn get(&self, msd_id: &str) -> Option<&str> {
        self.0.get(msd_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
