//! MsdId: a Million Song Dataset track identifier and its directory shard.
//!
//! The LMD and MSD trees shard files three levels deep using the 3rd, 4th
//! and 5th characters of the ID: `TRABCD12345678` lives under
//! `A/B/C/TRABCD12345678`. The layout is fixed by the published datasets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::LakhError;

/// Shortest ID that still has all three shard characters.
pub const MIN_MSD_ID_LEN: usize = 5;

/// A validated MSD track ID (`TR` + 16 alphanumerics in practice).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MsdId(String);

impl MsdId {
    /// Validate and wrap an ID string.
    pub fn parse(s: &str) -> Result<Self, LakhError> {
        let s = s.trim();
        if s.len() < MIN_MSD_ID_LEN || !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(LakhError::InvalidMsdId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// The three shard characters (positions 2, 3, 4).
    pub fn shard(&self) -> [&str; 3] {
        [&self.0[2..3], &self.0[3..4], &self.0[4..5]]
    }

    /// Relative path prefix: `A/B/C/<id>`.
    pub fn shard_dirs(&self) -> PathBuf {
        let [a, b, c] = self.shard();
        [a, b, c, self.0.as_str()].iter().collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for MsdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MsdId {
    type Err = LakhError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MsdId {
    type Error = LakhError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<MsdId> for String {
    fn from(id: MsdId) -> Self {
        id.0
    }
}

impl AsRef<str> for MsdId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_shard_dirs_uses_chars_2_to_4() {
        let id = MsdId::parse("TRABCD12345678").unwrap();
        assert_eq!(id.shard_dirs(), Path::new("A/B/C/TRABCD12345678"));
    }

    #[test]
    fn test_real_msd_id() {
        let id: MsdId = "TRAAAGR128F425B14B".parse().unwrap();
        assert_eq!(id.shard(), ["A", "A", "A"]);
        assert_eq!(id.shard_dirs(), Path::new("A/A/A/TRAAAGR128F425B14B"));
    }

    #[test]
    fn test_shortest_valid_id() {
        let id = MsdId::parse("TRXYZ").unwrap();
        assert_eq!(id.shard_dirs(), Path::new("X/Y/Z/TRXYZ"));
    }

    #[test]
    fn test_shard_is_deterministic() {
        let a = MsdId::parse("TRMMMKD128F425225D").unwrap();
        let b = MsdId::parse("TRMMMKD128F425225D").unwrap();
        assert_eq!(a.shard_dirs(), b.shard_dirs());
    }

    #[test]
    fn test_too_short_rejected() {
        assert!(matches!(MsdId::parse("TRAB"), Err(LakhError::InvalidMsdId(_))));
    }

    #[test]
    fn test_path_separators_rejected() {
        assert!(matches!(
            MsdId::parse("TR../../etc"),
            Err(LakhError::InvalidMsdId(_))
        ));
    }

    #[test]
    fn test_serde_roundtrip() {
        let id = MsdId::parse("TRAAAGR128F425B14B").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"TRAAAGR128F425B14B\"");
        let restored: MsdId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
    }

    #[test]
    fn test_serde_rejects_invalid() {
        let result: Result<MsdId, _> = serde_json::from_str("\"AB\"");
        assert!(result.is_err());
    }
}
