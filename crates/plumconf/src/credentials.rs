//! Last.fm API key resolution.

use crate::{ConfigError, LastFmConfig};
use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize)]
struct CredentialsFile {
    #[serde(rename = "API key")]
    api_key: String,
}

/// Resolve the Last.fm API key: an explicit `api_key` wins, otherwise the
/// credentials file is read.
pub fn load_api_key(config: &LastFmConfig) -> Result<String, ConfigError> {
    if let Some(key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        return Ok(key.trim().to_string());
    }
    read_credentials_file(&config.credentials_file)
}

/// Read `{"API key": "..."}` from a JSON credentials file.
pub fn read_credentials_file(path: &Path) -> Result<String, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::MissingApiKey {
            path: path.to_path_buf(),
        });
    }

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let creds: CredentialsFile =
        serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let key = creds.api_key.trim();
    if key.is_empty() {
        return Err(ConfigError::MissingApiKey {
            path: path.to_path_buf(),
        });
    }
    Ok(key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_key_skips_file() {
        let config = LastFmConfig {
            api_key: Some("abc123".to_string()),
            credentials_file: "/does/not/exist.json".into(),
            ..Default::default()
        };
        assert_eq!(load_api_key(&config).unwrap(), "abc123");
    }

    #[test]
    fn reads_key_from_credentials_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lastFM-api.json");
        std::fs::write(&path, r#"{"API key": " deadbeef ", "Shared secret": "x"}"#).unwrap();

        let config = LastFmConfig {
            credentials_file: path,
            ..Default::default()
        };
        assert_eq!(load_api_key(&config).unwrap(), "deadbeef");
    }

    #[test]
    fn missing_file_is_missing_key() {
        let config = LastFmConfig {
            credentials_file: "/does/not/exist.json".into(),
            ..Default::default()
        };
        assert!(matches!(
            load_api_key(&config),
            Err(ConfigError::MissingApiKey { .. })
        ));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("creds.json");
        std::fs::write(&path, r#"{"key": "nope"}"#).unwrap();

        assert!(matches!(
            read_credentials_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
