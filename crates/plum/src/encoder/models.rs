//! The MusicVAE checkpoint catalog.

use plumconf::ModelConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Public bucket the single-model checkpoints are published in.
pub const CHECKPOINT_BASE_URL: &str =
    "https://storage.googleapis.com/magentadata/models/music_vae/checkpoints";

/// Models the encoder service can load.
pub const MODEL_NAMES: [&str; 6] = [
    "cat-mel_2bar_big",
    "hierdec-trio_16bar",
    "hierdec-mel_16bar",
    "cat-drums_2bar_small.hikl",
    "hier-multiperf_vel_1bar_med",
    "hier-multiperf_vel_1bar_med_chords",
];

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown model {0:?}; expected one of: {names}", names = MODEL_NAMES.join(", "))]
    UnknownModel(String),

    #[error("model {0} is distributed as a bundle and cannot be downloaded by name")]
    NotDownloadable(String),

    #[error("checkpoint download failed with HTTP {status}")]
    Http { status: u16 },

    #[error("network error: {0}")]
    Network(String),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub fn is_supported(name: &str) -> bool {
    MODEL_NAMES.contains(&name)
}

/// The multitrack performance models take up to eight instruments at once.
pub fn is_multitrack(name: &str) -> bool {
    name.contains("multiperf")
}

fn is_chord_conditioned(name: &str) -> bool {
    name.ends_with("_chords")
}

pub fn checkpoint_url(name: &str) -> String {
    format!("{CHECKPOINT_BASE_URL}/{name}.tar")
}

/// Where a model's checkpoint lives under `models_dir`.
///
/// Single models are `<models_dir>/<name>.tar`. Multitrack models live in
/// `<models_dir>/multitrack/{conditioned,unconditioned}/<checkpoint>`.
pub fn checkpoint_path(models_dir: &Path, name: &str, config: &ModelConfig) -> Result<PathBuf, ModelError> {
    if !is_supported(name) {
        return Err(ModelError::UnknownModel(name.to_string()));
    }

    if !is_multitrack(name) {
        return Ok(models_dir.join(format!("{name}.tar")));
    }

    let multitrack = models_dir.join("multitrack");
    Ok(if is_chord_conditioned(name) {
        multitrack
            .join("conditioned")
            .join(&config.multitrack_chords_checkpoint)
    } else {
        multitrack
            .join("unconditioned")
            .join(&config.multitrack_checkpoint)
    })
}

/// Fetch `<name>.tar` into `dir` unless it is already there.
pub async fn download_checkpoint(
    client: &reqwest::Client,
    name: &str,
    dir: &Path,
) -> Result<PathBuf, ModelError> {
    download_checkpoint_from(client, CHECKPOINT_BASE_URL, name, dir).await
}

pub async fn download_checkpoint_from(
    client: &reqwest::Client,
    base_url: &str,
    name: &str,
    dir: &Path,
) -> Result<PathBuf, ModelError> {
    if !is_supported(name) {
        return Err(ModelError::UnknownModel(name.to_string()));
    }
    if is_multitrack(name) {
        return Err(ModelError::NotDownloadable(name.to_string()));
    }

    let dest = dir.join(format!("{name}.tar"));
    if dest.exists() {
        tracing::info!(path = %dest.display(), "checkpoint already present");
        return Ok(dest);
    }

    tokio::fs::create_dir_all(dir).await.map_err(|e| ModelError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let url = format!("{}/{name}.tar", base_url.trim_end_matches('/'));
    tracing::info!(%url, "downloading checkpoint");

    let mut response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| ModelError::Network(e.to_string()))?;
    if !response.status().is_success() {
        return Err(ModelError::Http {
            status: response.status().as_u16(),
        });
    }

    // Written beside the target and renamed, so an interrupted download never
    // looks finished.
    let partial = dir.join(format!("{name}.tar.part"));
    let io_err = |path: &Path, e: std::io::Error| ModelError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    let mut file = tokio::fs::File::create(&partial)
        .await
        .map_err(|e| io_err(&partial, e))?;

    let mut written = 0u64;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| ModelError::Network(e.to_string()))?
    {
        file.write_all(&chunk).await.map_err(|e| io_err(&partial, e))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| io_err(&partial, e))?;
    drop(file);

    tokio::fs::rename(&partial, &dest)
        .await
        .map_err(|e| io_err(&dest, e))?;

    tracing::info!(path = %dest.display(), bytes = written, "checkpoint downloaded");
    Ok(dest)
}
