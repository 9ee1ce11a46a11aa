//! Config file discovery, loading, and environment variable overlay.

use crate::{
    ConfigError, LastFmConfig, ModelConfig, PathsConfig, PlumConfig, TelemetryConfig,
};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/plum/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("plum/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("plum.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load config from a TOML file.
pub fn load_from_file(path: &Path) -> Result<PlumConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path)
}

/// Parse config from a TOML string. Missing sections and keys take defaults;
/// path values get `~` and `$VAR` expansion.
pub(crate) fn parse_toml(contents: &str, path: &Path) -> Result<PlumConfig, ConfigError> {
    let mut config: PlumConfig =
        toml::from_str(contents).map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    expand_config_paths(&mut config);
    Ok(config)
}

fn expand_config_paths(config: &mut PlumConfig) {
    let expand = |p: &PathBuf| expand_path(&p.to_string_lossy());

    let paths = &mut config.paths;
    paths.data_dir = expand(&paths.data_dir);
    paths.models_dir = expand(&paths.models_dir);
    paths.output_dir = expand(&paths.output_dir);
    for slot in [
        &mut paths.match_scores_file,
        &mut paths.metadata_csv,
        &mut paths.genre_json,
        &mut paths.cleaned_dir,
        &mut paths.msd_sqlite_dir,
    ] {
        if let Some(p) = slot.take() {
            *slot = Some(expand(&p));
        }
    }

    config.lastfm.credentials_file = expand(&config.lastfm.credentials_file);
    if let Some(p) = config.telemetry.log_file.take() {
        config.telemetry.log_file = Some(expand(&p));
    }
}

/// Pick the overlay value when it differs from the compiled default.
fn pick<T: PartialEq>(base: T, overlay: T, default: T) -> T {
    if overlay != default {
        overlay
    } else {
        base
    }
}

/// Merge two configs field by field, with `overlay` taking precedence.
///
/// A field left at its default in `overlay` keeps the `base` value.
pub fn merge_configs(base: PlumConfig, overlay: PlumConfig) -> PlumConfig {
    let dp = PathsConfig::default();
    let dl = LastFmConfig::default();
    let dm = ModelConfig::default();
    let dt = TelemetryConfig::default();

    PlumConfig {
        paths: PathsConfig {
            data_dir: pick(base.paths.data_dir, overlay.paths.data_dir, dp.data_dir),
            match_scores_file: overlay.paths.match_scores_file.or(base.paths.match_scores_file),
            metadata_csv: overlay.paths.metadata_csv.or(base.paths.metadata_csv),
            genre_json: overlay.paths.genre_json.or(base.paths.genre_json),
            cleaned_dir: overlay.paths.cleaned_dir.or(base.paths.cleaned_dir),
            msd_sqlite_dir: overlay.paths.msd_sqlite_dir.or(base.paths.msd_sqlite_dir),
            models_dir: pick(base.paths.models_dir, overlay.paths.models_dir, dp.models_dir),
            output_dir: pick(base.paths.output_dir, overlay.paths.output_dir, dp.output_dir),
        },
        lastfm: LastFmConfig {
            api_key: overlay.lastfm.api_key.or(base.lastfm.api_key),
            credentials_file: pick(
                base.lastfm.credentials_file,
                overlay.lastfm.credentials_file,
                dl.credentials_file,
            ),
            base_url: pick(base.lastfm.base_url, overlay.lastfm.base_url, dl.base_url),
            timeout_secs: pick(base.lastfm.timeout_secs, overlay.lastfm.timeout_secs, dl.timeout_secs),
            concurrency: pick(base.lastfm.concurrency, overlay.lastfm.concurrency, dl.concurrency),
            max_retries: pick(base.lastfm.max_retries, overlay.lastfm.max_retries, dl.max_retries),
        },
        model: ModelConfig {
            encoder_url: pick(base.model.encoder_url, overlay.model.encoder_url, dm.encoder_url),
            default_model: pick(base.model.default_model, overlay.model.default_model, dm.default_model),
            batch_size: pick(base.model.batch_size, overlay.model.batch_size, dm.batch_size),
            timeout_secs: pick(base.model.timeout_secs, overlay.model.timeout_secs, dm.timeout_secs),
            multitrack_checkpoint: pick(
                base.model.multitrack_checkpoint,
                overlay.model.multitrack_checkpoint,
                dm.multitrack_checkpoint,
            ),
            multitrack_chords_checkpoint: pick(
                base.model.multitrack_chords_checkpoint,
                overlay.model.multitrack_chords_checkpoint,
                dm.multitrack_chords_checkpoint,
            ),
        },
        telemetry: TelemetryConfig {
            log_level: pick(base.telemetry.log_level, overlay.telemetry.log_level, dt.log_level),
            log_file: overlay.telemetry.log_file.or(base.telemetry.log_file),
        },
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut PlumConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, env::vars());
}

/// Apply overrides from an arbitrary set of `(name, value)` pairs.
pub fn apply_overrides_from(
    config: &mut PlumConfig,
    sources: &mut ConfigSources,
    vars: impl IntoIterator<Item = (String, String)>,
) {
    // RUST_LOG is applied last so it wins over PLUM_LOG_LEVEL
    let mut rust_log = None;

    for (key, value) in vars {
        let applied = match key.as_str() {
            "PLUM_DATA_DIR" => {
                config.paths.data_dir = expand_path(&value);
                true
            }
            "PLUM_MATCH_SCORES" => {
                config.paths.match_scores_file = Some(expand_path(&value));
                true
            }
            "PLUM_METADATA_CSV" => {
                config.paths.metadata_csv = Some(expand_path(&value));
                true
            }
            "PLUM_GENRE_JSON" => {
                config.paths.genre_json = Some(expand_path(&value));
                true
            }
            "PLUM_CLEANED_DIR" => {
                config.paths.cleaned_dir = Some(expand_path(&value));
                true
            }
            "PLUM_MODELS_DIR" => {
                config.paths.models_dir = expand_path(&value);
                true
            }
            "PLUM_OUTPUT_DIR" => {
                config.paths.output_dir = expand_path(&value);
                true
            }
            "PLUM_LASTFM_API_KEY" => {
                config.lastfm.api_key = Some(value);
                true
            }
            "PLUM_LASTFM_CREDENTIALS" => {
                config.lastfm.credentials_file = expand_path(&value);
                true
            }
            "PLUM_LASTFM_URL" => {
                config.lastfm.base_url = value;
                true
            }
            "PLUM_ENCODER_URL" => {
                config.model.encoder_url = value;
                true
            }
            "PLUM_LOG_LEVEL" => {
                config.telemetry.log_level = value;
                true
            }
            "RUST_LOG" => {
                rust_log = Some(value);
                false
            }
            _ => false,
        };

        if applied {
            sources.env_overrides.push(key);
        }
    }

    if let Some(v) = rust_log {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}
