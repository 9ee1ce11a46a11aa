//! plum - prepare the Lakh MIDI dataset and encode it with MusicVAE
//!
//! Subcommands:
//! - `plum locate <id>` - sharded path of a song's h5 record or MIDI file
//! - `plum metadata` - build `lmd_metadata.csv` from the MSD records
//! - `plum genres` - build the Last.fm `{msdID: genre}` table
//! - `plum prepare <id>...` - clean and split MIDI files
//! - `plum encode` - encode a genre into a model's latent space

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lakh::{MatchScores, MsdId, SqliteReader};
use plum::dataset;
use plum::encoder::{self, models};
use plum::{encode_songs, EncodeMode, EncodingSet, LastFmClient, MusicVaeClient};
use plumconf::PlumConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "plum")]
#[command(about = "Lakh MIDI dataset preparation and MusicVAE latent encoding")]
#[command(version)]
struct Cli {
    /// Config file, loaded after the system and user configs
    #[arg(short, long, global = true, env = "PLUM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the sharded path for an MSD ID
    Locate {
        /// MSD ID (e.g., TRAAAGR128F425B14B)
        id: String,

        /// Resolve the best-matching MIDI file instead of the h5 record
        #[arg(long)]
        md5: bool,
    },

    /// Count songs with an MSD match
    Count,

    /// Build the metadata CSV from the MSD records
    Metadata {
        /// Directory with track_metadata.db and artist_term.db
        #[arg(long)]
        sqlite_dir: Option<PathBuf>,

        /// Read the per-song h5 files instead of the SQLite dumps
        #[cfg(feature = "hdf5")]
        #[arg(long, conflicts_with = "sqlite_dir")]
        h5: bool,
    },

    /// Build the Last.fm genre table from the metadata CSV
    Genres,

    /// Print the Last.fm top tags of a song
    Tags {
        artist: String,
        title: String,

        /// Print nothing instead of failing when Last.fm does not know the track
        #[arg(long)]
        ignore_not_found: bool,
    },

    /// Strip tempo/meter/key events and split into per-track files
    Prepare {
        /// MSD IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Encode every song of a genre into a model's latent space
    Encode {
        /// Genre from the metadata table's mb_genre column
        #[arg(short, long)]
        genre: String,

        /// Model name (defaults to model.default_model)
        #[arg(short, long)]
        model: Option<String>,

        /// Split each song into windows of this many bars
        #[arg(short, long)]
        bars: Option<u32>,

        /// Output JSON file (default: <output_dir>/encodings_<genre>_<model>.json)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Print statistics for a MIDI file as JSON
    Stats { midi: PathBuf },

    /// Download a MusicVAE checkpoint into the models directory
    DownloadCheckpoint { model: String },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = PlumConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    plum::telemetry::init(&config.telemetry)?;
    tracing::debug!(files = ?sources.files, env = ?sources.env_overrides, "configuration loaded");

    match cli.command {
        Commands::Locate { id, md5 } => {
            let id = MsdId::parse(&id)?;
            let scores = if md5 { Some(load_scores(&config)?) } else { None };
            println!("{}", dataset::locate(&config, scores.as_ref(), &id)?.display());
        }
        Commands::Count => {
            println!("{}", dataset::count_matched(&config)?);
        }
        Commands::Metadata {
            sqlite_dir,
            #[cfg(feature = "hdf5")]
            h5,
        } => {
            #[cfg(feature = "hdf5")]
            {
                if h5 {
                    let reader = lakh::H5Reader::new(lakh::LakhLayout::new(&config.paths.data_dir));
                    let report = dataset::make_metadata_csv(&config, &reader)?;
                    print_report(&report);
                    return Ok(());
                }
            }

            let dir = sqlite_dir.unwrap_or_else(|| config.paths.msd_sqlite_dir());
            let reader = SqliteReader::open(&dir)
                .with_context(|| format!("Failed to open MSD databases in {}", dir.display()))?;
            let report = dataset::make_metadata_csv(&config, &reader)?;
            print_report(&report);
        }
        Commands::Genres => {
            let client = lastfm_client(&config)?;
            let report = dataset::make_genre_json(&config, &client).await?;
            print_report(&report);
        }
        Commands::Tags {
            artist,
            title,
            ignore_not_found,
        } => {
            let client = lastfm_client(&config)?;
            for tag in client.top_genre_tags(&artist, &title, ignore_not_found).await? {
                println!("{tag}");
            }
        }
        Commands::Prepare { ids } => {
            let ids = ids
                .iter()
                .map(|s| MsdId::parse(s))
                .collect::<Result<Vec<_>, _>>()?;
            let scores = load_scores(&config)?;
            for dir in dataset::prepare_midi(&config, &scores, &ids)? {
                println!("{}", dir.display());
            }
        }
        Commands::Encode {
            genre,
            model,
            bars,
            out,
        } => {
            let model = model.unwrap_or_else(|| config.model.default_model.clone());
            run_encode(&config, &genre, &model, bars, out).await?;
        }
        Commands::Stats { midi } => {
            let bytes = std::fs::read(&midi)
                .with_context(|| format!("Failed to read {}", midi.display()))?;
            let stats = midi_prep::compute_statistics(&bytes)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::DownloadCheckpoint { model } => {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(config.model.timeout_secs.max(600)))
                .build()?;
            let path = models::download_checkpoint(&client, &model, &config.paths.models_dir).await?;
            println!("{}", path.display());
        }
        Commands::Config => {
            for file in &sources.files {
                println!("# loaded: {}", file.display());
            }
            for var in &sources.env_overrides {
                println!("# env: {var}");
            }
            print!("{}", config.to_toml());
        }
    }

    Ok(())
}

fn load_scores(config: &PlumConfig) -> Result<MatchScores> {
    let path = config.paths.match_scores_file();
    MatchScores::load(&path)
        .with_context(|| format!("Failed to load match scores from {}", path.display()))
}

fn lastfm_client(config: &PlumConfig) -> Result<LastFmClient> {
    let api_key = plumconf::load_api_key(&config.lastfm)?;
    Ok(LastFmClient::from_config(&config.lastfm, api_key)?)
}

fn print_report(report: &dataset::BuildReport) {
    println!(
        "{} ({} written, {} skipped)",
        report.path.display(),
        report.written,
        report.skipped
    );
}

async fn run_encode(
    config: &PlumConfig,
    genre: &str,
    model: &str,
    bars: Option<u32>,
    out: Option<PathBuf>,
) -> Result<()> {
    if !models::is_supported(model) {
        bail!(models::ModelError::UnknownModel(model.to_string()));
    }
    let mode = match bars {
        Some(0) => bail!("--bars must be at least 1"),
        Some(n) => EncodeMode::SplitBars(n),
        None => EncodeMode::Whole,
    };

    let checkpoint = models::checkpoint_path(&config.paths.models_dir, model, &config.model)?;
    let client = MusicVaeClient::from_config(&config.model, model)?
        .with_checkpoint(checkpoint.to_string_lossy());
    client
        .health()
        .await
        .context("MusicVAE encoder is not reachable")?;

    let songs = dataset::songs_from_genre(config, genre)?;
    tracing::info!(genre, model, songs = songs.len(), ?mode, "encoding genre");

    let encoder: &dyn encoder::LatentEncoder = &client;
    let (samples, tally) = encode_songs(encoder, genre, &songs, mode).await;
    println!("{}", tally.summary());

    let out = out.unwrap_or_else(|| {
        config
            .paths
            .output_dir
            .join(format!("encodings_{genre}_{model}.json"))
    });
    EncodingSet::new(samples).save_json(&out)?;
    println!("{}", out.display());
    Ok(())
}
