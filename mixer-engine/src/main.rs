//! mixer-engine - command-line front end for the mashup engine
//!
//! Reads profiles and audio from the SQLite store under the root folder and prints
//! results as JSON on stdout. Logs go to stderr.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mixer_common::config::{ensure_root_folder, resolve_root_folder, ROOT_ENV_VAR};
use mixer_common::db::{self, AudioRole};
use mixer_common::{FadeCurve, StemName, TrackProfile};
use mixer_engine::{
    Curator, Engineer, JobReport, JobRunner, MashupJob, MatchMode, MatchRequest, MixerConfig, ProfileStore,
    SqliteProfileStore, StrategyKind, TokenSimilarityIndex,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "mixer-engine")]
#[command(about = "Find compatible track pairings and compose mashups")]
#[command(version)]
struct Args {
    /// Root folder holding the profile database and mashup output
    #[arg(short, long, env = ROOT_ENV_VAR)]
    root: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Crossfade and tail-fade curve, overriding engineer.fade_curve
    #[arg(long)]
    fade_curve: Option<FadeCurve>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rank compatible partners for one track
    Match {
        target: String,
        /// harmonic, semantic or hybrid
        #[arg(short, long)]
        mode: Option<MatchMode>,
        #[arg(short = 'n', long)]
        max_results: Option<usize>,
        /// Query text for semantic and hybrid ranking
        #[arg(short, long)]
        query: Option<String>,
        /// Restrict candidates to these ids
        #[arg(long, value_delimiter = ',')]
        pool: Vec<String>,
        #[arg(long)]
        genre: Option<String>,
    },
    /// Best pairs across the whole library
    Pairs {
        #[arg(short = 'n', long, default_value = "10")]
        max_pairs: usize,
        #[arg(long, default_value = "0.5")]
        min_score: f64,
        #[arg(long)]
        genre: Option<String>,
    },
    /// Suggest a strategy for a pair
    Recommend { track_a: String, track_b: String },
    /// Compose one mashup
    Compose {
        track_a: String,
        track_b: String,
        /// Strategy name; the recommendation is used when omitted
        #[arg(short, long)]
        strategy: Option<StrategyKind>,
        /// Theme for theme_filtered
        #[arg(short, long)]
        theme: Option<String>,
    },
    /// Run a JSON array of jobs concurrently
    Batch { jobs_file: PathBuf },
    /// Load profiles and audio locations from a JSON manifest into the store
    Import { manifest: PathBuf },
}

/// One manifest entry; relative audio paths resolve against the manifest's folder
#[derive(Debug, Deserialize)]
struct ImportEntry {
    profile: TrackProfile,
    #[serde(default)]
    mix: Option<PathBuf>,
    #[serde(default)]
    stems: BTreeMap<StemName, PathBuf>,
}

#[derive(Debug, Serialize)]
struct ImportSummary {
    imported: Vec<String>,
    audio_files: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = MixerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(curve) = args.fade_curve {
        config.engineer.fade_curve = curve;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting mixer-engine v{}", env!("CARGO_PKG_VERSION"));

    let root = resolve_root_folder(args.root.as_deref(), ROOT_ENV_VAR, args.config.as_deref())?;
    ensure_root_folder(&root)?;
    let db_path = config.database_path(&root);
    info!("Database path: {}", db_path.display());

    let store = Arc::new(
        SqliteProfileStore::open(&db_path, config.audio.sample_rate)
            .await
            .context("Failed to open profile database")?,
    );
    let config = Arc::new(config);

    match args.command {
        Command::Import { manifest } => {
            let summary = import_manifest(&store, &manifest).await?;
            print_json(&summary)
        }
        Command::Match {
            target,
            mode,
            max_results,
            query,
            pool,
            genre,
        } => {
            let curator = curator(store, config).await?;
            let mut request = MatchRequest::new(target);
            request.mode = mode;
            request.max_results = max_results;
            request.semantic_query = query;
            request.genre_filter = genre;
            if !pool.is_empty() {
                request = request.pool(pool);
            }
            print_json(&curator.find_matches(&request).await?)
        }
        Command::Pairs {
            max_pairs,
            min_score,
            genre,
        } => {
            let curator = curator(store, config).await?;
            print_json(&curator.find_best_pairs(max_pairs, min_score, genre.as_deref()).await?)
        }
        Command::Recommend { track_a, track_b } => {
            let curator = curator(store, config).await?;
            print_json(&curator.recommendation(&track_a, &track_b).await?)
        }
        Command::Compose {
            track_a,
            track_b,
            strategy,
            theme,
        } => {
            let (kind, theme) = match strategy {
                Some(kind) => (kind, theme),
                None => {
                    let rec = curator(store.clone(), config.clone())
                        .await?
                        .recommendation(&track_a, &track_b)
                        .await?;
                    info!(strategy = %rec.primary, reasons = ?rec.reasons, "Using recommended strategy");
                    (rec.primary, theme.or(rec.suggested_theme))
                }
            };
            let job = MashupJob::for_pair(kind, &track_a, &track_b, theme.as_deref())?;
            let runner = runner(store, config, &root);
            let report = JobReport::from(runner.run(&job).await);
            let failed = report.error.is_some();
            print_json(&report)?;
            if failed {
                bail!("composition failed");
            }
            Ok(())
        }
        Command::Batch { jobs_file } => {
            let text = std::fs::read_to_string(&jobs_file)
                .with_context(|| format!("Failed to read {}", jobs_file.display()))?;
            let jobs: Vec<MashupJob> =
                serde_json::from_str(&text).with_context(|| format!("Invalid job list in {}", jobs_file.display()))?;
            let runner = runner(store, config, &root);
            let reports: Vec<JobReport> = runner.run_all(&jobs).await.into_iter().map(JobReport::from).collect();
            print_json(&reports)
        }
    }
}

async fn curator(store: Arc<SqliteProfileStore>, config: Arc<MixerConfig>) -> Result<Curator> {
    let profiles = store.list_profiles().await?;
    let index = Arc::new(TokenSimilarityIndex::from_profiles(&profiles));
    info!(profiles = profiles.len(), "Similarity index built");
    Ok(Curator::new(store, index, config))
}

fn runner(store: Arc<SqliteProfileStore>, config: Arc<MixerConfig>, root: &Path) -> JobRunner {
    let output_dir = config.output_dir(root);
    let engineer = Arc::new(Engineer::new(store, config.clone(), output_dir));
    JobRunner::new(engineer, &config)
}

async fn import_manifest(store: &SqliteProfileStore, manifest: &Path) -> Result<ImportSummary> {
    let text =
        std::fs::read_to_string(manifest).with_context(|| format!("Failed to read {}", manifest.display()))?;
    let entries: Vec<ImportEntry> =
        serde_json::from_str(&text).with_context(|| format!("Invalid manifest {}", manifest.display()))?;
    let base = manifest.parent().unwrap_or_else(|| Path::new("."));

    let mut summary = ImportSummary {
        imported: Vec::with_capacity(entries.len()),
        audio_files: 0,
    };

    for entry in entries {
        entry
            .profile
            .validate()
            .with_context(|| format!("Invalid profile {}", entry.profile.id))?;
        let id = entry.profile.id.clone();
        db::save_profile(store.pool(), &entry.profile).await?;

        let audio = entry
            .mix
            .map(|p| (AudioRole::Mix, p))
            .into_iter()
            .chain(entry.stems.into_iter().map(|(stem, p)| (AudioRole::Stem(stem), p)));
        for (role, path) in audio {
            let path = if path.is_relative() { base.join(path) } else { path };
            db::save_audio_path(store.pool(), &id, role, &path).await?;
            summary.audio_files += 1;
        }

        info!(track_id = %id, "Imported profile");
        summary.imported.push(id);
    }

    Ok(summary)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
