// src/main.rs

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use communes::{
    cache::TableCache,
    communes::{build_profiles, export_profiles},
    config::DEFAULT_DATA_DIR,
    metadata::DatasetMetadata,
    verify::{format_count, VerificationSummary},
    Config, DatasetKind, Loader,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Verify, cache and export the INSEE commune datasets
///
/// Raw files are expected under `<DATA_DIR>/raw` with their official INSEE
/// names; parsed copies are cached as Parquet under `<DATA_DIR>/cache`.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Root of the `raw/` and `cache/` directories
    #[arg(long, env = "COMMUNES_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Raw files directory, overriding `<DATA_DIR>/raw`
    #[arg(long)]
    raw_dir: Option<PathBuf>,

    /// Cache directory, overriding `<DATA_DIR>/cache`
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Always parse the raw files, never read or write the cache
    #[arg(long)]
    no_cache: bool,

    /// Fail when a dataset does not hold the documented number of communes
    #[arg(long)]
    strict: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load every dataset and report its commune count (default)
    Verify,

    /// Write the merged per-commune profiles as CSV
    Export {
        #[arg(short, long, default_value = "communes.csv")]
        output: PathBuf,
    },

    /// List a dataset's columns with their INSEE labels
    Describe { dataset: DatasetKind },

    /// Inspect or empty the Parquet cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    List,
    Clear,
}

impl Args {
    fn config(&self) -> Config {
        let mut config = Config::from_data_dir(&self.data_dir)
            .with_cache(!self.no_cache)
            .with_strict(self.strict);
        if let Some(raw_dir) = &self.raw_dir {
            config.raw_dir = raw_dir.clone();
        }
        if let Some(cache_dir) = &self.cache_dir {
            config.cache_dir = cache_dir.clone();
        }
        config
    }
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    // ─── 2) resolve configuration ────────────────────────────────────
    let args = Args::parse();
    let config = args.config();
    info!(
        raw_dir = %config.raw_dir.display(),
        cache_dir = %config.cache_dir.display(),
        cache = config.use_cache,
        strict = config.strict,
        "startup"
    );

    // ─── 3) dispatch ─────────────────────────────────────────────────
    match args.command.unwrap_or(Command::Verify) {
        Command::Verify => verify(config),
        Command::Export { output } => export(config, output),
        Command::Describe { dataset } => describe(config, dataset),
        Command::Cache { action } => cache(config, action),
    }
}

fn verify(config: Config) -> Result<()> {
    let summary = VerificationSummary::run(&Loader::new(config));
    println!("{}", summary);
    if !summary.is_success() {
        bail!(
            "{} of {} datasets failed verification",
            summary.failures().count(),
            summary.outcomes().len()
        );
    }
    Ok(())
}

fn export(config: Config, output: PathBuf) -> Result<()> {
    let loader = Loader::new(config);
    let housing = loader
        .load(DatasetKind::Housing)
        .context("housing is required for commune profiles")?;
    let income = match loader.load(DatasetKind::Income) {
        Ok(loaded) => Some(loaded.table),
        Err(e) => {
            warn!("income unavailable, median income will be imputed: {}", e);
            None
        }
    };

    let profiles = build_profiles(&housing.table, income.as_ref())?;
    export_profiles(&profiles, &output)?;
    println!(
        "wrote {} commune profiles to {}",
        format_count(profiles.len()),
        output.display()
    );
    Ok(())
}

fn describe(config: Config, kind: DatasetKind) -> Result<()> {
    let metadata = match config.metadata_path(kind) {
        Some(path) if path.is_file() => {
            let metadata = DatasetMetadata::load(&path)?;
            if metadata.is_empty() {
                warn!("variable dictionary {} has no entries", path.display());
            } else {
                info!(variables = metadata.len(), "loaded variable dictionary");
            }
            Some(metadata)
        }
        Some(path) => {
            warn!("variable dictionary not found at {}", path.display());
            None
        }
        None => None,
    };
    let loaded = Loader::new(config).load(kind)?;
    let table = &loaded.table;

    println!(
        "{} ({} communes, key column {})",
        kind,
        format_count(table.len()),
        table.key_header()
    );
    for header in table.headers() {
        let label = metadata
            .as_ref()
            .and_then(|m| m.label(header))
            .unwrap_or("");
        println!("  {:<24} {}", header, label);
    }
    Ok(())
}

fn cache(config: Config, action: CacheAction) -> Result<()> {
    let cache = TableCache::new(&config.cache_dir);
    match action {
        CacheAction::List => {
            let entries = cache.entries()?;
            if entries.is_empty() {
                println!("cache at {} is empty", cache.dir().display());
            }
            for m in entries {
                println!(
                    "{:<12} {:>10} rows  key {:<12} cached {}  from {}",
                    m.dataset.as_str(),
                    format_count(m.rows),
                    m.key_column,
                    m.created_at.format("%Y-%m-%d %H:%M:%S"),
                    m.source.path.display()
                );
            }
        }
        CacheAction::Clear => {
            let removed = cache.clear()?;
            println!("removed {} cache files from {}", removed, cache.dir().display());
        }
    }
    Ok(())
}
