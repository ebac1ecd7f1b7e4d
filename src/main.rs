// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::Config;
use crate::asset_store::S3AssetStore;
use crate::database::Repository;
use crate::enrichment::{PhraseExtractor, YandexGpt};
use crate::ingestion::{FilmIngestionOrchestrator, NewFilm};
use crate::manifest::HttpManifestResolver;
use crate::transcoder::VideoTranscoder;

mod app_config;
mod asset_store;
mod database;
mod enrichment;
mod errors;
mod ingestion;
mod manifest;
mod subtitle_processor;
mod transcoder;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

#[derive(Parser, Debug)]
#[command(name = "kinolingo", about = "Film ingestion pipeline for a language-learning catalog")]
struct CommandLineOptions {
    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest a film: transcode, upload, persist and enrich
    Ingest(IngestArgs),

    /// Delete a film and every object it owns in storage
    Delete {
        /// Catalog id of the film
        film_id: i64,
    },

    /// List catalog entries
    List,

    /// Show database statistics
    Stats,
}

#[derive(Parser, Debug)]
struct IngestArgs {
    /// Film title
    #[arg(long)]
    title: String,

    /// Film description
    #[arg(long)]
    description: Option<String>,

    /// IMDb rating
    #[arg(long, default_value_t = 0.0)]
    imdb_rating: f64,

    /// Kinopoisk rating
    #[arg(long, default_value_t = 0.0)]
    kinopoisk_rating: f64,

    /// Release year
    #[arg(long)]
    year: i64,

    /// Category tag (e.g. "drama")
    #[arg(long)]
    category: String,

    /// Poster image (jpg, jpeg, webp or png)
    #[arg(long)]
    poster: PathBuf,

    /// Large poster image
    #[arg(long)]
    big_poster: PathBuf,

    /// Title image
    #[arg(long)]
    title_image: PathBuf,

    /// Source video file
    #[arg(long)]
    video: PathBuf,

    /// Source-language subtitles (SRT)
    #[arg(long)]
    source_subtitles: PathBuf,

    /// Translation-language subtitles (SRT)
    #[arg(long)]
    translation_subtitles: PathBuf,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color code for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let color = Self::color_for_level(record.level());

            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {:5} {}\x1B[0m",
                color,
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger once with info level by default
    // We'll update the level after loading the config if needed
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    if let Some(cmd_log_level) = &cli.log_level {
        let config_log_level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(level_filter(&config_log_level));
    }

    // Load or create configuration
    let config = if Path::new(&cli.config_path).exists() {
        Config::from_file(&cli.config_path)?
    } else {
        warn!(
            "Config file not found at '{}', creating default config.",
            cli.config_path
        );
        let config = Config::default();
        config.save(&cli.config_path)?;
        config
    };

    config.validate().context("Configuration validation failed")?;

    // If log level was not set via command line, update it from config now
    if cli.log_level.is_none() {
        log::set_max_level(level_filter(&config.log_level));
    }

    let repository = if config.database.path.is_empty() {
        Repository::new_default()?
    } else {
        let db = database::DatabaseConnection::new(&config.database.path)?;
        Repository::new(db)
    };

    match cli.command {
        Commands::Ingest(args) => {
            let orchestrator = build_orchestrator(&config, repository)?;
            let film = NewFilm {
                title: args.title,
                description: args.description,
                imdb_rating: args.imdb_rating,
                kinopoisk_rating: args.kinopoisk_rating,
                year: args.year,
                category: args.category,
                poster: args.poster,
                big_poster: args.big_poster,
                title_image: args.title_image,
                video: args.video,
                source_subtitles: args.source_subtitles,
                translation_subtitles: args.translation_subtitles,
            };

            let film_id = orchestrator.ingest(&film).await?;
            println!("Ingested film with id {}", film_id);
        }
        Commands::Delete { film_id } => {
            let orchestrator = build_orchestrator(&config, repository)?;
            orchestrator.delete(film_id).await?;
            println!("Deleted film {}", film_id);
        }
        Commands::List => {
            let films = repository.list_films().await?;
            if films.is_empty() {
                println!("No films in the catalog.");
            }
            for film in films {
                println!(
                    "{:5}  {} ({})  [{}]  added {}",
                    film.id, film.title, film.year, film.category, film.created_at
                );
            }
        }
        Commands::Stats => {
            let stats = repository.stats()?;
            println!("Films:     {}", stats.film_count);
            println!("Variants:  {}", stats.variant_count);
            println!("Subtitles: {}", stats.subtitle_count);
            println!("Phrases:   {}", stats.phrase_count);
            println!("DB size:   {} bytes", stats.file_size_bytes);
        }
    }

    Ok(())
}

/// Wire the production components together from the configuration
fn build_orchestrator(
    config: &Config,
    repository: Repository,
) -> Result<FilmIngestionOrchestrator> {
    let store = Arc::new(S3AssetStore::new(&config.storage));
    let segmenter = Arc::new(VideoTranscoder::new(&config.transcoder));
    let resolver = Arc::new(HttpManifestResolver::new(
        &config.storage.endpoint,
        &config.storage.bucket,
    ));
    let oracle = Arc::new(YandexGpt::new(&config.oracle));
    let extractor = PhraseExtractor::new(oracle, repository.clone());

    Ok(FilmIngestionOrchestrator::new(
        store,
        segmenter,
        resolver,
        repository,
        extractor,
        config.align_tolerance_seconds,
    ))
}
