/*!
 * # Kinolingo - Film Ingestion and Subtitle Enrichment Pipeline
 *
 * A Rust library for publishing films to a language-learning catalog.
 *
 * ## Features
 *
 * - Transcode source videos into parallel HLS renditions with ffmpeg
 * - Upload posters, playlists and segments to S3-compatible storage
 * - Lenient SRT parsing that salvages malformed subtitle files
 * - Align a translation subtitle track against the source track
 * - Extract idioms and phrasal verbs with an LLM, with bounded retries
 *   and graceful degradation to fallback stubs
 * - Persist the whole catalog entry in a single relational transaction
 * - Manifest-driven deletion that removes every stored object
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `asset_store`: Object storage client and in-memory test double
 * - `transcoder`: FFmpeg rendition fan-out and upload
 * - `subtitle_processor`: SRT parsing and track alignment
 * - `manifest`: HLS playlist parsing and segment key resolution
 * - `enrichment`: LLM phrase extraction:
 *   - `enrichment::oracle`: Completion API client
 *   - `enrichment::extractor`: Chunked extraction with retries
 *   - `enrichment::mock`: Scriptable oracle for tests
 * - `database`: SQLite schema, connection handling and repository
 * - `ingestion`: Film ingestion and deletion orchestration
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod asset_store;
pub mod database;
pub mod enrichment;
pub mod errors;
pub mod ingestion;
pub mod manifest;
pub mod subtitle_processor;
pub mod transcoder;

// Re-export main types for easier usage
pub use app_config::Config;
pub use asset_store::{AssetStore, MemoryAssetStore, S3AssetStore};
pub use database::{Repository, Rendition};
pub use enrichment::{PhraseExtractor, PhraseOracle, YandexGpt};
pub use errors::{IngestError, OracleError, StorageError, TranscodeError};
pub use ingestion::{FilmIngestionOrchestrator, NewFilm};
pub use subtitle_processor::{align_tracks, SubtitleEntry, SubtitleTrack};
