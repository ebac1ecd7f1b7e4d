use anyhow::Result;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::asset_store::AssetStore;
use crate::database::models::{NewFilmRecord, NewSubtitleRecord};
use crate::database::Repository;
use crate::enrichment::PhraseExtractor;
use crate::errors::IngestError;
use crate::manifest::ManifestResolver;
use crate::subtitle_processor::{align_tracks, SubtitleEntry, SubtitleTrack};
use crate::transcoder::{produce_renditions, RenditionSegmenter};

// @module: Film ingestion and deletion orchestration

/// Language tag of the source subtitle track
pub const SOURCE_LANGUAGE: &str = "en";

/// Language tag of the translation subtitle track
pub const TRANSLATION_LANGUAGE: &str = "ru";

/// Poster image extensions accepted for upload
const ALLOWED_IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "webp", "png"];

/// A film ingestion request: catalog metadata plus local asset paths
#[derive(Debug, Clone)]
pub struct NewFilm {
    /// Film title
    pub title: String,
    /// Optional description
    pub description: Option<String>,
    /// IMDb rating
    pub imdb_rating: f64,
    /// Kinopoisk rating
    pub kinopoisk_rating: f64,
    /// Release year
    pub year: i64,
    /// Category tag
    pub category: String,
    /// Poster image path
    pub poster: PathBuf,
    /// Large poster image path
    pub big_poster: PathBuf,
    /// Title image path
    pub title_image: PathBuf,
    /// Source video path
    pub video: PathBuf,
    /// Source-language subtitle file (SRT)
    pub source_subtitles: PathBuf,
    /// Translation-language subtitle file (SRT)
    pub translation_subtitles: PathBuf,
}

/// Coordinates storage, transcoding, subtitle processing, the relational
/// write and the post-commit enrichment pass for a single film.
pub struct FilmIngestionOrchestrator {
    // @field: Object store for posters, playlists and segments
    store: Arc<dyn AssetStore>,

    // @field: Rendition segmenter (ffmpeg in production)
    segmenter: Arc<dyn RenditionSegmenter>,

    // @field: Playlist resolver used during deletion
    resolver: Arc<dyn ManifestResolver>,

    // @field: Relational repository
    repository: Repository,

    // @field: Post-commit phrase extractor
    extractor: PhraseExtractor,

    // @field: Start-time drift tolerated when aligning tracks, in seconds
    align_tolerance_seconds: u64,
}

impl FilmIngestionOrchestrator {
    pub fn new(
        store: Arc<dyn AssetStore>,
        segmenter: Arc<dyn RenditionSegmenter>,
        resolver: Arc<dyn ManifestResolver>,
        repository: Repository,
        extractor: PhraseExtractor,
        align_tolerance_seconds: u64,
    ) -> Self {
        Self {
            store,
            segmenter,
            resolver,
            repository,
            extractor,
            align_tolerance_seconds,
        }
    }

    /// Ingest a film end to end and return its catalog id.
    ///
    /// Posters are uploaded first, then every rendition is transcoded and
    /// uploaded, then both subtitle tracks are parsed, aligned and written
    /// together with the film row and its variants in one transaction.
    /// Enrichment runs after the commit and can never fail the ingestion.
    ///
    /// A failure after uploads have started leaves the already-uploaded
    /// objects in place; they are not rolled back.
    pub async fn ingest(&self, film: &NewFilm) -> Result<i64, IngestError> {
        validate_image_extension(&film.poster)?;
        validate_image_extension(&film.big_poster)?;
        validate_image_extension(&film.title_image)?;

        for path in [
            &film.poster,
            &film.big_poster,
            &film.title_image,
            &film.video,
            &film.source_subtitles,
            &film.translation_subtitles,
        ] {
            if !path.exists() {
                return Err(IngestError::MissingAsset(path.clone()));
            }
        }

        let ingest_id = Uuid::new_v4().to_string();
        info!("Starting ingestion '{}' for film '{}'", ingest_id, film.title);

        let poster_key = self.upload_poster(&ingest_id, "poster", &film.poster).await?;
        let big_poster_key = self
            .upload_poster(&ingest_id, "bigPoster", &film.big_poster)
            .await?;
        let title_image_key = self
            .upload_poster(&ingest_id, "titleImage", &film.title_image)
            .await?;

        let variants = produce_renditions(
            self.segmenter.as_ref(),
            self.store.as_ref(),
            &film.video,
            &ingest_id,
        )
        .await?;
        info!("Produced {} renditions for '{}'", variants.len(), ingest_id);

        let source_track =
            SubtitleTrack::parse_srt_file(&film.source_subtitles, SOURCE_LANGUAGE)
                .map_err(|e| IngestError::Subtitle(e.to_string()))?;
        let translation_track =
            SubtitleTrack::parse_srt_file(&film.translation_subtitles, TRANSLATION_LANGUAGE)
                .map_err(|e| IngestError::Subtitle(e.to_string()))?;

        let aligned_translation = align_tracks(
            &source_track.entries,
            &translation_track.entries,
            self.align_tolerance_seconds,
        );
        let subtitles = cross_populated_records(&source_track.entries, &aligned_translation);

        let record = NewFilmRecord {
            title: film.title.clone(),
            description: film.description.clone(),
            imdb_rating: film.imdb_rating,
            kinopoisk_rating: film.kinopoisk_rating,
            year: film.year,
            category: film.category.clone(),
            poster_key,
            big_poster_key,
            title_image_key,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let film_id = self
            .repository
            .persist_catalog_entry(record, variants, subtitles)
            .await?;
        info!("Persisted film {} ('{}')", film_id, film.title);

        // Best effort from here on: the film is already committed.
        match self
            .repository
            .subtitles_for_film(film_id, Some(SOURCE_LANGUAGE.to_string()))
            .await
        {
            Ok(rows) => {
                if let Err(e) = self.extractor.enrich(&rows).await {
                    error!("Enrichment failed for film {}: {}", film_id, e);
                }
            }
            Err(e) => error!("Could not load subtitles for enrichment: {}", e),
        }

        Ok(film_id)
    }

    /// Delete a film: its posters, every rendition's segments and playlist,
    /// and finally its catalog row.
    ///
    /// Storage and playlist-resolution failures are logged and skipped so a
    /// half-missing film can still be removed from the catalog.
    pub async fn delete(&self, film_id: i64) -> Result<(), IngestError> {
        let film = self
            .repository
            .get_film(film_id)
            .await?
            .ok_or(IngestError::FilmNotFound(film_id))?;

        info!("Deleting film {} ('{}')", film_id, film.title);

        for key in [&film.poster_key, &film.big_poster_key, &film.title_image_key] {
            self.delete_object(key).await;
        }

        let variants = self.repository.get_film_variants(film_id).await?;
        for variant in &variants {
            match self.resolver.segment_keys_for(&variant.manifest_key).await {
                Ok(segment_keys) => {
                    for key in &segment_keys {
                        self.delete_object(key).await;
                    }
                }
                Err(e) => {
                    warn!(
                        "Could not resolve manifest '{}', leaving its segments behind: {}",
                        variant.manifest_key, e
                    );
                }
            }
            self.delete_object(&variant.manifest_key).await;
        }

        let deleted = self.repository.delete_film(film_id).await?;
        if !deleted {
            warn!("Film {} disappeared before its row could be deleted", film_id);
        }

        Ok(())
    }

    async fn upload_poster(
        &self,
        ingest_id: &str,
        kind: &str,
        path: &Path,
    ) -> Result<String, IngestError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();
        let key = format!("posters/{}-{}.{}", ingest_id, kind, ext);

        let url = self.store.put_file(&key, path).await?;
        debug!("Uploaded {} to {}", kind, url);

        Ok(key)
    }

    async fn delete_object(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!("Failed to delete object '{}': {}", key, e);
        }
    }
}

/// Reject poster files whose extension is not a supported image format
fn validate_image_extension(path: &Path) -> Result<(), IngestError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(IngestError::UnsupportedImageFormat(
            path.to_string_lossy().into_owned(),
        ))
    }
}

/// Build insertable rows for both tracks, denormalizing each entry's
/// counterpart text by display start time.
///
/// The translation entries are expected to be aligned already, so a
/// translation entry that matched a source entry carries the same start
/// time and the lookup succeeds in both directions. Unmatched entries get
/// no counterpart text.
fn cross_populated_records(
    source: &[SubtitleEntry],
    translation: &[SubtitleEntry],
) -> Vec<NewSubtitleRecord> {
    let source_by_start: HashMap<String, &str> = source
        .iter()
        .map(|e| (e.format_start_time(), e.text.as_str()))
        .collect();
    let translation_by_start: HashMap<String, &str> = translation
        .iter()
        .map(|e| (e.format_start_time(), e.text.as_str()))
        .collect();

    let mut records = Vec::with_capacity(source.len() + translation.len());

    for entry in source {
        let translate = translation_by_start
            .get(&entry.format_start_time())
            .map(|t| t.to_string());
        records.push(subtitle_record(entry, SOURCE_LANGUAGE, translate));
    }
    for entry in translation {
        let translate = source_by_start
            .get(&entry.format_start_time())
            .map(|t| t.to_string());
        records.push(subtitle_record(entry, TRANSLATION_LANGUAGE, translate));
    }

    records
}

fn subtitle_record(
    entry: &SubtitleEntry,
    language: &str,
    translate: Option<String>,
) -> NewSubtitleRecord {
    NewSubtitleRecord {
        language: language.to_string(),
        start_time: entry.format_start_time(),
        end_time: entry.format_end_time(),
        start_seconds: entry.start_seconds() as i64,
        end_seconds: entry.end_seconds() as i64,
        text: entry.text.clone(),
        translate,
    }
}
