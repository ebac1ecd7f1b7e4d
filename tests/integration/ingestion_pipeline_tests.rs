/*!
 * End-to-end ingestion tests over in-memory storage and database
 */

use std::sync::Arc;

use anyhow::Result;

use kinolingo::database::Rendition;
use kinolingo::enrichment::mock::MockOracle;
use kinolingo::errors::{IngestError, TranscodeError};

use crate::common::{self, FakeSegmenter};

#[tokio::test]
async fn test_ingest_happyPath_shouldPersistWholeCatalogEntry() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let film = common::sample_film(temp_dir.path())?;
    let pipeline = common::build_pipeline(
        Arc::new(FakeSegmenter::new(2)),
        Arc::new(MockOracle::working()),
    )?;

    let film_id = pipeline.orchestrator.ingest(&film).await?;

    let record = pipeline.repository.get_film(film_id).await?.unwrap();
    assert_eq!(record.title, "The Long Goodbye");
    assert!(record.poster_key.starts_with("posters/"));
    assert!(record.poster_key.ends_with("-poster.jpg"));
    assert!(record.big_poster_key.ends_with("-bigPoster.webp"));
    assert!(record.title_image_key.ends_with("-titleImage.png"));

    let variants = pipeline.repository.get_film_variants(film_id).await?;
    assert_eq!(variants.len(), 3);
    for variant in &variants {
        assert!(
            variant.manifest_key.ends_with("/index.m3u8"),
            "{}",
            variant.manifest_key
        );
        assert!(pipeline.store.contains(&variant.manifest_key));
    }

    // 3 posters + 3 renditions x (2 segments + 1 manifest)
    assert_eq!(pipeline.store.stored_keys().len(), 12);
    Ok(())
}

#[tokio::test]
async fn test_ingest_happyPath_shouldCrossPopulateTranslations() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let film = common::sample_film(temp_dir.path())?;
    let pipeline = common::build_pipeline(
        Arc::new(FakeSegmenter::new(1)),
        Arc::new(MockOracle::working()),
    )?;

    let film_id = pipeline.orchestrator.ingest(&film).await?;

    let source_rows = pipeline
        .repository
        .subtitles_for_film(film_id, Some("en".to_string()))
        .await?;
    let translation_rows = pipeline
        .repository
        .subtitles_for_film(film_id, Some("ru".to_string()))
        .await?;

    assert_eq!(source_rows.len(), 3);
    assert_eq!(translation_rows.len(), 3);

    // The aligned translation rows carry the source timecodes, and each
    // side references the other's text.
    for (source_row, translation_row) in source_rows.iter().zip(&translation_rows) {
        assert_eq!(translation_row.start_time, source_row.start_time);
        assert_eq!(
            source_row.translate.as_deref(),
            Some(translation_row.text.as_str())
        );
        assert_eq!(
            translation_row.translate.as_deref(),
            Some(source_row.text.as_str())
        );
    }

    assert_eq!(
        source_rows[1].translate.as_deref(),
        Some("Льёт как из ведра.")
    );
    Ok(())
}

#[tokio::test]
async fn test_ingest_happyPath_shouldEnrichSourceRowsAfterCommit() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let film = common::sample_film(temp_dir.path())?;
    let pipeline = common::build_pipeline(
        Arc::new(FakeSegmenter::new(1)),
        Arc::new(MockOracle::working()),
    )?;

    let film_id = pipeline.orchestrator.ingest(&film).await?;

    let source_rows = pipeline
        .repository
        .subtitles_for_film(film_id, Some("en".to_string()))
        .await?;
    for row in &source_rows {
        assert_eq!(row.ai_translate.as_deref(), Some(format!("ai:{}", row.text).as_str()));
    }

    // The translation track is not sent to the oracle
    let translation_rows = pipeline
        .repository
        .subtitles_for_film(film_id, Some("ru".to_string()))
        .await?;
    assert!(translation_rows.iter().all(|r| r.ai_translate.is_none()));
    Ok(())
}

#[tokio::test]
async fn test_ingest_fiftyLineTracks_shouldEnrichEveryChunk() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut film = common::sample_film(temp_dir.path())?;
    film.source_subtitles = common::create_test_file(
        temp_dir.path(),
        "long.en.srt",
        common::generated_srt(50, 0, "Source").as_bytes(),
    )?;
    film.translation_subtitles = common::create_test_file(
        temp_dir.path(),
        "long.ru.srt",
        common::generated_srt(50, 300, "Перевод").as_bytes(),
    )?;

    let oracle = Arc::new(MockOracle::working());
    let pipeline = common::build_pipeline(Arc::new(FakeSegmenter::new(1)), oracle.clone())?;

    let film_id = pipeline.orchestrator.ingest(&film).await?;

    let source_rows = pipeline
        .repository
        .subtitles_for_film(film_id, Some("en".to_string()))
        .await?;
    assert_eq!(source_rows.len(), 50);
    assert!(source_rows.iter().all(|r| r.ai_translate.is_some()));
    assert!(source_rows.iter().all(|r| r.translate.is_some()));

    // 50 lines in chunks of 10, one oracle round trip each
    assert_eq!(oracle.request_count(), 5);
    Ok(())
}

#[tokio::test]
async fn test_ingest_renditionFailure_shouldAbortButKeepUploads() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let film = common::sample_film(temp_dir.path())?;
    let pipeline = common::build_pipeline(
        Arc::new(FakeSegmenter::failing_at(Rendition::P720, 2)),
        Arc::new(MockOracle::working()),
    )?;

    let result = pipeline.orchestrator.ingest(&film).await;

    match result {
        Err(IngestError::Transcode(TranscodeError::TranscodeFailed { rendition, .. })) => {
            assert_eq!(rendition, Rendition::P720);
        }
        other => panic!("expected transcode failure, got {:?}", other.map(|_| ())),
    }

    // Nothing was committed
    assert!(pipeline.repository.list_films().await?.is_empty());

    // But the posters and the two healthy renditions were already uploaded
    let keys = pipeline.store.stored_keys();
    assert_eq!(keys.len(), 9);
    assert!(keys.iter().any(|k| k.contains("/1080/index.m3u8")));
    assert!(keys.iter().any(|k| k.contains("/480/index.m3u8")));
    assert!(!keys.iter().any(|k| k.contains("/720/")));
    Ok(())
}

#[tokio::test]
async fn test_ingest_unsupportedPosterFormat_shouldFailBeforeAnyUpload() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut film = common::sample_film(temp_dir.path())?;
    film.poster = common::create_test_file(temp_dir.path(), "poster.gif", b"gif")?;

    let pipeline = common::build_pipeline(
        Arc::new(FakeSegmenter::new(1)),
        Arc::new(MockOracle::working()),
    )?;

    let result = pipeline.orchestrator.ingest(&film).await;
    assert!(matches!(result, Err(IngestError::UnsupportedImageFormat(_))));
    assert!(pipeline.store.stored_keys().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_ingest_missingVideoFile_shouldFailBeforeAnyUpload() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut film = common::sample_film(temp_dir.path())?;
    film.video = temp_dir.path().join("does-not-exist.mp4");

    let pipeline = common::build_pipeline(
        Arc::new(FakeSegmenter::new(1)),
        Arc::new(MockOracle::working()),
    )?;

    let result = pipeline.orchestrator.ingest(&film).await;
    assert!(matches!(result, Err(IngestError::MissingAsset(_))));
    assert!(pipeline.store.stored_keys().is_empty());
    Ok(())
}
