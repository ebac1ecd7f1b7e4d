/*!
 * Tests for film deletion: posters, segments, manifests and the catalog row
 */

use std::sync::Arc;

use anyhow::Result;

use kinolingo::asset_store::AssetStore;
use kinolingo::enrichment::mock::MockOracle;
use kinolingo::errors::IngestError;

use crate::common::{self, FakeSegmenter};

#[tokio::test]
async fn test_delete_shouldRemoveEveryStoredObjectAndTheRow() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let film = common::sample_film(temp_dir.path())?;
    let pipeline = common::build_pipeline(
        Arc::new(FakeSegmenter::new(6)),
        Arc::new(MockOracle::working()),
    )?;

    let film_id = pipeline.orchestrator.ingest(&film).await?;
    // 3 posters + 3 renditions x (6 segments + 1 manifest)
    assert_eq!(pipeline.store.stored_keys().len(), 24);

    pipeline.orchestrator.delete(film_id).await?;

    assert!(pipeline.store.stored_keys().is_empty());
    assert!(pipeline.repository.get_film(film_id).await?.is_none());
    assert!(pipeline
        .repository
        .subtitles_for_film(film_id, None)
        .await?
        .is_empty());

    // One delete per stored object, nothing more
    let attempts = pipeline.store.delete_attempts();
    assert_eq!(attempts.len(), 24);
    for rendition in ["1080", "720", "480"] {
        let for_rendition = attempts
            .iter()
            .filter(|k| k.contains(&format!("/{}/", rendition)))
            .count();
        assert_eq!(for_rendition, 7, "rendition {}", rendition);
    }
    Ok(())
}

#[tokio::test]
async fn test_delete_withFailingStorageDelete_shouldStillDestroyTheRow() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let film = common::sample_film(temp_dir.path())?;
    let pipeline = common::build_pipeline(
        Arc::new(FakeSegmenter::new(2)),
        Arc::new(MockOracle::working()),
    )?;

    let film_id = pipeline.orchestrator.ingest(&film).await?;
    let record = pipeline.repository.get_film(film_id).await?.unwrap();
    pipeline.store.fail_delete_of(&record.poster_key);

    pipeline.orchestrator.delete(film_id).await?;

    // The failed object stays behind, everything else is gone
    assert_eq!(pipeline.store.stored_keys(), vec![record.poster_key.clone()]);
    assert!(pipeline.repository.get_film(film_id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_delete_withUnresolvableManifest_shouldSkipSegmentsButStillDeleteManifestKey(
) -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let film = common::sample_film(temp_dir.path())?;
    let pipeline = common::build_pipeline(
        Arc::new(FakeSegmenter::new(2)),
        Arc::new(MockOracle::working()),
    )?;

    let film_id = pipeline.orchestrator.ingest(&film).await?;
    let variants = pipeline.repository.get_film_variants(film_id).await?;

    // Remove one manifest out from under the resolver
    let lost_manifest = &variants[0].manifest_key;
    let lost_prefix = lost_manifest.trim_end_matches("index.m3u8").to_string();
    pipeline.store.delete(lost_manifest).await.ok();

    pipeline.orchestrator.delete(film_id).await?;

    // That rendition's segments could not be enumerated and stay behind
    let leftovers = pipeline.store.stored_keys();
    assert_eq!(leftovers.len(), 2);
    assert!(leftovers.iter().all(|k| k.starts_with(&lost_prefix)));
    assert!(pipeline.repository.get_film(film_id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_delete_unknownFilm_shouldReturnNotFound() -> Result<()> {
    let pipeline = common::build_pipeline(
        Arc::new(FakeSegmenter::new(1)),
        Arc::new(MockOracle::working()),
    )?;

    let result = pipeline.orchestrator.delete(4242).await;
    assert!(matches!(result, Err(IngestError::FilmNotFound(4242))));
    Ok(())
}

#[tokio::test]
async fn test_delete_twice_shouldFailTheSecondTime() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let film = common::sample_film(temp_dir.path())?;
    let pipeline = common::build_pipeline(
        Arc::new(FakeSegmenter::new(1)),
        Arc::new(MockOracle::working()),
    )?;

    let film_id = pipeline.orchestrator.ingest(&film).await?;
    pipeline.orchestrator.delete(film_id).await?;

    let result = pipeline.orchestrator.delete(film_id).await;
    assert!(matches!(result, Err(IngestError::FilmNotFound(_))));
    Ok(())
}
