/*!
 * Enrichment behavior tests: retries, degradation and phrase persistence
 */

use std::sync::Arc;

use anyhow::Result;

use kinolingo::database::{NewFilmRecord, NewSubtitleRecord, PhraseKind, Repository};
use kinolingo::enrichment::mock::MockOracle;
use kinolingo::enrichment::PhraseExtractor;

use crate::common::{self, FakeSegmenter};

fn film_record() -> NewFilmRecord {
    NewFilmRecord {
        title: "Fixture".to_string(),
        description: None,
        imdb_rating: 7.0,
        kinopoisk_rating: 7.0,
        year: 2001,
        category: "drama".to_string(),
        poster_key: "posters/x-poster.jpg".to_string(),
        big_poster_key: "posters/x-bigPoster.jpg".to_string(),
        title_image_key: "posters/x-titleImage.jpg".to_string(),
        created_at: "2026-01-01T00:00:00Z".to_string(),
    }
}

fn subtitle_row(start_seconds: i64, text: &str) -> NewSubtitleRecord {
    NewSubtitleRecord {
        language: "en".to_string(),
        start_time: format!("00:00:{:02},000", start_seconds),
        end_time: format!("00:00:{:02},000", start_seconds + 2),
        start_seconds,
        end_seconds: start_seconds + 2,
        text: text.to_string(),
        translate: None,
    }
}

async fn seed_film(repository: &Repository, lines: &[&str]) -> Result<i64> {
    let rows = lines
        .iter()
        .enumerate()
        .map(|(i, text)| subtitle_row(i as i64 * 3 + 1, text))
        .collect();
    repository
        .persist_catalog_entry(film_record(), Vec::new(), rows)
        .await
}

#[tokio::test]
async fn test_enrich_oracleFailsEveryAttempt_shouldLeaveRowsUntouched() -> Result<()> {
    let repository = Repository::new_in_memory()?;
    let film_id = seed_film(&repository, &["First line", "Second line"]).await?;
    let oracle = Arc::new(MockOracle::failing());
    let extractor = PhraseExtractor::new(oracle.clone(), repository.clone());

    let rows = repository
        .subtitles_for_film(film_id, Some("en".to_string()))
        .await?;
    extractor.enrich(&rows).await?;

    // Retry budget spent on a single chunk
    assert_eq!(oracle.request_count(), 3);

    let rows = repository
        .subtitles_for_film(film_id, Some("en".to_string()))
        .await?;
    assert!(rows.iter().all(|r| r.ai_translate.is_none()));
    assert!(repository.list_phrases().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_enrich_oracleRecovers_shouldPersistOnThirdAttempt() -> Result<()> {
    let repository = Repository::new_in_memory()?;
    let film_id = seed_film(&repository, &["Keep your chin up"]).await?;
    let oracle = Arc::new(MockOracle::fail_first(2));
    let extractor = PhraseExtractor::new(oracle.clone(), repository.clone());

    let rows = repository
        .subtitles_for_film(film_id, Some("en".to_string()))
        .await?;
    extractor.enrich(&rows).await?;

    assert_eq!(oracle.request_count(), 3);

    let rows = repository
        .subtitles_for_film(film_id, Some("en".to_string()))
        .await?;
    assert_eq!(rows[0].ai_translate.as_deref(), Some("ai:Keep your chin up"));
    Ok(())
}

#[tokio::test]
async fn test_enrich_withDetectedPhrases_shouldPersistAndLinkThem() -> Result<()> {
    let repository = Repository::new_in_memory()?;
    let film_id = seed_film(&repository, &["It's raining cats and dogs"]).await?;

    let completion = serde_json::json!([{
        "text": "It's raining cats and dogs",
        "translate": null,
        "ai_translate": "Льёт как из ведра",
        "ai_translate_comment": "An idiom for heavy rain",
        "phrasal_verbs": [],
        "idioms": [{"phrase": "raining cats and dogs", "translate": "льёт как из ведра"}]
    }])
    .to_string();
    let oracle = Arc::new(MockOracle::canned(completion));
    let extractor = PhraseExtractor::new(oracle, repository.clone());

    let rows = repository
        .subtitles_for_film(film_id, Some("en".to_string()))
        .await?;
    extractor.enrich(&rows).await?;

    let enriched = repository
        .subtitles_for_film(film_id, Some("en".to_string()))
        .await?;
    assert_eq!(enriched[0].ai_translate.as_deref(), Some("Льёт как из ведра"));
    assert_eq!(
        enriched[0].ai_translate_comment.as_deref(),
        Some("An idiom for heavy rain")
    );

    let phrases = repository.phrases_for_subtitle(enriched[0].id).await?;
    assert_eq!(phrases.len(), 1);
    assert_eq!(phrases[0].original, "raining cats and dogs");
    assert_eq!(phrases[0].kind, PhraseKind::Idiom);
    Ok(())
}

#[tokio::test]
async fn test_enrich_mixedResponse_shouldPersistValidLinesAndSkipBadOne() -> Result<()> {
    let repository = Repository::new_in_memory()?;
    let film_id = seed_film(&repository, &["First line", "Second line", "Third line"]).await?;

    // The middle element has a usable text but a non-string ai_translate
    let completion = serde_json::json!([
        {
            "text": "First line",
            "translate": null,
            "ai_translate": "Первая строка",
            "ai_translate_comment": null,
            "phrasal_verbs": [],
            "idioms": []
        },
        {
            "text": "Second line",
            "translate": null,
            "ai_translate": 42,
            "ai_translate_comment": null,
            "phrasal_verbs": [],
            "idioms": []
        },
        {
            "text": "Third line",
            "translate": null,
            "ai_translate": "Третья строка",
            "ai_translate_comment": null,
            "phrasal_verbs": [{"phrase": "line up", "translate": "выстроиться"}],
            "idioms": []
        }
    ])
    .to_string();
    let oracle = Arc::new(MockOracle::canned(completion));
    let extractor = PhraseExtractor::new(oracle.clone(), repository.clone());

    let rows = repository
        .subtitles_for_film(film_id, Some("en".to_string()))
        .await?;
    extractor.enrich(&rows).await?;

    // One usable completion, no retries
    assert_eq!(oracle.request_count(), 1);

    let rows = repository
        .subtitles_for_film(film_id, Some("en".to_string()))
        .await?;
    assert_eq!(rows[0].ai_translate.as_deref(), Some("Первая строка"));
    assert!(rows[1].ai_translate.is_none());
    assert!(rows[1].ai_translate_comment.is_none());
    assert_eq!(rows[2].ai_translate.as_deref(), Some("Третья строка"));

    assert!(repository.phrases_for_subtitle(rows[1].id).await?.is_empty());
    let phrases = repository.phrases_for_subtitle(rows[2].id).await?;
    assert_eq!(phrases.len(), 1);
    assert_eq!(phrases[0].kind, PhraseKind::PhrasalVerb);
    Ok(())
}

#[tokio::test]
async fn test_ingest_withBrokenOracle_shouldStillCommitTheFilm() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let film = common::sample_film(temp_dir.path())?;
    let pipeline = common::build_pipeline(
        Arc::new(FakeSegmenter::new(1)),
        Arc::new(MockOracle::malformed()),
    )?;

    let film_id = pipeline.orchestrator.ingest(&film).await?;

    // The film is committed even though every enrichment attempt failed
    let record = pipeline.repository.get_film(film_id).await?;
    assert!(record.is_some());

    let rows = pipeline
        .repository
        .subtitles_for_film(film_id, Some("en".to_string()))
        .await?;
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.ai_translate.is_none()));
    Ok(())
}
