/*!
 * Common test utilities for the kinolingo test suite
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use kinolingo::asset_store::{AssetStore, MemoryAssetStore};
use kinolingo::database::{Rendition, Repository};
use kinolingo::enrichment::{PhraseExtractor, PhraseOracle};
use kinolingo::errors::TranscodeError;
use kinolingo::ingestion::{FilmIngestionOrchestrator, NewFilm};
use kinolingo::manifest::StoreManifestResolver;
use kinolingo::transcoder::RenditionSegmenter;

/// Bucket name used by the in-memory store
pub const TEST_BUCKET: &str = "kinolingo-test";

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &[u8]) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Source-language subtitle fixture with three entries
pub const SOURCE_SRT: &str = r#"1
00:00:01,000 --> 00:00:03,000
Hold on, I'm coming over.

2
00:00:05,000 --> 00:00:07,500
It's raining cats and dogs.

3
00:01:00,000 --> 00:01:02,000
See you tomorrow.
"#;

/// Translation fixture whose timings drift within the same whole second
pub const TRANSLATION_SRT: &str = r#"1
00:00:01,300 --> 00:00:03,200
Подожди, я сейчас приду.

2
00:00:05,400 --> 00:00:07,900
Льёт как из ведра.

3
00:01:00,200 --> 00:01:02,100
До завтра.
"#;

/// Generate an SRT document with `n` entries, one every four seconds,
/// each offset by `offset_ms` within its second
pub fn generated_srt(n: usize, offset_ms: u64, text_prefix: &str) -> String {
    let mut out = String::new();
    for i in 0..n {
        let start_ms = (i as u64 + 1) * 4_000 + offset_ms;
        let end_ms = start_ms + 2_000;
        out.push_str(&format!(
            "{}\n{} --> {}\n{} line {}\n\n",
            i + 1,
            format_srt_timestamp(start_ms),
            format_srt_timestamp(end_ms),
            text_prefix,
            i + 1
        ));
    }
    out
}

fn format_srt_timestamp(ms: u64) -> String {
    format!(
        "{:02}:{:02}:{:02},{:03}",
        ms / 3_600_000,
        (ms % 3_600_000) / 60_000,
        (ms % 60_000) / 1_000,
        ms % 1_000
    )
}

/// Write a complete set of ingestion input files into `dir`
pub fn sample_film(dir: &Path) -> Result<NewFilm> {
    let poster = create_test_file(dir, "poster.jpg", b"fake-poster")?;
    let big_poster = create_test_file(dir, "big_poster.webp", b"fake-big-poster")?;
    let title_image = create_test_file(dir, "title.png", b"fake-title-image")?;
    let video = create_test_file(dir, "movie.mp4", b"fake-video-bytes")?;
    let source_subtitles = create_test_file(dir, "movie.en.srt", SOURCE_SRT.as_bytes())?;
    let translation_subtitles = create_test_file(dir, "movie.ru.srt", TRANSLATION_SRT.as_bytes())?;

    Ok(NewFilm {
        title: "The Long Goodbye".to_string(),
        description: Some("A test film".to_string()),
        imdb_rating: 7.6,
        kinopoisk_rating: 7.9,
        year: 1973,
        category: "drama".to_string(),
        poster,
        big_poster,
        title_image,
        video,
        source_subtitles,
        translation_subtitles,
    })
}

/// Segmenter double that writes a playlist and fake segments instead of
/// running ffmpeg. Can be told to fail one rendition.
pub struct FakeSegmenter {
    fail_rendition: Option<Rendition>,
    segments_per_rendition: usize,
}

impl FakeSegmenter {
    pub fn new(segments_per_rendition: usize) -> Self {
        Self {
            fail_rendition: None,
            segments_per_rendition,
        }
    }

    pub fn failing_at(rendition: Rendition, segments_per_rendition: usize) -> Self {
        Self {
            fail_rendition: Some(rendition),
            segments_per_rendition,
        }
    }
}

#[async_trait]
impl RenditionSegmenter for FakeSegmenter {
    async fn segment(
        &self,
        _source: &Path,
        rendition: Rendition,
        out_dir: &Path,
    ) -> Result<(), TranscodeError> {
        if self.fail_rendition == Some(rendition) {
            return Err(TranscodeError::TranscodeFailed {
                rendition,
                detail: "simulated encoder failure".to_string(),
            });
        }

        let mut playlist = String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:20\n");
        for i in 0..self.segments_per_rendition {
            let name = format!("index{}.ts", i);
            fs::write(out_dir.join(&name), b"fake-segment")
                .map_err(|e| TranscodeError::Spawn(e.to_string()))?;
            playlist.push_str("#EXTINF:20.0,\n");
            playlist.push_str(&name);
            playlist.push('\n');
        }
        playlist.push_str("#EXT-X-ENDLIST\n");
        fs::write(out_dir.join("index.m3u8"), playlist)
            .map_err(|e| TranscodeError::Spawn(e.to_string()))?;

        Ok(())
    }
}

/// A fully wired pipeline over in-memory storage and database
pub struct TestPipeline {
    pub store: Arc<MemoryAssetStore>,
    pub repository: Repository,
    pub orchestrator: FilmIngestionOrchestrator,
}

/// Wire an orchestrator from test doubles, with an alignment tolerance of
/// one second
pub fn build_pipeline(
    segmenter: Arc<dyn RenditionSegmenter>,
    oracle: Arc<dyn PhraseOracle>,
) -> Result<TestPipeline> {
    let store = Arc::new(MemoryAssetStore::new());
    let repository = Repository::new_in_memory()?;
    let resolver = Arc::new(StoreManifestResolver::new(
        store.clone() as Arc<dyn AssetStore>,
        TEST_BUCKET.to_string(),
    ));
    let extractor = PhraseExtractor::new(oracle, repository.clone());

    let orchestrator = FilmIngestionOrchestrator::new(
        store.clone(),
        segmenter,
        resolver,
        repository.clone(),
        extractor,
        1,
    );

    Ok(TestPipeline {
        store,
        repository,
        orchestrator,
    })
}
