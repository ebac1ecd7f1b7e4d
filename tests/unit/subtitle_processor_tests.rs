/*!
 * Unit tests for subtitle file handling and track alignment
 */

use anyhow::Result;

use kinolingo::subtitle_processor::{align_tracks, SubtitleTrack};

use crate::common;

#[test]
fn test_parseSrtFile_withFixture_shouldLoadAllEntries() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        temp_dir.path(),
        "movie.en.srt",
        common::SOURCE_SRT.as_bytes(),
    )?;

    let track = SubtitleTrack::parse_srt_file(&path, "en")?;

    assert_eq!(track.language, "en");
    assert_eq!(track.entries.len(), 3);
    assert_eq!(track.entries[0].text, "Hold on, I'm coming over.");
    assert_eq!(track.entries[0].start_time_ms, 1000);
    Ok(())
}

#[test]
fn test_writeToSrt_thenParse_shouldPreserveEntries() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let source = common::create_test_file(
        temp_dir.path(),
        "movie.en.srt",
        common::SOURCE_SRT.as_bytes(),
    )?;

    let track = SubtitleTrack::parse_srt_file(&source, "en")?;
    let rewritten = temp_dir.path().join("rewritten.srt");
    track.write_to_srt(&rewritten)?;

    let reloaded = SubtitleTrack::parse_srt_file(&rewritten, "en")?;
    assert_eq!(reloaded.entries, track.entries);
    Ok(())
}

#[test]
fn test_alignTracks_withFixtureDrift_shouldAdoptSourceTimings() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let source_path = common::create_test_file(
        temp_dir.path(),
        "movie.en.srt",
        common::SOURCE_SRT.as_bytes(),
    )?;
    let translation_path = common::create_test_file(
        temp_dir.path(),
        "movie.ru.srt",
        common::TRANSLATION_SRT.as_bytes(),
    )?;

    let source = SubtitleTrack::parse_srt_file(&source_path, "en")?;
    let translation = SubtitleTrack::parse_srt_file(&translation_path, "ru")?;

    let aligned = align_tracks(&source.entries, &translation.entries, 1);

    assert_eq!(aligned.len(), 3);
    for (aligned_entry, source_entry) in aligned.iter().zip(&source.entries) {
        assert_eq!(aligned_entry.start_time_ms, source_entry.start_time_ms);
        assert_eq!(aligned_entry.end_time_ms, source_entry.end_time_ms);
    }
    // Text stays with the translation
    assert_eq!(aligned[0].text, "Подожди, я сейчас приду.");
    Ok(())
}
