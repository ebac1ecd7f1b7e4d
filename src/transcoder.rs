/*!
 * HLS transcoding.
 *
 * Every source video is turned into one HLS variant per rendition: ffmpeg
 * scales and re-encodes into a segmented playlist, and the produced playlist
 * plus segments are uploaded under `hls/{ingest_id}/{rendition}/`. The
 * [`RenditionSegmenter`] trait isolates the ffmpeg invocation so the
 * pipeline can be tested without a real encoder.
 */

use std::path::Path;

use async_trait::async_trait;
use futures::future;
use log::{debug, error, info};
use tempfile::TempDir;
use tokio::process::Command;

use crate::app_config::TranscoderConfig;
use crate::asset_store::AssetStore;
use crate::database::models::Rendition;
use crate::errors::TranscodeError;

/// Playlist filename inside each rendition directory
const PLAYLIST_NAME: &str = "index.m3u8";

/// Produces the HLS playlist and segments for one rendition into a directory
#[async_trait]
pub trait RenditionSegmenter: Send + Sync {
    /// Segment `source` into `out_dir`, writing `index.m3u8` plus `.ts`
    /// segment files
    async fn segment(
        &self,
        source: &Path,
        rendition: Rendition,
        out_dir: &Path,
    ) -> Result<(), TranscodeError>;
}

/// ffmpeg-backed segmenter
pub struct VideoTranscoder {
    ffmpeg_path: String,
    segment_seconds: u32,
    timeout_seconds: u64,
}

impl VideoTranscoder {
    /// Build a transcoder from configuration
    pub fn new(config: &TranscoderConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            segment_seconds: config.segment_seconds,
            timeout_seconds: config.timeout_seconds,
        }
    }

    /// Strip the version banner, build configuration and stream metadata
    /// noise from ffmpeg stderr, keeping only meaningful error lines.
    fn filter_ffmpeg_stderr(stderr: &str) -> String {
        let dominated_prefixes = [
            "ffmpeg version",
            "  built with",
            "  configuration:",
            "  lib",
            "Input #",
            "  Metadata:",
            "  Duration:",
            "  Stream #",
            "      Metadata:",
            "Output #",
            "Stream mapping:",
            "Press [q]",
            "frame=",
            "size=",
        ];

        let meaningful: Vec<&str> = stderr
            .lines()
            .filter(|line| {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    return false;
                }
                !dominated_prefixes.iter().any(|p| line.starts_with(p) || trimmed.starts_with(p))
            })
            .collect();

        if meaningful.is_empty() {
            "unknown ffmpeg error (stderr was empty after filtering)".to_string()
        } else {
            meaningful.join("\n")
        }
    }
}

#[async_trait]
impl RenditionSegmenter for VideoTranscoder {
    async fn segment(
        &self,
        source: &Path,
        rendition: Rendition,
        out_dir: &Path,
    ) -> Result<(), TranscodeError> {
        let playlist_path = out_dir.join(PLAYLIST_NAME);
        let scale = format!("scale=-2:{}", rendition.label());
        let segment_time = self.segment_seconds.to_string();

        debug!("Running ffmpeg for rendition {}", rendition);

        // kill_on_drop: a timed-out ffmpeg must not keep running orphaned
        let ffmpeg_future = Command::new(&self.ffmpeg_path)
            .kill_on_drop(true)
            .args([
                "-y",
                "-i",
                source.to_str().unwrap_or_default(),
                "-vf",
                &scale,
                "-c:v",
                "h264",
                "-b:v",
                rendition.bitrate(),
                "-c:a",
                "aac",
                "-f",
                "hls",
                "-hls_time",
                &segment_time,
                "-hls_list_size",
                "0",
                playlist_path.to_str().unwrap_or_default(),
            ])
            .output();

        let timeout = std::time::Duration::from_secs(self.timeout_seconds);
        let output = tokio::select! {
            result = ffmpeg_future => {
                result.map_err(|e| TranscodeError::Spawn(e.to_string()))?
            },
            _ = tokio::time::sleep(timeout) => {
                return Err(TranscodeError::Timeout {
                    rendition,
                    seconds: self.timeout_seconds,
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let filtered = Self::filter_ffmpeg_stderr(&stderr);
            error!("Transcoding {} failed: {}", rendition, filtered);
            return Err(TranscodeError::TranscodeFailed {
                rendition,
                detail: filtered,
            });
        }

        Ok(())
    }
}

/// Storage key of a rendition's playlist
pub fn playlist_key(ingest_id: &str, rendition: Rendition) -> String {
    format!("hls/{}/{}/{}", ingest_id, rendition.label(), PLAYLIST_NAME)
}

/// Transcode the source into every rendition and upload the results.
///
/// Renditions run concurrently, each with its own temporary directory and
/// storage prefix. All of them are allowed to finish; if any failed, the
/// first failure is returned and the successful renditions' uploads are
/// left in place. Returns the renditions paired with their playlist keys,
/// in fixed rendition order.
pub async fn produce_renditions(
    segmenter: &dyn RenditionSegmenter,
    store: &dyn AssetStore,
    source: &Path,
    ingest_id: &str,
) -> Result<Vec<(Rendition, String)>, TranscodeError> {
    let results = future::join_all(
        Rendition::ALL
            .iter()
            .map(|&rendition| produce_one_rendition(segmenter, store, source, ingest_id, rendition)),
    )
    .await;

    results.into_iter().collect()
}

/// Segment and upload a single rendition
async fn produce_one_rendition(
    segmenter: &dyn RenditionSegmenter,
    store: &dyn AssetStore,
    source: &Path,
    ingest_id: &str,
    rendition: Rendition,
) -> Result<(Rendition, String), TranscodeError> {
    let work_dir = TempDir::new().map_err(|e| TranscodeError::Spawn(e.to_string()))?;

    segmenter.segment(source, rendition, work_dir.path()).await?;

    let uploaded = upload_rendition_dir(store, work_dir.path(), ingest_id, rendition).await?;
    info!(
        "Uploaded {} objects for rendition {} of ingest {}",
        uploaded, rendition, ingest_id
    );

    Ok((rendition, playlist_key(ingest_id, rendition)))
}

/// Upload every file the segmenter produced, returning the object count
async fn upload_rendition_dir(
    store: &dyn AssetStore,
    dir: &Path,
    ingest_id: &str,
    rendition: Rendition,
) -> Result<usize, TranscodeError> {
    let mut read_dir = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| TranscodeError::Spawn(e.to_string()))?;

    let mut count = 0;
    while let Some(dir_entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| TranscodeError::Spawn(e.to_string()))?
    {
        let path = dir_entry.path();
        if !path.is_file() {
            continue;
        }
        let file_name = dir_entry.file_name().to_string_lossy().to_string();
        let key = format!("hls/{}/{}/{}", ingest_id, rendition.label(), file_name);

        store.put_file(&key, &path).await?;
        count += 1;
    }

    Ok(count)
}
