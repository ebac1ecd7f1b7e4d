use std::fmt;
use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

// @module: SRT parsing and bilingual track alignment

// @const: SRT timestamp regex
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{2}):(\d{2}):(\d{2}),(\d{3}) --> (\d{2}):(\d{2}):(\d{2}),(\d{3})").unwrap()
});

// @struct: Single subtitle entry
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleEntry {
    // @field: Sequence number
    pub seq_num: usize,

    // @field: Start time in ms
    pub start_time_ms: u64,

    // @field: End time in ms
    pub end_time_ms: u64,

    // @field: Subtitle text
    pub text: String,
}

impl SubtitleEntry {
    /// Creates a new subtitle entry without validation
    pub fn new(seq_num: usize, start_time_ms: u64, end_time_ms: u64, text: String) -> Self {
        SubtitleEntry {
            seq_num,
            start_time_ms,
            end_time_ms,
            text,
        }
    }

    // @creates: Validated subtitle entry
    // @validates: Time range and non-empty text
    pub fn new_validated(
        seq_num: usize,
        start_time_ms: u64,
        end_time_ms: u64,
        text: String,
    ) -> Result<Self> {
        if end_time_ms <= start_time_ms {
            return Err(anyhow!(
                "Invalid time range: end time {} <= start time {}",
                end_time_ms,
                start_time_ms
            ));
        }

        let trimmed_text = text.trim();
        if trimmed_text.is_empty() {
            return Err(anyhow!("Empty subtitle text for entry {}", seq_num));
        }

        Ok(SubtitleEntry {
            seq_num,
            start_time_ms,
            end_time_ms,
            text: trimmed_text.to_string(),
        })
    }

    /// Parse an SRT timestamp (HH:MM:SS,mmm) to milliseconds
    pub fn parse_timestamp(timestamp: &str) -> Result<u64> {
        let parts: Vec<&str> = timestamp.split(&[':', ',', '.'][..]).collect();

        if parts.len() != 4 {
            return Err(anyhow!("Invalid timestamp format: {}", timestamp));
        }

        let hours: u64 = parts[0].parse().context("Failed to parse hours")?;
        let minutes: u64 = parts[1].parse().context("Failed to parse minutes")?;
        let seconds: u64 = parts[2].parse().context("Failed to parse seconds")?;
        let millis: u64 = parts[3].parse().context("Failed to parse milliseconds")?;

        if minutes >= 60 || seconds >= 60 || millis >= 1000 {
            return Err(anyhow!("Invalid time components in timestamp: {}", timestamp));
        }

        Ok(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
    }

    /// Start time as a whole number of seconds (milliseconds truncated)
    pub fn start_seconds(&self) -> u64 {
        self.start_time_ms / 1_000
    }

    /// End time as a whole number of seconds (milliseconds truncated)
    pub fn end_seconds(&self) -> u64 {
        self.end_time_ms / 1_000
    }

    /// Convert start time to formatted SRT timestamp
    pub fn format_start_time(&self) -> String {
        Self::format_timestamp(self.start_time_ms)
    }

    /// Convert end time to formatted SRT timestamp
    pub fn format_end_time(&self) -> String {
        Self::format_timestamp(self.end_time_ms)
    }

    /// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm)
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }
}

impl fmt::Display for SubtitleEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.seq_num)?;
        writeln!(f, "{} --> {}", self.format_start_time(), self.format_end_time())?;
        writeln!(f, "{}", self.text)?;
        writeln!(f)
    }
}

/// A parsed subtitle track with its language
#[derive(Debug)]
pub struct SubtitleTrack {
    /// Source filename
    pub source_file: PathBuf,

    /// List of subtitle entries, sorted by start time
    pub entries: Vec<SubtitleEntry>,

    /// Track language, e.g. "en" or "ru"
    pub language: String,
}

impl SubtitleTrack {
    /// Create an empty track
    pub fn new(source_file: PathBuf, language: String) -> Self {
        SubtitleTrack {
            source_file,
            entries: Vec::new(),
            language,
        }
    }

    /// Parse an SRT file into a track
    pub fn parse_srt_file<P: AsRef<Path>>(path: P, language: &str) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read subtitle file: {}", path.display()))?;

        let entries = Self::parse_srt_string(&content)?;
        debug!(
            "Parsed {} subtitle entries from {} ({})",
            entries.len(),
            path.display(),
            language
        );

        Ok(SubtitleTrack {
            source_file: path.to_path_buf(),
            entries,
            language: language.to_string(),
        })
    }

    /// Write the track back out as an SRT file
    pub fn write_to_srt<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let mut file = File::create(path)
            .with_context(|| format!("Failed to create subtitle file: {}", path.display()))?;

        for entry in &self.entries {
            write!(file, "{}", entry)?;
        }

        Ok(())
    }

    /// Parse SRT format string into subtitle entries.
    ///
    /// The parser is lenient: malformed entries are skipped with a warning,
    /// entries are re-sorted by start time and renumbered. An input that
    /// yields no valid entries at all is an error.
    pub fn parse_srt_string(content: &str) -> Result<Vec<SubtitleEntry>> {
        let mut entries = Vec::new();
        let lines = content.lines();

        // State variables for parsing
        let mut current_seq_num: Option<usize> = None;
        let mut current_start_time_ms: Option<u64> = None;
        let mut current_end_time_ms: Option<u64> = None;
        let mut current_text = String::new();
        let mut line_count = 0;

        let mut add_current_entry = |seq_num: usize, start_ms: u64, end_ms: u64, text: &str| {
            if !text.trim().is_empty() {
                match SubtitleEntry::new_validated(seq_num, start_ms, end_ms, text.trim().to_string()) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => warn!("Skipping invalid subtitle entry {}: {}", seq_num, e),
                }
            } else {
                warn!("Skipping empty subtitle entry {}", seq_num);
            }
        };

        for line in lines {
            line_count += 1;
            let trimmed = line.trim();

            // An empty line finalizes the current entry. State is reset even
            // when the cue carried no text, so an empty cue cannot swallow
            // the block that follows it.
            if trimmed.is_empty() {
                if let (Some(seq_num), Some(start_ms), Some(end_ms)) =
                    (current_seq_num, current_start_time_ms, current_end_time_ms)
                {
                    if !current_text.is_empty() {
                        add_current_entry(seq_num, start_ms, end_ms, &current_text);
                    } else {
                        warn!("Skipping empty subtitle entry {}", seq_num);
                    }
                }
                current_seq_num = None;
                current_start_time_ms = None;
                current_end_time_ms = None;
                current_text.clear();
                continue;
            }

            // Try to parse as sequence number (only at the start of an entry)
            if current_seq_num.is_none() && current_text.is_empty() {
                if let Ok(num) = trimmed.parse::<usize>() {
                    current_seq_num = Some(num);
                    continue;
                }
            }

            // Try to parse as timestamp
            if current_seq_num.is_some()
                && current_start_time_ms.is_none()
                && current_end_time_ms.is_none()
            {
                if let Some(caps) = TIMESTAMP_REGEX.captures(trimmed) {
                    match (
                        Self::parse_timestamp_to_ms(&caps, 1),
                        Self::parse_timestamp_to_ms(&caps, 5),
                    ) {
                        (Ok(start_ms), Ok(end_ms)) => {
                            current_start_time_ms = Some(start_ms);
                            current_end_time_ms = Some(end_ms);
                            continue;
                        }
                        _ => {
                            warn!("Invalid timestamp format at line {}: {}", line_count, trimmed);
                        }
                    }
                }
            }

            // With a sequence number and timestamps, this must be subtitle text
            if current_seq_num.is_some()
                && current_start_time_ms.is_some()
                && current_end_time_ms.is_some()
            {
                if !current_text.is_empty() {
                    current_text.push('\n');
                }
                current_text.push_str(trimmed);
            } else {
                warn!(
                    "Unexpected text at line {} before sequence number or timestamp: {}",
                    line_count, trimmed
                );
            }
        }

        // Add the last entry if there is one
        if let (Some(seq_num), Some(start_ms), Some(end_ms)) =
            (current_seq_num, current_start_time_ms, current_end_time_ms)
        {
            if !current_text.is_empty() {
                add_current_entry(seq_num, start_ms, end_ms, &current_text);
            }
        }

        if entries.is_empty() {
            warn!("No valid subtitle entries found in content");
            return Err(anyhow!("No valid subtitle entries were found in the SRT content"));
        }

        // Sort by start time to ensure correct order
        entries.sort_by_key(|entry| entry.start_time_ms);

        let mut overlap_count = 0;
        for i in 0..entries.len().saturating_sub(1) {
            if entries[i].end_time_ms > entries[i + 1].start_time_ms {
                overlap_count += 1;
            }
        }
        if overlap_count > 0 {
            warn!("Found {} overlapping subtitle entries", overlap_count);
        }

        // Renumber entries to ensure sequential order
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.seq_num = i + 1;
        }

        Ok(entries)
    }

    /// Parse timestamp capture group to milliseconds
    fn parse_timestamp_to_ms(caps: &regex::Captures, start_idx: usize) -> Result<u64> {
        let hours: u64 = caps
            .get(start_idx)
            .map_or(0, |m| m.as_str().parse().unwrap_or(0));
        let minutes: u64 = caps
            .get(start_idx + 1)
            .map_or(0, |m| m.as_str().parse().unwrap_or(0));
        let seconds: u64 = caps
            .get(start_idx + 2)
            .map_or(0, |m| m.as_str().parse().unwrap_or(0));
        let millis: u64 = caps
            .get(start_idx + 3)
            .map_or(0, |m| m.as_str().parse().unwrap_or(0));

        if minutes >= 60 || seconds >= 60 {
            return Err(anyhow!("Invalid time components in timestamp"));
        }

        Ok(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
    }
}

/// Re-time a translation track onto the source track's clock.
///
/// Source and translation subtitle files are produced independently and
/// their timecodes drift. For each source entry the translation entry with
/// the smallest absolute start-seconds difference strictly below
/// `tolerance_seconds` has its timecodes overwritten with the source
/// entry's. Ties go to the first translation entry encountered, so the
/// result is deterministic given input order. Translation entries with no
/// sufficiently close source entry keep their original timecodes.
///
/// Re-aligning an already-aligned track against the same source is a no-op.
pub fn align_tracks(
    source: &[SubtitleEntry],
    translation: &[SubtitleEntry],
    tolerance_seconds: u64,
) -> Vec<SubtitleEntry> {
    let mut aligned: Vec<SubtitleEntry> = translation.to_vec();
    let mut retimed = 0;

    for src in source {
        let mut closest_idx: Option<usize> = None;
        let mut min_diff = tolerance_seconds;

        for (j, candidate) in aligned.iter().enumerate() {
            let diff = src.start_seconds().abs_diff(candidate.start_seconds());
            if diff < min_diff {
                closest_idx = Some(j);
                min_diff = diff;
            }
        }

        if let Some(j) = closest_idx {
            if aligned[j].start_time_ms != src.start_time_ms
                || aligned[j].end_time_ms != src.end_time_ms
            {
                retimed += 1;
            }
            aligned[j].start_time_ms = src.start_time_ms;
            aligned[j].end_time_ms = src.end_time_ms;
        }
    }

    debug!(
        "Re-timed {}/{} translation entries within {}s tolerance",
        retimed,
        translation.len(),
        tolerance_seconds
    );

    aligned
}
