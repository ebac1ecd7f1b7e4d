/*!
 * Database entity models.
 *
 * These structures map directly to database tables and provide
 * type-safe access to persisted catalog data.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality tier of a transcoded video variant
///
/// The set is closed: every film is transcoded into exactly these
/// renditions, each with a fixed target bitrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rendition {
    /// 1080p @ 3000k
    P1080,
    /// 720p @ 1500k
    P720,
    /// 480p @ 800k
    P480,
}

impl Rendition {
    /// All renditions produced for a film, highest quality first
    pub const ALL: [Rendition; 3] = [Rendition::P1080, Rendition::P720, Rendition::P480];

    /// Resolution label stored in the database and used in storage keys
    pub fn label(&self) -> &'static str {
        match self {
            Rendition::P1080 => "1080",
            Rendition::P720 => "720",
            Rendition::P480 => "480",
        }
    }

    /// Target video bitrate passed to the transcoder
    pub fn bitrate(&self) -> &'static str {
        match self {
            Rendition::P1080 => "3000k",
            Rendition::P720 => "1500k",
            Rendition::P480 => "800k",
        }
    }
}

impl fmt::Display for Rendition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}p", self.label())
    }
}

impl std::str::FromStr for Rendition {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_end_matches('p') {
            "1080" => Ok(Rendition::P1080),
            "720" => Ok(Rendition::P720),
            "480" => Ok(Rendition::P480),
            _ => Err(anyhow::anyhow!("Invalid rendition: {}", s)),
        }
    }
}

/// Kind of an extracted phrase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhraseKind {
    /// Idiomatic expression
    Idiom,
    /// Phrasal verb
    PhrasalVerb,
}

impl fmt::Display for PhraseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhraseKind::Idiom => write!(f, "idiom"),
            PhraseKind::PhrasalVerb => write!(f, "phrasal_verb"),
        }
    }
}

impl std::str::FromStr for PhraseKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "idiom" => Ok(PhraseKind::Idiom),
            "phrasal_verb" => Ok(PhraseKind::PhrasalVerb),
            _ => Err(anyhow::anyhow!("Invalid phrase kind: {}", s)),
        }
    }
}

/// A catalog film row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilmRecord {
    /// Row id
    pub id: i64,
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
    /// Storage key of the poster image
    pub poster_key: String,
    /// Storage key of the large poster image
    pub big_poster_key: String,
    /// Storage key of the title image
    pub title_image_key: String,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}

/// A transcoded rendition row belonging to a film
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoVariantRecord {
    /// Row id
    pub id: i64,
    /// Owning film
    pub film_id: i64,
    /// Rendition quality tier
    pub rendition: Rendition,
    /// Storage key of the rendition's manifest
    pub manifest_key: String,
}

/// A persisted subtitle line
///
/// `start_seconds`/`end_seconds` are the sole sort and comparison keys;
/// the display strings keep the original millisecond precision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleRecord {
    /// Row id
    pub id: i64,
    /// Owning film
    pub film_id: i64,
    /// Language tag ("en", "ru")
    pub language: String,
    /// Display start timecode (HH:MM:SS,mmm)
    pub start_time: String,
    /// Display end timecode (HH:MM:SS,mmm)
    pub end_time: String,
    /// Start time truncated to whole seconds
    pub start_seconds: i64,
    /// End time truncated to whole seconds
    pub end_seconds: i64,
    /// Raw subtitle text
    pub text: String,
    /// Denormalized cross-language text from the aligned counterpart track
    pub translate: Option<String>,
    /// Alternative machine translation from the enrichment oracle
    pub ai_translate: Option<String>,
    /// Explanatory comment for idiomatic or cultural content
    pub ai_translate_comment: Option<String>,
}

/// A subtitle row prepared for insertion (no id yet)
#[derive(Debug, Clone)]
pub struct NewSubtitleRecord {
    /// Language tag
    pub language: String,
    /// Display start timecode
    pub start_time: String,
    /// Display end timecode
    pub end_time: String,
    /// Start time in whole seconds
    pub start_seconds: i64,
    /// End time in whole seconds
    pub end_seconds: i64,
    /// Raw subtitle text
    pub text: String,
    /// Denormalized cross-language text
    pub translate: Option<String>,
}

/// A film row prepared for insertion (no id yet)
#[derive(Debug, Clone)]
pub struct NewFilmRecord {
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
    /// Storage key of the poster image
    pub poster_key: String,
    /// Storage key of the large poster image
    pub big_poster_key: String,
    /// Storage key of the title image
    pub title_image_key: String,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}

/// A globally deduplicated phrase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhraseRecord {
    /// Row id
    pub id: i64,
    /// Source-language phrase
    pub original: String,
    /// Translation of the phrase
    pub translation: String,
    /// Idiom or phrasal verb
    pub kind: PhraseKind,
}
