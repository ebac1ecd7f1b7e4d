/*!
 * Repository layer for catalog persistence.
 *
 * This module provides a high-level API for all database operations,
 * abstracting away the SQL details and providing type-safe access.
 * The single ingestion transaction (film + variants + subtitles) lives
 * here as well.
 */

use anyhow::Result;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::str::FromStr;

use super::connection::{DatabaseConnection, DatabaseStats};
use super::models::{
    FilmRecord, NewFilmRecord, NewSubtitleRecord, PhraseKind, PhraseRecord, Rendition,
    SubtitleRecord, VideoVariantRecord,
};

/// Repository for catalog operations
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        let db = DatabaseConnection::new_default()?;
        Ok(Self::new(db))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    // =========================================================================
    // Ingestion transaction
    // =========================================================================

    /// Persist a complete catalog entry in one transaction.
    ///
    /// Film, video variants and subtitle rows are all-or-nothing: any failure
    /// rolls the whole transaction back and no partial entry remains. Returns
    /// the new film's id.
    pub async fn persist_catalog_entry(
        &self,
        film: NewFilmRecord,
        variants: Vec<(Rendition, String)>,
        subtitles: Vec<NewSubtitleRecord>,
    ) -> Result<i64> {
        self.db
            .transaction_async(move |tx| {
                tx.execute(
                    r#"
                    INSERT INTO films (
                        title, description, imdb_rating, kinopoisk_rating, year, category,
                        poster_key, big_poster_key, title_image_key, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    "#,
                    params![
                        film.title,
                        film.description,
                        film.imdb_rating,
                        film.kinopoisk_rating,
                        film.year,
                        film.category,
                        film.poster_key,
                        film.big_poster_key,
                        film.title_image_key,
                        film.created_at,
                    ],
                )?;
                let film_id = tx.last_insert_rowid();

                for (rendition, manifest_key) in &variants {
                    tx.execute(
                        "INSERT INTO video_variants (film_id, rendition, manifest_key) VALUES (?1, ?2, ?3)",
                        params![film_id, rendition.label(), manifest_key],
                    )?;
                }

                for entry in &subtitles {
                    tx.execute(
                        r#"
                        INSERT INTO subtitles (
                            film_id, language, start_time, end_time,
                            start_seconds, end_seconds, text, translate
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                        "#,
                        params![
                            film_id,
                            entry.language,
                            entry.start_time,
                            entry.end_time,
                            entry.start_seconds,
                            entry.end_seconds,
                            entry.text,
                            entry.translate,
                        ],
                    )?;
                }

                debug!(
                    "Persisted catalog entry: film {} with {} variants and {} subtitle rows",
                    film_id,
                    variants.len(),
                    subtitles.len()
                );

                Ok(film_id)
            })
            .await
    }

    // =========================================================================
    // Film operations
    // =========================================================================

    /// Get a film by id
    pub async fn get_film(&self, film_id: i64) -> Result<Option<FilmRecord>> {
        self.db
            .execute_async(move |conn| {
                let result = conn
                    .query_row(
                        r#"
                        SELECT id, title, description, imdb_rating, kinopoisk_rating, year,
                               category, poster_key, big_poster_key, title_image_key, created_at
                        FROM films WHERE id = ?1
                        "#,
                        [film_id],
                        Self::map_film_row,
                    )
                    .optional()?;
                Ok(result)
            })
            .await
    }

    /// List all films, newest first
    pub async fn list_films(&self) -> Result<Vec<FilmRecord>> {
        self.db
            .execute_async(|conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, title, description, imdb_rating, kinopoisk_rating, year,
                           category, poster_key, big_poster_key, title_image_key, created_at
                    FROM films ORDER BY created_at DESC
                    "#,
                )?;
                let films = stmt
                    .query_map([], Self::map_film_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(films)
            })
            .await
    }

    /// Get all video variants belonging to a film
    pub async fn get_film_variants(&self, film_id: i64) -> Result<Vec<VideoVariantRecord>> {
        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, film_id, rendition, manifest_key FROM video_variants WHERE film_id = ?1",
                )?;
                let variants = stmt
                    .query_map([film_id], |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                let mut records = Vec::with_capacity(variants.len());
                for (id, film_id, rendition, manifest_key) in variants {
                    records.push(VideoVariantRecord {
                        id,
                        film_id,
                        rendition: Rendition::from_str(&rendition)?,
                        manifest_key,
                    });
                }
                Ok(records)
            })
            .await
    }

    /// Distinct subtitle languages available for a film
    pub async fn film_languages(&self, film_id: i64) -> Result<Vec<String>> {
        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT DISTINCT language FROM subtitles WHERE film_id = ?1 ORDER BY language",
                )?;
                let languages = stmt
                    .query_map([film_id], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<String>, _>>()?;
                Ok(languages)
            })
            .await
    }

    /// Delete a film row. Children cascade at the relational layer.
    ///
    /// Returns false when no row matched the id.
    pub async fn delete_film(&self, film_id: i64) -> Result<bool> {
        self.db
            .execute_async(move |conn| {
                let affected = conn.execute("DELETE FROM films WHERE id = ?1", [film_id])?;
                Ok(affected > 0)
            })
            .await
    }

    // =========================================================================
    // Subtitle operations
    // =========================================================================

    /// Subtitle rows for a film, optionally filtered by language,
    /// ordered by start_seconds
    pub async fn subtitles_for_film(
        &self,
        film_id: i64,
        language: Option<String>,
    ) -> Result<Vec<SubtitleRecord>> {
        self.db
            .execute_async(move |conn| {
                let mut rows = Vec::new();
                match language {
                    Some(lang) => {
                        let mut stmt = conn.prepare(
                            r#"
                            SELECT id, film_id, language, start_time, end_time, start_seconds,
                                   end_seconds, text, translate, ai_translate, ai_translate_comment
                            FROM subtitles WHERE film_id = ?1 AND language = ?2
                            ORDER BY start_seconds
                            "#,
                        )?;
                        let mapped = stmt
                            .query_map(params![film_id, lang], Self::map_subtitle_row)?
                            .collect::<std::result::Result<Vec<_>, _>>()?;
                        rows.extend(mapped);
                    }
                    None => {
                        let mut stmt = conn.prepare(
                            r#"
                            SELECT id, film_id, language, start_time, end_time, start_seconds,
                                   end_seconds, text, translate, ai_translate, ai_translate_comment
                            FROM subtitles WHERE film_id = ?1
                            ORDER BY language, start_seconds
                            "#,
                        )?;
                        let mapped = stmt
                            .query_map([film_id], Self::map_subtitle_row)?
                            .collect::<std::result::Result<Vec<_>, _>>()?;
                        rows.extend(mapped);
                    }
                }
                Ok(rows)
            })
            .await
    }

    /// Update the AI enrichment fields on a single subtitle row
    pub async fn update_ai_fields(
        &self,
        subtitle_id: i64,
        ai_translate: Option<String>,
        ai_translate_comment: Option<String>,
    ) -> Result<()> {
        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "UPDATE subtitles SET ai_translate = ?1, ai_translate_comment = ?2 WHERE id = ?3",
                    params![ai_translate, ai_translate_comment, subtitle_id],
                )?;
                Ok(())
            })
            .await
    }

    // =========================================================================
    // Phrase operations
    // =========================================================================

    /// Find a phrase by its content triple, or create it.
    ///
    /// Deduplication is content-based: re-running extraction over overlapping
    /// text reuses the existing row instead of creating a duplicate.
    pub async fn find_or_create_phrase(
        &self,
        original: String,
        translation: String,
        kind: PhraseKind,
    ) -> Result<i64> {
        self.db
            .execute_async(move |conn| Self::find_or_create_phrase_sync(conn, &original, &translation, kind))
            .await
    }

    /// Synchronous variant usable inside transactions
    fn find_or_create_phrase_sync(
        conn: &Connection,
        original: &str,
        translation: &str,
        kind: PhraseKind,
    ) -> Result<i64> {
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM phrases WHERE original = ?1 AND translation = ?2 AND kind = ?3",
                params![original, translation, kind.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(id);
        }

        conn.execute(
            "INSERT INTO phrases (original, translation, kind) VALUES (?1, ?2, ?3)",
            params![original, translation, kind.to_string()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Link a phrase to the subtitle line that produced it.
    ///
    /// The (subtitle, phrase) pair is unique; relinking is a no-op.
    pub async fn link_phrase(&self, subtitle_id: i64, phrase_id: i64) -> Result<()> {
        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO subtitle_phrases (subtitle_id, phrase_id) VALUES (?1, ?2)",
                    params![subtitle_id, phrase_id],
                )?;
                Ok(())
            })
            .await
    }

    /// All phrases linked to a subtitle line
    pub async fn phrases_for_subtitle(&self, subtitle_id: i64) -> Result<Vec<PhraseRecord>> {
        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT p.id, p.original, p.translation, p.kind
                    FROM phrases p
                    JOIN subtitle_phrases sp ON sp.phrase_id = p.id
                    WHERE sp.subtitle_id = ?1
                    ORDER BY p.id
                    "#,
                )?;
                let raw = stmt
                    .query_map([subtitle_id], |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                let mut phrases = Vec::with_capacity(raw.len());
                for (id, original, translation, kind) in raw {
                    phrases.push(PhraseRecord {
                        id,
                        original,
                        translation,
                        kind: PhraseKind::from_str(&kind)?,
                    });
                }
                Ok(phrases)
            })
            .await
    }

    /// The whole global phrase dictionary
    pub async fn list_phrases(&self) -> Result<Vec<PhraseRecord>> {
        self.db
            .execute_async(|conn| {
                let mut stmt =
                    conn.prepare("SELECT id, original, translation, kind FROM phrases ORDER BY id")?;
                let raw = stmt
                    .query_map([], |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                let mut phrases = Vec::with_capacity(raw.len());
                for (id, original, translation, kind) in raw {
                    phrases.push(PhraseRecord {
                        id,
                        original,
                        translation,
                        kind: PhraseKind::from_str(&kind)?,
                    });
                }
                Ok(phrases)
            })
            .await
    }

    /// Database statistics
    pub fn stats(&self) -> Result<DatabaseStats> {
        self.db.stats()
    }

    // =========================================================================
    // Row mappers
    // =========================================================================

    fn map_film_row(row: &Row<'_>) -> rusqlite::Result<FilmRecord> {
        Ok(FilmRecord {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            imdb_rating: row.get(3)?,
            kinopoisk_rating: row.get(4)?,
            year: row.get(5)?,
            category: row.get(6)?,
            poster_key: row.get(7)?,
            big_poster_key: row.get(8)?,
            title_image_key: row.get(9)?,
            created_at: row.get(10)?,
        })
    }

    fn map_subtitle_row(row: &Row<'_>) -> rusqlite::Result<SubtitleRecord> {
        Ok(SubtitleRecord {
            id: row.get(0)?,
            film_id: row.get(1)?,
            language: row.get(2)?,
            start_time: row.get(3)?,
            end_time: row.get(4)?,
            start_seconds: row.get(5)?,
            end_seconds: row.get(6)?,
            text: row.get(7)?,
            translate: row.get(8)?,
            ai_translate: row.get(9)?,
            ai_translate_comment: row.get(10)?,
        })
    }
}
