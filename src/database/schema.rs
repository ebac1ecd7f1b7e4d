/*!
 * Database schema definitions and migrations.
 *
 * This module contains the SQL schema for all catalog tables
 * and handles schema migrations for version upgrades.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    // Check current schema version
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        // Fresh database - create all tables
        info!("Initializing database schema v{}", SCHEMA_VERSION);
        create_all_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!(
            "Migrating database schema from v{} to v{}",
            current_version, SCHEMA_VERSION
        );
        migrate_schema(conn, current_version)?;
    } else {
        debug!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get the current schema version from the database
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )
        .context("Failed to check schema_version table existence")?;

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version in the database
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version, updated_at) VALUES (1, ?1, datetime('now'))",
        [version],
    )?;
    Ok(())
}

/// Create all database tables
fn create_all_tables(conn: &Connection) -> Result<()> {
    // Enable WAL mode for better concurrency and crash recovery
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    // Create schema version table
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )?;

    // Create films table
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS films (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT,
            imdb_rating REAL NOT NULL,
            kinopoisk_rating REAL NOT NULL,
            year INTEGER NOT NULL,
            category TEXT NOT NULL,
            poster_key TEXT NOT NULL,
            big_poster_key TEXT NOT NULL,
            title_image_key TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_films_created ON films(created_at);
        CREATE INDEX IF NOT EXISTS idx_films_category ON films(category);
        "#,
    )?;

    // Create video_variants table
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS video_variants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            film_id INTEGER NOT NULL REFERENCES films(id) ON DELETE CASCADE,
            rendition TEXT NOT NULL,
            manifest_key TEXT NOT NULL,
            UNIQUE(film_id, rendition)
        );

        CREATE INDEX IF NOT EXISTS idx_variants_film ON video_variants(film_id);
        "#,
    )?;

    // Create subtitles table
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS subtitles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            film_id INTEGER NOT NULL REFERENCES films(id) ON DELETE CASCADE,
            language TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            start_seconds INTEGER NOT NULL,
            end_seconds INTEGER NOT NULL,
            text TEXT NOT NULL,
            translate TEXT,
            ai_translate TEXT,
            ai_translate_comment TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_subtitles_film_lang
            ON subtitles(film_id, language, start_seconds);
        "#,
    )?;

    // Create phrases table; the unique triple backs find-or-create dedup
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS phrases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            original TEXT NOT NULL,
            translation TEXT NOT NULL,
            kind TEXT NOT NULL,
            UNIQUE(original, translation, kind)
        );
        "#,
    )?;

    // Create subtitle_phrases join table
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS subtitle_phrases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            subtitle_id INTEGER NOT NULL REFERENCES subtitles(id) ON DELETE CASCADE,
            phrase_id INTEGER NOT NULL REFERENCES phrases(id) ON DELETE CASCADE,
            UNIQUE(subtitle_id, phrase_id)
        );

        CREATE INDEX IF NOT EXISTS idx_subtitle_phrases_subtitle ON subtitle_phrases(subtitle_id);
        CREATE INDEX IF NOT EXISTS idx_subtitle_phrases_phrase ON subtitle_phrases(phrase_id);
        "#,
    )?;

    info!("Database schema created successfully");
    Ok(())
}

/// Migrate the schema from one version to another
fn migrate_schema(conn: &Connection, from_version: i32) -> Result<()> {
    let current = from_version;

    while current < SCHEMA_VERSION {
        match current {
            // Add migration steps here as the schema evolves
            _ => {
                return Err(anyhow::anyhow!(
                    "Unknown schema version: {}. Cannot migrate.",
                    current
                ));
            }
        }
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    info!("Schema migration completed to v{}", SCHEMA_VERSION);
    Ok(())
}
