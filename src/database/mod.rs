/*!
 * Relational catalog storage.
 *
 * SQLite-backed persistence for films, their HLS video variants, subtitle
 * lines and the global phrase dictionary. The [`Repository`] type is the
 * public entry point; the other submodules are its plumbing.
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;

pub use connection::{DatabaseConnection, DatabaseStats};
pub use models::{
    FilmRecord, NewFilmRecord, NewSubtitleRecord, PhraseKind, PhraseRecord, Rendition,
    SubtitleRecord, VideoVariantRecord,
};
pub use repository::Repository;
