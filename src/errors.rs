/*!
 * Error types for the kinolingo pipeline.
 *
 * This module contains custom error types for different parts of the
 * ingestion pipeline, using the thiserror crate for ergonomic error
 * definitions.
 */

use std::path::PathBuf;
use thiserror::Error;

use crate::database::models::Rendition;

/// Errors that can occur when talking to the object store
#[derive(Error, Debug)]
pub enum StorageError {
    /// Error when uploading an object fails
    #[error("Failed to store object '{key}': {detail}")]
    PutFailed {
        /// Storage key of the object
        key: String,
        /// Underlying error message
        detail: String,
    },

    /// Error when downloading an object fails
    #[error("Failed to read object '{key}': {detail}")]
    GetFailed {
        /// Storage key of the object
        key: String,
        /// Underlying error message
        detail: String,
    },

    /// Error when deleting an object fails
    #[error("Failed to delete object '{key}': {detail}")]
    DeleteFailed {
        /// Storage key of the object
        key: String,
        /// Underlying error message
        detail: String,
    },

    /// Object does not exist in the store
    #[error("Object not found: {0}")]
    NotFound(String),
}

/// Errors that can occur while transcoding a source video into a rendition
#[derive(Error, Debug)]
pub enum TranscodeError {
    /// The transcoder process could not be started at all
    #[error("Failed to spawn transcoder process: {0}")]
    Spawn(String),

    /// The transcoder exited with a non-zero status
    #[error("Transcoding failed for rendition {rendition}: {detail}")]
    TranscodeFailed {
        /// Rendition that failed
        rendition: Rendition,
        /// Filtered stderr from the transcoder
        detail: String,
    },

    /// The transcoder exceeded its time budget
    #[error("Transcoding timed out for rendition {rendition} after {seconds}s")]
    Timeout {
        /// Rendition that timed out
        rendition: Rendition,
        /// Configured timeout in seconds
        seconds: u64,
    },

    /// A produced segment or manifest could not be uploaded
    #[error("Failed to upload rendition output: {0}")]
    Upload(#[from] StorageError),
}

/// Errors that can occur when calling the enrichment oracle
///
/// All of these are recoverable: the extractor retries a bounded number of
/// times and then degrades to fallback stubs.
#[derive(Error, Debug)]
pub enum OracleError {
    /// Error when making the API request fails (network, timeout)
    #[error("Oracle request failed: {0}")]
    RequestFailed(String),

    /// Error returned by the API itself
    #[error("Oracle responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// The completion text did not contain a usable JSON array
    #[error("Malformed oracle response: {0}")]
    MalformedResponse(String),

    /// The API returned a response with no completion text at all
    #[error("Oracle returned an empty completion")]
    EmptyCompletion,
}

/// Fatal errors for a film ingestion or deletion
#[derive(Error, Debug)]
pub enum IngestError {
    /// Poster file with an extension outside the supported set
    #[error("Unsupported image format '{0}'. Only jpg, jpeg, webp, and png are allowed")]
    UnsupportedImageFormat(String),

    /// An input file referenced by the ingestion request does not exist
    #[error("Input asset not found: {0}")]
    MissingAsset(PathBuf),

    /// A rendition failed to transcode; the whole ingestion is aborted
    #[error("Transcode error: {0}")]
    Transcode(#[from] TranscodeError),

    /// Poster upload failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A subtitle file could not be parsed into any entries
    #[error("Subtitle error: {0}")]
    Subtitle(String),

    /// Relational write failure; the transaction is rolled back
    #[error("Database error: {0}")]
    Database(String),

    /// Deletion target does not exist
    #[error("Film not found: {0}")]
    FilmNotFound(i64),
}

impl From<anyhow::Error> for IngestError {
    fn from(error: anyhow::Error) -> Self {
        Self::Database(error.to_string())
    }
}
