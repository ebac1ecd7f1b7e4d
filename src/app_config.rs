use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::Path;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Object storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Video transcoder settings
    #[serde(default)]
    pub transcoder: TranscoderConfig,

    /// Phrase oracle settings
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Relational database settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Maximum start-time drift (in seconds) tolerated when aligning
    /// a translation track against the source track
    #[serde(default = "default_align_tolerance_seconds")]
    pub align_tolerance_seconds: u64,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Object storage (S3-compatible) configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    /// Service endpoint URL (e.g. a MinIO instance)
    #[serde(default = "default_storage_endpoint")]
    pub endpoint: String,

    /// Region name; MinIO accepts any value here
    #[serde(default = "default_storage_region")]
    pub region: String,

    /// Bucket that holds posters, playlists and segments
    #[serde(default = "default_storage_bucket")]
    pub bucket: String,

    /// Access key id
    #[serde(default = "String::new")]
    pub access_key_id: String,

    /// Secret access key
    #[serde(default = "String::new")]
    pub secret_access_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: default_storage_endpoint(),
            region: default_storage_region(),
            bucket: default_storage_bucket(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
        }
    }
}

/// FFmpeg transcoder configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranscoderConfig {
    /// Path to the ffmpeg binary
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// Target HLS segment duration in seconds
    #[serde(default = "default_segment_seconds")]
    pub segment_seconds: u32,

    /// Per-rendition transcode timeout in seconds
    #[serde(default = "default_transcode_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            segment_seconds: default_segment_seconds(),
            timeout_seconds: default_transcode_timeout_seconds(),
        }
    }
}

/// Phrase oracle (YandexGPT-compatible completion API) configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OracleConfig {
    /// Completion endpoint URL
    #[serde(default = "default_oracle_endpoint")]
    pub endpoint: String,

    /// API key for the service
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Cloud folder id used to build the model URI
    #[serde(default = "String::new")]
    pub folder_id: String,

    /// Model name (e.g. "yandexgpt-lite")
    #[serde(default = "default_oracle_model")]
    pub model: String,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum completion tokens per request
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds
    #[serde(default = "default_oracle_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: default_oracle_endpoint(),
            api_key: String::new(),
            folder_id: String::new(),
            model: default_oracle_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_oracle_timeout_seconds(),
        }
    }
}

/// SQLite database configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    /// Database file path; empty means the per-user default location
    #[serde(default = "String::new")]
    pub path: String,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_align_tolerance_seconds() -> u64 {
    1
}

fn default_storage_endpoint() -> String {
    "http://localhost:9000".to_string()
}

fn default_storage_region() -> String {
    "us-east-1".to_string()
}

fn default_storage_bucket() -> String {
    "kinolingo".to_string()
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_segment_seconds() -> u32 {
    20
}

fn default_transcode_timeout_seconds() -> u64 {
    1800
}

fn default_oracle_endpoint() -> String {
    "https://llm.api.cloud.yandex.net/foundationModels/v1/completion".to_string()
}

fn default_oracle_model() -> String {
    "yandexgpt-lite".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_oracle_timeout_seconds() -> u64 {
    60
}

impl Config {
    /// Load the configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            anyhow!("Failed to read config file {:?}: {}", path.as_ref(), e)
        })?;
        let config: Config = serde_json::from_str(&contents).map_err(|e| {
            anyhow!("Failed to parse config file {:?}: {}", path.as_ref(), e)
        })?;
        Ok(config)
    }

    /// Save the configuration to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config to JSON: {}", e))?;
        std::fs::write(path.as_ref(), json).map_err(|e| {
            anyhow!("Failed to write config to file {:?}: {}", path.as_ref(), e)
        })?;
        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.storage.bucket.is_empty() {
            return Err(anyhow!("Storage bucket name must not be empty"));
        }
        if self.transcoder.segment_seconds == 0 {
            return Err(anyhow!("Transcoder segment duration must be positive"));
        }
        if !(0.0..=1.0).contains(&self.oracle.temperature) {
            return Err(anyhow!(
                "Oracle temperature must be between 0.0 and 1.0, got {}",
                self.oracle.temperature
            ));
        }
        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            storage: StorageConfig::default(),
            transcoder: TranscoderConfig::default(),
            oracle: OracleConfig::default(),
            database: DatabaseConfig::default(),
            align_tolerance_seconds: default_align_tolerance_seconds(),
            log_level: LogLevel::default(),
        }
    }
}
