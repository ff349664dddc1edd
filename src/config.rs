use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub version: u32,
    pub storage: StorageConfig,
    pub http: HttpConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&contents).with_context(|| "Failed to parse config TOML")
    }
}

/// Where records, audio files and the genre catalog live
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub tracks_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub genres_file: PathBuf,
}

impl StorageConfig {
    /// Conventional layout below a single data directory
    pub fn under(root: &Path) -> Self {
        Self {
            tracks_dir: root.join("tracks"),
            uploads_dir: root.join("uploads"),
            genres_file: root.join("genres.json"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    /// bytes
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            allowed_mime_types: default_allowed_mime_types(),
        }
    }
}

fn default_max_file_size() -> usize {
    10 * 1024 * 1024
}

fn default_allowed_mime_types() -> Vec<String> {
    ["audio/mpeg", "audio/mp3", "audio/wav", "audio/x-wav"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_limit: default_max_limit(),
        }
    }
}

fn default_max_limit() -> u32 {
    100
}
