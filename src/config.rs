//! Engine configuration with environment overrides.

use crate::digits::Alphabet;
use crate::error::{Result, TranscryptError};
use crate::matcher::{default_workers, DEFAULT_CHUNK_SIZE};
use std::env;
use std::path::PathBuf;

pub const ENV_DATA_DIR: &str = "TRANSCRYPT_DATA_DIR";
pub const ENV_WORKERS: &str = "TRANSCRYPT_WORKERS";
pub const ENV_CHUNK_SIZE: &str = "TRANSCRYPT_CHUNK_SIZE";

/// Where the digit files live and how scans are parallelized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    pub alphabet: Alphabet,
    pub workers: usize,
    pub chunk_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            alphabet: Alphabet::default(),
            workers: default_workers(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// `~/.tcrypt/data`, or `.tcrypt/data` when no home directory is set
pub fn default_data_dir() -> PathBuf {
    env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(".tcrypt")
        .join("data")
}

impl EngineConfig {
    /// Defaults overridden by `TRANSCRYPT_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|name| env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(workers) = lookup(ENV_WORKERS) {
            self.workers = parse_count(ENV_WORKERS, &workers)?;
        }
        if let Some(chunk) = lookup(ENV_CHUNK_SIZE) {
            self.chunk_size = parse_count(ENV_CHUNK_SIZE, &chunk)?;
        }
        Ok(self)
    }
}

fn parse_count(name: &str, value: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(TranscryptError::InvalidConfig(format!(
            "{} must be a positive integer, got {:?}",
            name, value
        ))),
    }
}
