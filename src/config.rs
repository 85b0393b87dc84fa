//! Reader configuration

use crate::error::{Result, VolpkgError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default slice pattern inside a volume directory
pub const DEFAULT_PATTERN: &str = "*.tif";

/// Options for building virtual arrays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrayOptions {
    /// Decoded chunks kept in memory per array (0 disables caching)
    pub chunk_cache_capacity: usize,

    /// Upper bound on chunk loads in flight during async region reads
    pub max_concurrent_reads: usize,
}

impl Default for ArrayOptions {
    fn default() -> Self {
        Self {
            chunk_cache_capacity: 0,
            max_concurrent_reads: 8,
        }
    }
}

impl ArrayOptions {
    pub fn with_chunk_cache(mut self, capacity: usize) -> Self {
        self.chunk_cache_capacity = capacity;
        self
    }

    pub fn with_max_concurrent_reads(mut self, max: usize) -> Self {
        self.max_concurrent_reads = max;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_reads == 0 {
            return Err(VolpkgError::Configuration(
                "max_concurrent_reads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for reading volume packages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Slice pattern used inside every `volumes/*` directory
    pub volume_pattern: String,

    /// Array options applied to every volume
    pub array: ArrayOptions,

    /// Directory holding unpacked sample datasets
    pub sample_cache_dir: Option<PathBuf>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            volume_pattern: DEFAULT_PATTERN.to_string(),
            array: ArrayOptions::default(),
            sample_cache_dir: None,
        }
    }
}

impl ReaderConfig {
    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.volume_pattern.trim().is_empty() {
            return Err(VolpkgError::Configuration(
                "volume_pattern must not be empty".to_string(),
            ));
        }
        glob::Pattern::new(&self.volume_pattern)
            .map_err(|e| VolpkgError::InvalidPattern(format!("{}: {}", self.volume_pattern, e)))?;
        self.array.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ReaderConfig::default();
        assert_eq!(config.volume_pattern, "*.tif");
        assert_eq!(config.array.chunk_cache_capacity, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("reader.json");
        std::fs::write(
            &path,
            r#"{ "volume_pattern": "*/*.png", "array": { "chunk_cache_capacity": 16 } }"#,
        )
        .unwrap();

        let config = ReaderConfig::from_json_file(&path).unwrap();
        assert_eq!(config.volume_pattern, "*/*.png");
        assert_eq!(config.array.chunk_cache_capacity, 16);
        assert_eq!(config.array.max_concurrent_reads, 8);
        assert!(config.sample_cache_dir.is_none());
    }

    #[test]
    fn test_invalid_values() {
        let config = ReaderConfig {
            array: ArrayOptions::default().with_max_concurrent_reads(0),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(VolpkgError::Configuration(_))
        ));

        let config = ReaderConfig {
            volume_pattern: "[".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(VolpkgError::InvalidPattern(_))
        ));
    }
}
