//! # Store Configuration
//!
//! Tunables read once at startup, usually from a TOML file:
//!
//! ```toml
//! chunk_bytes = 16384
//! initial_entity_capacity = 4096
//! ```
//!
//! Missing keys fall back to their defaults. Unknown keys are rejected.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ecs::{EcsError, EcsResult, CHUNK_SIZE};

/// Default number of entity slots reserved up front.
pub const DEFAULT_ENTITY_CAPACITY: usize = 1024;

/// Configuration of a [`Store`](crate::Store).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Byte budget of one chunk.
    pub chunk_bytes: usize,
    /// Entity slots and location records reserved at construction.
    pub initial_entity_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            chunk_bytes: CHUNK_SIZE,
            initial_entity_capacity: DEFAULT_ENTITY_CAPACITY,
        }
    }
}

impl StoreConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] if the document does not parse or fails
    /// [`validate`](Self::validate).
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|err| EcsError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        tracing::debug!(
            chunk_bytes = config.chunk_bytes,
            initial_entity_capacity = config.initial_entity_capacity,
            "loaded store config"
        );
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] if the file cannot be read or its content
    /// is rejected by [`from_toml_str`](Self::from_toml_str).
    pub fn from_toml_file(path: impl AsRef<Path>) -> EcsResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|err| EcsError::InvalidConfig(format!("{}: {err}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Checks the values are usable.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] if `chunk_bytes` is zero.
    pub fn validate(&self) -> EcsResult<()> {
        if self.chunk_bytes == 0 {
            return Err(EcsError::InvalidConfig(
                "chunk_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.chunk_bytes, 16 * 1024);
        assert_eq!(config.initial_entity_capacity, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = StoreConfig::from_toml_str("chunk_bytes = 4096").unwrap();
        assert_eq!(config.chunk_bytes, 4096);
        assert_eq!(config.initial_entity_capacity, DEFAULT_ENTITY_CAPACITY);

        let empty = StoreConfig::from_toml_str("").unwrap();
        assert_eq!(empty, StoreConfig::default());
    }

    #[test]
    fn test_rejects_zero_chunk() {
        let err = StoreConfig::from_toml_str("chunk_bytes = 0").unwrap_err();
        assert!(matches!(err, EcsError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(StoreConfig::from_toml_str("chunk_size = 10").is_err());
    }

    #[test]
    fn test_rejects_wrong_type() {
        assert!(StoreConfig::from_toml_str("chunk_bytes = \"big\"").is_err());
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("strata_config_{}.toml", std::process::id()));
        std::fs::write(&path, "initial_entity_capacity = 8\n").unwrap();
        let config = StoreConfig::from_toml_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.initial_entity_capacity, 8);

        let missing = StoreConfig::from_toml_file(&path).unwrap_err();
        assert!(missing.to_string().contains("strata_config_"));
    }

    #[test]
    fn test_serializes_back() {
        let text = toml::to_string(&StoreConfig::default()).unwrap();
        assert_eq!(StoreConfig::from_toml_str(&text).unwrap(), StoreConfig::default());
    }
}
