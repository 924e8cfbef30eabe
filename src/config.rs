//! Arena configuration.

use crate::constants::DEFAULT_BLOCK_COUNT;
use crate::error::ArenaError;
use serde::{Deserialize, Serialize};

/// Where the free-list engine's metadata overhead is accounted for when a
/// backing region is sized.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataPlacement {
    /// The pool sizes regions itself and reserves page-rounded room for the
    /// engine's overhead.
    #[default]
    SelfManaged,
    /// The engine accounts for its own overhead; regions are sized for the
    /// request alone.
    Delegated,
}

/// Tunables for a [`ProtectedArena`](crate::ProtectedArena).
///
/// Every field has a default, so a partial JSON document is accepted:
///
/// ```
/// use wxarena::ArenaConfig;
///
/// let config = ArenaConfig::from_json(r#"{ "default_blocks": 4 }"#).unwrap();
/// assert_eq!(config.default_blocks, 4);
/// assert!(!config.enforce_on_init);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Allocation-granularity units in a pool's baseline region.
    pub default_blocks: usize,
    /// Enforcement flag value right after `init`.
    pub enforce_on_init: bool,
    /// How region sizing accounts for engine metadata.
    pub metadata: MetadataPlacement,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            default_blocks: DEFAULT_BLOCK_COUNT,
            enforce_on_init: false,
            metadata: MetadataPlacement::SelfManaged,
        }
    }
}

impl ArenaConfig {
    /// Parses and validates a JSON configuration document.
    ///
    /// # Errors
    /// Returns [`ArenaError::Config`] on malformed JSON and
    /// [`ArenaError::InvalidConfig`] on out-of-range values.
    pub fn from_json(text: &str) -> Result<Self, ArenaError> {
        let config: ArenaConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    /// Returns [`ArenaError::InvalidConfig`] if `default_blocks` is zero.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.default_blocks == 0 {
            return Err(ArenaError::InvalidConfig(
                "default_blocks must be at least 1".to_owned(),
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
        let config = ArenaConfig::default();
        assert_eq!(config.default_blocks, 15);
        assert_eq!(config.metadata, MetadataPlacement::SelfManaged);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_full() {
        let config = ArenaConfig::from_json(
            r#"{ "default_blocks": 2, "enforce_on_init": true, "metadata": "delegated" }"#,
        )
        .unwrap();
        assert_eq!(config.default_blocks, 2);
        assert!(config.enforce_on_init);
        assert_eq!(config.metadata, MetadataPlacement::Delegated);
    }

    #[test]
    fn test_from_json_rejects_zero_blocks() {
        let err = ArenaConfig::from_json(r#"{ "default_blocks": 0 }"#).unwrap_err();
        assert!(matches!(err, ArenaError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_json_malformed() {
        let err = ArenaConfig::from_json("{ default_blocks").unwrap_err();
        assert!(matches!(err, ArenaError::Config(_)));
    }

    #[test]
    fn test_roundtrip_through_json() {
        let config = ArenaConfig { default_blocks: 7, ..ArenaConfig::default() };
        let text = serde_json::to_string(&config).unwrap();
        assert_eq!(ArenaConfig::from_json(&text).unwrap(), config);
    }
}
