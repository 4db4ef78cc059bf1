//! Tracker configuration

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::id::{IdAllocator, SequentialAllocator, UuidV7Allocator};
use crate::{Error, Result};

/// Default number of attempts for a conditional write under contention.
pub const DEFAULT_CONFLICT_RETRIES: u32 = 16;

/// Tracker configuration.
///
/// Every field has a default, so a partial JSON object is a valid config:
///
/// ```rust
/// use moea_tracker::TrackerConfig;
///
/// let config = TrackerConfig::from_json(r#"{"conflictRetries": 32}"#)?;
/// assert_eq!(config.conflict_retries, 32);
/// assert!(config.id_prefix.is_none());
/// # Ok::<(), moea_tracker::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct TrackerConfig {
    /// Attempts for a result write that keeps losing compare-and-swap races.
    pub conflict_retries: u32,
    /// Pre-allocated documents per collection (in-memory store only).
    pub initial_capacity: usize,
    /// Use deterministic `<prefix>-<counter>` ids instead of UUIDv7.
    pub id_prefix: Option<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
            initial_capacity: 0,
            id_prefix: None,
        }
    }
}

impl TrackerConfig {
    /// Parse and validate a JSON config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] for malformed JSON or unknown fields,
    /// [`Error::Validation`] for invalid values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `conflict_retries` is zero or
    /// `id_prefix` is blank.
    pub fn validate(&self) -> Result<()> {
        if self.conflict_retries == 0 {
            return Err(Error::Validation("conflictRetries must be at least 1".into()));
        }
        if self.id_prefix.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(Error::Validation("idPrefix must not be blank".into()));
        }
        Ok(())
    }

    pub(crate) fn id_allocator(&self) -> Arc<dyn IdAllocator> {
        match &self.id_prefix {
            Some(prefix) => Arc::new(SequentialAllocator::new(prefix.clone())),
            None => Arc::new(UuidV7Allocator),
        }
    }
}
