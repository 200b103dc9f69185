//! Changelog configuration.

use crate::error::{ChangelogError, ChangelogResult};

/// Default entries per segment before rotation.
const DEFAULT_ROTATE_INTERVAL: u64 = 100_000;

/// Default segment filename prefix.
const DEFAULT_PREFIX: &str = "changelog";

/// Configuration for opening a changelog.
#[derive(Debug, Clone)]
pub struct Config {
    /// Entries per segment; a fresh segment is opened once the active one
    /// holds this many records.
    pub rotate_interval: u64,

    /// Filename prefix for new segments.
    pub prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rotate_interval: DEFAULT_ROTATE_INTERVAL,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of entries per segment.
    #[must_use]
    pub fn rotate_interval(mut self, entries: u64) -> Self {
        self.rotate_interval = entries;
        self
    }

    /// Sets the segment filename prefix.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ChangelogError::InvalidArgument`] if `rotate_interval` is
    /// zero, or if the prefix is empty or contains `_` (the separator used
    /// by segment filenames).
    pub fn validate(&self) -> ChangelogResult<()> {
        if self.rotate_interval == 0 {
            return Err(ChangelogError::invalid_argument(
                "rotate_interval must be positive",
            ));
        }
        if self.prefix.is_empty() || self.prefix.contains('_') {
            return Err(ChangelogError::invalid_argument(format!(
                "segment prefix {:?} must be non-empty and free of '_'",
                self.prefix
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.prefix, "changelog");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new().rotate_interval(5).prefix("log");
        assert_eq!(config.rotate_interval, 5);
        assert_eq!(config.prefix, "log");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_rotate_interval_rejected() {
        let result = Config::new().rotate_interval(0).validate();
        assert!(matches!(result, Err(ChangelogError::InvalidArgument { .. })));
    }

    #[test]
    fn underscore_prefix_rejected() {
        let result = Config::new().prefix("raft_log").validate();
        assert!(matches!(result, Err(ChangelogError::InvalidArgument { .. })));
    }
}
