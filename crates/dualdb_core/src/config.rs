//! Store configuration.

use crate::error::{CoreError, CoreResult};

/// Default number of items per batch write call.
pub const DEFAULT_BATCH_WRITE_LIMIT: usize = 25;

/// Configuration for an [`EntityStore`](crate::EntityStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum items per physical batch write; larger batches are chunked.
    pub batch_write_limit: usize,

    /// Whether reads are strongly consistent unless a query says otherwise.
    pub consistent_read: bool,

    /// Prepended to every table and domain name.
    pub table_prefix: Option<String>,

    /// Row limit used by queries that set none.
    pub default_page_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_write_limit: DEFAULT_BATCH_WRITE_LIMIT,
            consistent_read: false,
            table_prefix: None,
            default_page_size: None,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the batch write chunk size.
    #[must_use]
    pub const fn batch_write_limit(mut self, limit: usize) -> Self {
        self.batch_write_limit = limit;
        self
    }

    /// Sets the default read consistency.
    #[must_use]
    pub const fn consistent_read(mut self, value: bool) -> Self {
        self.consistent_read = value;
        self
    }

    /// Sets the table name prefix.
    #[must_use]
    pub fn table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = Some(prefix.into());
        self
    }

    /// Sets the default page size.
    #[must_use]
    pub const fn default_page_size(mut self, size: usize) -> Self {
        self.default_page_size = Some(size);
        self
    }

    /// Checks the configuration for values no backend accepts.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a zero batch limit or page size.
    pub fn validate(&self) -> CoreResult<()> {
        if self.batch_write_limit == 0 {
            return Err(CoreError::validation("batch_write_limit must be at least 1"));
        }
        if self.default_page_size == Some(0) {
            return Err(CoreError::validation("default_page_size must be at least 1"));
        }
        Ok(())
    }

    /// Returns the physical name of a table.
    pub fn table_name(&self, table: &str) -> String {
        match &self.table_prefix {
            Some(prefix) => format!("{prefix}{table}"),
            None => table.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.batch_write_limit, 25);
        assert!(!config.consistent_read);
        assert!(config.validate().is_ok());
        assert_eq!(config.table_name("people"), "people");
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .batch_write_limit(10)
            .consistent_read(true)
            .table_prefix("test_")
            .default_page_size(50);

        assert_eq!(config.batch_write_limit, 10);
        assert!(config.consistent_read);
        assert_eq!(config.table_name("people"), "test_people");
        assert_eq!(config.default_page_size, Some(50));
    }

    #[test]
    fn zero_limits_are_rejected() {
        assert!(Config::new().batch_write_limit(0).validate().is_err());
        assert!(Config::new().default_page_size(0).validate().is_err());
    }
}
