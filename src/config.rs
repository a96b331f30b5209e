//! Configuration for archive sessions.
//!
//! This module provides [`SessionConfig`] for controlling buffer sizes,
//! safety limits and validation strictness of a session and its decoder.

use crate::{Error, Result};

/// Default size of the caller-side read buffer used by helpers (16 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 16 * 1024;

/// Default size of the buffered reader in front of the container file.
pub const DEFAULT_IO_BUFFER_SIZE: usize = 10 * 1024;

/// Configuration for an archive session.
///
/// # Example
///
/// ```rust
/// use unarchive::SessionConfig;
///
/// // Default configuration (16 KiB reads, checksums verified)
/// let config = SessionConfig::default();
///
/// // Custom configuration for untrusted input
/// let config = SessionConfig::new()
///     .max_entries(10_000)
///     .max_entry_size(512 * 1024 * 1024)
///     .read_buffer_size(64 * 1024);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Buffer size used by helpers that allocate their own read buffer.
    ///
    /// Callers that pass their own buffer to `Entry::read` are not affected.
    /// Default: 16 KiB.
    pub read_buffer_size: usize,

    /// Capacity of the buffered reader wrapping the container file.
    ///
    /// Default: 10 KiB.
    pub io_buffer_size: usize,

    /// Maximum number of entries a session will enumerate.
    ///
    /// Provides protection against archives with excessive entry counts.
    /// Default: 1,000,000.
    pub max_entries: usize,

    /// Maximum payload size of a single entry.
    ///
    /// Entries declaring or delivering more than this fail with
    /// `ResourceLimitExceeded`. Default: unlimited.
    pub max_entry_size: Option<u64>,

    /// Verify the checksum of every tar header block.
    ///
    /// Default: true.
    pub verify_checksums: bool,

    /// Require the bytes delivered for an entry to match its declared size.
    /// Entries whose size is unknown are not checked.
    ///
    /// Default: true.
    pub strict_sizes: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            io_buffer_size: DEFAULT_IO_BUFFER_SIZE,
            max_entries: 1_000_000,
            max_entry_size: None,
            verify_checksums: true,
            strict_sizes: true,
        }
    }
}

impl SessionConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration with small buffers for constrained environments.
    pub fn low_memory() -> Self {
        Self {
            read_buffer_size: 4 * 1024,
            io_buffer_size: 4 * 1024,
            max_entries: 100_000,
            ..Self::default()
        }
    }

    /// Creates a configuration with large buffers for better throughput.
    pub fn high_throughput() -> Self {
        Self {
            read_buffer_size: 256 * 1024,
            io_buffer_size: 128 * 1024,
            max_entries: 10_000_000,
            ..Self::default()
        }
    }

    /// Sets the helper read buffer size.
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Sets the container reader buffer size.
    pub fn io_buffer_size(mut self, size: usize) -> Self {
        self.io_buffer_size = size;
        self
    }

    /// Sets the maximum number of entries.
    pub fn max_entries(mut self, count: usize) -> Self {
        self.max_entries = count;
        self
    }

    /// Sets the maximum payload size of a single entry.
    pub fn max_entry_size(mut self, size: u64) -> Self {
        self.max_entry_size = Some(size);
        self
    }

    /// Enables or disables header checksum verification.
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Enables or disables the declared-size check on entry payloads.
    pub fn strict_sizes(mut self, strict: bool) -> Self {
        self.strict_sizes = strict;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.read_buffer_size == 0 {
            return Err(Error::InvalidConfig(
                "read_buffer_size must be greater than 0".into(),
            ));
        }

        if self.io_buffer_size == 0 {
            return Err(Error::InvalidConfig(
                "io_buffer_size must be greater than 0".into(),
            ));
        }

        if self.max_entries == 0 {
            return Err(Error::InvalidConfig(
                "max_entries must be greater than 0".into(),
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
        let config = SessionConfig::default();
        assert_eq!(config.read_buffer_size, 16 * 1024);
        assert_eq!(config.io_buffer_size, 10 * 1024);
        assert!(config.verify_checksums);
        assert!(config.strict_sizes);
        assert!(config.max_entry_size.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        let low = SessionConfig::low_memory();
        let high = SessionConfig::high_throughput();
        assert!(low.read_buffer_size < high.read_buffer_size);
        assert!(low.validate().is_ok());
        assert!(high.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::new()
            .max_entries(3)
            .max_entry_size(1024)
            .verify_checksums(false)
            .strict_sizes(false);
        assert_eq!(config.max_entries, 3);
        assert_eq!(config.max_entry_size, Some(1024));
        assert!(!config.verify_checksums);
        assert!(!config.strict_sizes);
    }

    #[test]
    fn test_invalid() {
        let err = SessionConfig::new().read_buffer_size(0).validate().unwrap_err();
        assert!(err.to_string().contains("read_buffer_size"));

        let err = SessionConfig::new().io_buffer_size(0).validate().unwrap_err();
        assert!(err.to_string().contains("io_buffer_size"));

        let err = SessionConfig::new().max_entries(0).validate().unwrap_err();
        assert!(err.to_string().contains("max_entries"));
    }
}
