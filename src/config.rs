//! Configuration for filter requests
//!
//! Provides a builder pattern for the pagination bounds applied to every
//! incoming request.

use serde::Deserialize;

/// Default page size when the caller gives none (or a non-positive one)
pub const DEFAULT_LIMIT: i64 = 20;

/// Upper bound for any requested page size
pub const MAX_LIMIT: i64 = 100;

/// Offset used when the caller gives none (or a negative one)
pub const DEFAULT_OFFSET: i64 = 0;

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

fn default_max_limit() -> i64 {
    MAX_LIMIT
}

/// Pagination bounds for filter requests
#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    /// Page size used when the request has none
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    /// Largest page size a request may ask for
    #[serde(default = "default_max_limit")]
    pub max_limit: i64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }
}

impl FilterConfig {
    /// Create a new configuration builder
    pub fn builder() -> FilterConfigBuilder {
        FilterConfigBuilder::new()
    }

    /// Clamp a requested limit: missing or non-positive falls back to the
    /// default, anything above the maximum is capped.
    pub fn clamp_limit(&self, limit: Option<i64>) -> i64 {
        match limit {
            Some(l) if l > 0 => l.min(self.max_limit),
            _ => self.default_limit,
        }
    }

    /// Clamp a requested offset to be non-negative
    pub fn clamp_offset(&self, offset: Option<i64>) -> i64 {
        offset.unwrap_or(DEFAULT_OFFSET).max(0)
    }
}

/// Builder for FilterConfig
#[derive(Debug)]
pub struct FilterConfigBuilder {
    default_limit: i64,
    max_limit: i64,
}

impl Default for FilterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterConfigBuilder {
    pub fn new() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }

    /// Set the default page size (default: 20)
    pub fn default_limit(mut self, limit: i64) -> Self {
        self.default_limit = limit;
        self
    }

    /// Set the maximum page size (default: 100)
    pub fn max_limit(mut self, limit: i64) -> Self {
        self.max_limit = limit;
        self
    }

    /// Build the configuration
    ///
    /// A default larger than the maximum is lowered to the maximum.
    pub fn build(self) -> FilterConfig {
        let max_limit = self.max_limit.max(1);
        FilterConfig {
            default_limit: self.default_limit.clamp(1, max_limit),
            max_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Defaults
    // =========================================================================

    #[test]
    fn test_default_config() {
        let config = FilterConfig::builder().build();
        assert_eq!(config.default_limit, 20);
        assert_eq!(config.max_limit, 100);

        let config = FilterConfig::default();
        assert_eq!(config.default_limit, 20);
        assert_eq!(config.max_limit, 100);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: FilterConfig = serde_json::from_str(r#"{"max_limit": 50}"#).unwrap();
        assert_eq!(config.default_limit, 20);
        assert_eq!(config.max_limit, 50);
    }

    // =========================================================================
    // Builder
    // =========================================================================

    #[test]
    fn test_custom_limits() {
        let config = FilterConfig::builder()
            .default_limit(10)
            .max_limit(40)
            .build();
        assert_eq!(config.default_limit, 10);
        assert_eq!(config.max_limit, 40);
    }

    #[test]
    fn test_default_above_max_is_lowered() {
        let config = FilterConfig::builder()
            .default_limit(500)
            .max_limit(50)
            .build();
        assert_eq!(config.default_limit, 50);
    }

    // =========================================================================
    // Clamping
    // =========================================================================

    #[test]
    fn test_clamp_limit() {
        let config = FilterConfig::default();
        assert_eq!(config.clamp_limit(None), 20);
        assert_eq!(config.clamp_limit(Some(0)), 20);
        assert_eq!(config.clamp_limit(Some(-5)), 20);
        assert_eq!(config.clamp_limit(Some(35)), 35);
        assert_eq!(config.clamp_limit(Some(1000)), 100);
    }

    #[test]
    fn test_clamp_offset() {
        let config = FilterConfig::default();
        assert_eq!(config.clamp_offset(None), 0);
        assert_eq!(config.clamp_offset(Some(-1)), 0);
        assert_eq!(config.clamp_offset(Some(40)), 40);
    }
}
