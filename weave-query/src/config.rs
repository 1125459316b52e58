//! Engine configuration parsed from TOML.
//!
//! ```toml
//! [server]
//! base_url = "${PUBLIC_URL}/api"
//!
//! [pagination]
//! default_page_size = 10
//! max_page_size = 100
//! default_indirect_page_size = 5
//!
//! [resolver]
//! max_concurrency = 16
//! ```
//!
//! `${VAR}` references are expanded from the environment before parsing;
//! unset variables are left as written.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Link building.
    #[serde(default)]
    pub server: ServerConfig,

    /// Page size limits.
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Resolution engine settings.
    #[serde(default)]
    pub resolver: ResolverConfig,
}

impl EngineConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> QueryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            QueryError::configuration(format!("cannot read {}: {}", path.display(), e))
                .with_source(e)
        })?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> QueryResult<Self> {
        let expanded = expand_env_vars(content);

        let config: Self = toml::from_str(&expanded)
            .map_err(|e| QueryError::configuration(e.to_string()).with_source(e))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the public base URL used for links.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.server.base_url = base_url.into();
        self
    }

    /// Check page sizes and concurrency limits.
    pub fn validate(&self) -> QueryResult<()> {
        let p = &self.pagination;
        if p.default_page_size == 0 || p.max_page_size == 0 || p.default_indirect_page_size == 0 {
            return Err(QueryError::configuration("page sizes must be at least 1"));
        }
        if p.default_page_size > p.max_page_size {
            return Err(QueryError::configuration(format!(
                "default_page_size {} exceeds max_page_size {}",
                p.default_page_size, p.max_page_size
            )));
        }
        if p.default_indirect_page_size > p.max_page_size {
            return Err(QueryError::configuration(format!(
                "default_indirect_page_size {} exceeds max_page_size {}",
                p.default_indirect_page_size, p.max_page_size
            )));
        }
        if self.resolver.max_concurrency == 0 {
            return Err(QueryError::configuration("max_concurrency must be at least 1"));
        }
        Ok(())
    }
}

/// Server link settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Prefix for every generated link, without a trailing slash.
    #[serde(default)]
    pub base_url: String,
}

/// Page size settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PaginationConfig {
    /// Page size for top-level collections.
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,

    /// Upper bound accepted from `page[size]`.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,

    /// Page size for to-many relationship values.
    #[serde(default = "default_indirect_page_size")]
    pub default_indirect_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            default_indirect_page_size: default_indirect_page_size(),
        }
    }
}

fn default_page_size() -> u64 {
    10
}

fn default_max_page_size() -> u64 {
    100
}

fn default_indirect_page_size() -> u64 {
    5
}

/// Resolution engine settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    /// Maximum number of persistence calls in flight per resolver.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_max_concurrency() -> usize {
    16
}

/// Expand environment variables in the format `${VAR_NAME}`.
fn expand_env_vars(content: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(r"\$\{([^}]+)\}") else {
        return content.to_string();
    };

    re.replace_all(content, |caps: &regex_lite::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.pagination.default_page_size, 10);
        assert_eq!(config.pagination.max_page_size, 100);
        assert_eq!(config.pagination.default_indirect_page_size, 5);
        assert_eq!(config.resolver.max_concurrency, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_config() {
        let config = EngineConfig::from_str(
            r#"
            [server]
            base_url = "https://api.example.com"

            [pagination]
            max_page_size = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.server.base_url, "https://api.example.com");
        assert_eq!(config.pagination.max_page_size, 50);
        assert_eq!(config.pagination.default_page_size, 10);
    }

    #[test]
    fn test_env_expansion() {
        // SAFETY: Test runs in isolation
        unsafe {
            std::env::set_var("WEAVE_TEST_HOST", "https://books.test");
        }
        let config = EngineConfig::from_str(
            r#"
            [server]
            base_url = "${WEAVE_TEST_HOST}/v1"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.base_url, "https://books.test/v1");
    }

    #[test]
    fn test_unset_variable_left_verbatim() {
        let expanded = expand_env_vars("url = \"${WEAVE_SURELY_UNSET_VARIABLE}\"");
        assert_eq!(expanded, "url = \"${WEAVE_SURELY_UNSET_VARIABLE}\"");
    }

    #[test]
    fn test_rejects_inconsistent_sizes() {
        let err = EngineConfig::from_str(
            r#"
            [pagination]
            default_page_size = 200
            max_page_size = 100
            "#,
        )
        .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidConfiguration);
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(EngineConfig::from_str("[server]\nport = 80\n").is_err());
    }
}
