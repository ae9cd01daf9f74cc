//! Directory client configuration.

use std::time::Duration;

use crate::retry::RetryConfig;
use crate::{DirectoryError, DirectoryResult};

/// Default Admin SDK Directory API endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://admin.googleapis.com/admin/directory/v1";

/// Alias for the customer account that owns the impersonated admin.
pub const DEFAULT_CUSTOMER: &str = "my_customer";

/// Largest page the Directory API serves for groups and members.
pub const MAX_PAGE_SIZE: u32 = 200;

/// Scope granting read access to directory users.
pub const SCOPE_USER_READONLY: &str =
    "https://www.googleapis.com/auth/admin.directory.user.readonly";

/// Scope granting read access to directory groups and memberships.
pub const SCOPE_GROUP_READONLY: &str =
    "https://www.googleapis.com/auth/admin.directory.group.readonly";

/// Configuration for [`GoogleDirectoryClient`](crate::GoogleDirectoryClient).
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Base URL of the Directory API, without trailing slash.
    pub api_base_url: String,
    /// Overrides the token endpoint found in the service account key.
    pub token_uri: Option<String>,
    /// Customer used for unscoped group listings.
    pub customer: String,
    /// Items requested per page (1..=200).
    pub page_size: u32,
    /// Timeout applied to every HTTP request.
    pub request_timeout: Duration,
    /// Retry behaviour for transient failures.
    pub retry: RetryConfig,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token_uri: None,
            customer: DEFAULT_CUSTOMER.to_string(),
            page_size: MAX_PAGE_SIZE,
            request_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }
}

impl DirectoryConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> DirectoryConfigBuilder {
        DirectoryConfigBuilder::new()
    }

    /// Scopes requested for every session.
    #[must_use]
    pub fn scopes() -> [&'static str; 2] {
        [SCOPE_USER_READONLY, SCOPE_GROUP_READONLY]
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DirectoryResult<()> {
        url::Url::parse(&self.api_base_url)
            .map_err(|e| DirectoryError::Config(format!("invalid api_base_url: {e}")))?;
        if let Some(ref token_uri) = self.token_uri {
            url::Url::parse(token_uri)
                .map_err(|e| DirectoryError::Config(format!("invalid token_uri: {e}")))?;
        }
        if self.customer.trim().is_empty() {
            return Err(DirectoryError::Config("customer must not be empty".into()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(DirectoryError::Config(format!(
                "page_size must be in range 1..={MAX_PAGE_SIZE}"
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(DirectoryError::Config(
                "request_timeout must be > 0".into(),
            ));
        }
        self.retry.validate().map_err(DirectoryError::Config)
    }
}

/// Builder for `DirectoryConfig`.
#[derive(Debug, Default)]
pub struct DirectoryConfigBuilder {
    api_base_url: Option<String>,
    token_uri: Option<String>,
    customer: Option<String>,
    page_size: Option<u32>,
    request_timeout: Option<Duration>,
    retry: Option<RetryConfig>,
}

impl DirectoryConfigBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the Directory API base URL.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    /// Override the OAuth2 token endpoint.
    pub fn token_uri(mut self, uri: impl Into<String>) -> Self {
        self.token_uri = Some(uri.into());
        self
    }

    /// Set the customer for unscoped listings.
    pub fn customer(mut self, customer: impl Into<String>) -> Self {
        self.customer = Some(customer.into());
        self
    }

    /// Set the page size.
    #[must_use]
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the retry configuration.
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> DirectoryResult<DirectoryConfig> {
        let defaults = DirectoryConfig::default();
        let config = DirectoryConfig {
            api_base_url: self.api_base_url.unwrap_or(defaults.api_base_url),
            token_uri: self.token_uri,
            customer: self.customer.unwrap_or(defaults.customer),
            page_size: self.page_size.unwrap_or(defaults.page_size),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            retry: self.retry.unwrap_or(defaults.retry),
        };
        config.validate()?;
        Ok(config)
    }
}
