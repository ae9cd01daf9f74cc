//! Command-line configuration and its translation into client settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use gsuite_directory::{
    Credentials, DirectoryConfig, DirectoryError, RetryConfig, TraversalOptions,
    DEFAULT_API_BASE_URL, MAX_PAGE_SIZE,
};

use crate::error::{CliError, CliResult};

/// Default location of the service account key.
pub const DEFAULT_SERVICE_ACCOUNT_PATH: &str = "~/.config/gcloud/terraform-admin.json";

/// Options controlling what is listed and how.
#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    /// Path to the Google service account key file
    #[arg(
        short = 's',
        long,
        env = "GOOGLE_SERVICE_ACCOUNT_PATH",
        default_value = DEFAULT_SERVICE_ACCOUNT_PATH
    )]
    pub google_service_account_path: String,

    /// Admin user to impersonate when using the Directory API
    #[arg(short = 'a', long, env = "GOOGLE_IMPERSONATE_ADMIN")]
    pub google_impersonate_admin: String,

    /// Only list the groups this user (email or id) belongs to
    #[arg(short = 'u', long, env = "GOOGLE_USER_KEY")]
    pub user_key: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Items requested per page (1-200)
    #[arg(long, default_value_t = MAX_PAGE_SIZE)]
    pub page_size: u32,

    /// Groups whose members are resolved at the same time
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,

    /// Stop with an error after this many pages of a single listing
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Retries for transient failures (0 disables retrying)
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Directory API base URL
    #[arg(
        long,
        env = "GOOGLE_DIRECTORY_API_URL",
        default_value = DEFAULT_API_BASE_URL,
        hide = true
    )]
    pub api_base_url: String,

    /// OAuth2 token endpoint, overriding the one in the key file
    #[arg(long, env = "GOOGLE_TOKEN_URI", hide = true)]
    pub token_uri: Option<String>,
}

impl ListArgs {
    /// The key file path with `~` expanded.
    pub fn service_account_path(&self) -> PathBuf {
        expand_home(&self.google_service_account_path)
    }

    /// Loads the service account key bound to the impersonated admin.
    pub fn credentials(&self) -> CliResult<Credentials> {
        let path = self.service_account_path();
        Ok(Credentials::from_file(&path, self.google_impersonate_admin.as_str())?)
    }

    /// Builds the client configuration from the flags.
    pub fn directory_config(&self) -> CliResult<DirectoryConfig> {
        if self.timeout_secs == 0 {
            return Err(CliError::Validation(
                "--timeout-secs must be greater than zero".to_string(),
            ));
        }

        let retry = if self.max_retries == 0 {
            RetryConfig::disabled()
        } else {
            RetryConfig {
                max_retries: self.max_retries,
                ..RetryConfig::default()
            }
        };

        let mut builder = DirectoryConfig::builder()
            .api_base_url(self.api_base_url.as_str())
            .page_size(self.page_size)
            .request_timeout(Duration::from_secs(self.timeout_secs))
            .retry(retry);
        if let Some(ref token_uri) = self.token_uri {
            builder = builder.token_uri(token_uri.as_str());
        }

        builder.build().map_err(|e| match e {
            DirectoryError::Config(message) => CliError::Validation(message),
            other => other.into(),
        })
    }

    /// Builds the traversal options from the flags.
    pub fn traversal_options(&self) -> CliResult<TraversalOptions> {
        if self.concurrency == 0 {
            return Err(CliError::Validation(
                "--concurrency must be at least 1".to_string(),
            ));
        }
        if self.max_pages == Some(0) {
            return Err(CliError::Validation(
                "--max-pages must be at least 1".to_string(),
            ));
        }

        Ok(TraversalOptions {
            max_pages: self.max_pages,
            concurrency: self.concurrency,
        })
    }

    /// The user to scope the listing to, or an empty key for the whole domain.
    pub fn user_key(&self) -> &str {
        self.user_key.as_deref().map(str::trim).unwrap_or_default()
    }
}

/// Expands a leading `~` against the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    Path::new(path).to_path_buf()
}
