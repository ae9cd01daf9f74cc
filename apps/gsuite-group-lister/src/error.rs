//! CLI error types and exit codes

use gsuite_directory::{ApiErrorKind, DirectoryError, TraversalError};
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 2: Authentication or authorization failure
/// - 3: Network error
/// - 4: Validation error
/// - 5: Server error
/// - 130: Interrupted
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Listing stopped after {max_pages} pages: {context}")]
    PageLimit { max_pages: usize, context: String },

    #[error("Interrupted")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(String),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::AuthenticationFailed(_) => 2,
            CliError::Network(_) => 3,
            CliError::Validation(_) | CliError::Config(_) => 4,
            CliError::Server(_) => 5,
            CliError::Cancelled => 130,
            CliError::PageLimit { .. } | CliError::Io(_) => 1,
        }
    }

    /// Print the error to stderr with appropriate formatting
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {}", self);
        } else {
            eprintln!("Error: {}", self);
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {}", suggestion);
            } else {
                eprintln!("\nSuggestion: {}", suggestion);
            }
        }
    }

    /// Get a suggested action for this error
    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::AuthenticationFailed(_) => Some(
                "Check that the service account has domain-wide delegation for the directory \
                 read-only scopes and that the impersonated user is an administrator.",
            ),
            CliError::PageLimit { .. } => Some("Raise --max-pages or omit it to follow every page."),
            _ => None,
        }
    }

    fn from_directory(error: &DirectoryError, context: String) -> Self {
        match error {
            DirectoryError::Config(message) => CliError::Config(message.clone()),
            DirectoryError::Credential(_) | DirectoryError::Session(_) => {
                CliError::AuthenticationFailed(context)
            }
            DirectoryError::Api { kind, .. } => match kind {
                ApiErrorKind::AuthExpired | ApiErrorKind::PermissionDenied => {
                    CliError::AuthenticationFailed(context)
                }
                ApiErrorKind::Network | ApiErrorKind::Timeout | ApiErrorKind::RateLimited => {
                    CliError::Network(context)
                }
                ApiErrorKind::NotFound
                | ApiErrorKind::MalformedResponse
                | ApiErrorKind::Remote => CliError::Server(context),
            },
            DirectoryError::PaginationExhausted { max_pages } => CliError::PageLimit {
                max_pages: *max_pages,
                context,
            },
            DirectoryError::Cancelled => CliError::Cancelled,
        }
    }
}

impl From<DirectoryError> for CliError {
    fn from(e: DirectoryError) -> Self {
        let context = e.to_string();
        Self::from_directory(&e, context)
    }
}

impl From<TraversalError> for CliError {
    fn from(e: TraversalError) -> Self {
        let context = e.to_string();
        Self::from_directory(&e.source, context)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Io(format!("JSON error: {}", e))
    }
}
