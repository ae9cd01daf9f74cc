//! Error types for the directory client and traversal engine.

use std::fmt;

use thiserror::Error;

/// Result type alias using `DirectoryError`.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Classification of a failed Directory API page call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Connection could not be established or was reset.
    Network,
    /// The bearer token was rejected (HTTP 401).
    AuthExpired,
    /// The impersonated subject lacks access (HTTP 403).
    PermissionDenied,
    /// The requested user or group does not exist (HTTP 404).
    NotFound,
    /// The service throttled the request (HTTP 429).
    RateLimited,
    /// The response body could not be decoded.
    MalformedResponse,
    /// The per-request timeout elapsed.
    Timeout,
    /// Any other non-success status.
    Remote,
}

impl ApiErrorKind {
    /// Whether a request failing this way may be retried.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Network | Self::RateLimited | Self::Timeout)
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network failure",
            Self::AuthExpired => "authorization expired",
            Self::PermissionDenied => "permission denied",
            Self::NotFound => "not found",
            Self::RateLimited => "rate limited",
            Self::MalformedResponse => "malformed response",
            Self::Timeout => "timeout",
            Self::Remote => "remote error",
        };
        f.write_str(name)
    }
}

/// Errors that can occur when talking to the directory service.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Client configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Service account key could not be read, parsed or used for signing.
    #[error("Credential error: {0}")]
    Credential(String),

    /// The token endpoint rejected the session setup.
    #[error("Session error: {0}")]
    Session(String),

    /// A Directory API page call failed.
    #[error("Directory API error ({kind}): {message}")]
    Api {
        kind: ApiErrorKind,
        status: Option<u16>,
        message: String,
    },

    /// The cursor loop exceeded its configured page limit.
    #[error("Pagination exceeded {max_pages} pages")]
    PaginationExhausted { max_pages: usize },

    /// The caller cancelled the traversal.
    #[error("Operation cancelled")]
    Cancelled,
}

impl DirectoryError {
    /// Creates an API error without an HTTP status.
    pub fn api(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self::Api {
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// Returns the API error kind, if this is an API error.
    #[must_use]
    pub fn api_kind(&self) -> Option<ApiErrorKind> {
        match self {
            Self::Api { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether the failed call may be retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api { kind, status, .. } => {
                kind.is_transient() || matches!(status, Some(502..=504))
            }
            _ => false,
        }
    }

    /// Maps a transport-level `reqwest` error onto the API taxonomy.
    pub(crate) fn from_transport(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ApiErrorKind::Timeout
        } else if err.is_decode() {
            ApiErrorKind::MalformedResponse
        } else {
            ApiErrorKind::Network
        };
        Self::api(kind, err.to_string())
    }
}

/// The traversal step that was in progress when an error occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Listing groups, optionally scoped to one user.
    ListGroups { user_key: String },
    /// Resolving the members of one group.
    ListMembers { group_id: String },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListGroups { user_key } if user_key.is_empty() => f.write_str("listing groups"),
            Self::ListGroups { user_key } => write!(f, "listing groups of user {user_key}"),
            Self::ListMembers { group_id } => write!(f, "listing members of group {group_id}"),
        }
    }
}

/// A traversal failure annotated with the operation that was in progress.
#[derive(Debug, Error)]
#[error("{operation}: {source}")]
pub struct TraversalError {
    pub operation: Operation,
    #[source]
    pub source: DirectoryError,
}

impl TraversalError {
    pub(crate) fn new(operation: Operation, source: DirectoryError) -> Self {
        Self { operation, source }
    }

    /// The group whose member resolution failed, if any.
    #[must_use]
    pub fn group_id(&self) -> Option<&str> {
        match &self.operation {
            Operation::ListMembers { group_id } => Some(group_id),
            Operation::ListGroups { .. } => None,
        }
    }
}
