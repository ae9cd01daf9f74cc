//! Google Workspace directory group traversal.
//!
//! This crate lists the groups of a Google Workspace domain through the
//! Admin SDK Directory API and resolves the members of each group into an
//! ordered [`Report`].
//!
//! # Features
//!
//! - Service account authentication with admin impersonation
//! - Cursor pagination factored into a single [`Paginator`]
//! - Sequential or bounded-concurrency member resolution with stable ordering
//! - Retry with exponential backoff for transient failures
//! - Cancellation of in-flight traversals
//!
//! # Example
//!
//! ```no_run
//! use gsuite_directory::{
//!     CancellationToken, Credentials, DirectoryConfig, GoogleDirectoryClient, GroupLister,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let credentials = Credentials::from_file("service-account.json", "admin@example.com")?;
//! let client = GoogleDirectoryClient::new(credentials, DirectoryConfig::builder().build()?)?;
//!
//! let report = GroupLister::new(client)
//!     .list_groups(&CancellationToken::new())
//!     .await?;
//!
//! for group in &report {
//!     println!("{} {:?}", group.name, group.members);
//! }
//! # Ok(())
//! # }
//! ```

mod auth;
mod client;
mod config;
mod credentials;
mod error;
mod pagination;
mod report;
mod retry;
mod traversal;

// Re-exports
pub use auth::{Session, SessionProvider};
pub use client::{
    DirectoryApi, GoogleApiError, GoogleApiErrorBody, GoogleDirectoryClient, GroupItem,
    MemberItem, Page,
};
pub use config::{
    DirectoryConfig, DirectoryConfigBuilder, DEFAULT_API_BASE_URL, DEFAULT_CUSTOMER,
    MAX_PAGE_SIZE, SCOPE_GROUP_READONLY, SCOPE_USER_READONLY,
};
pub use credentials::{Credentials, ServiceAccountKey, DEFAULT_TOKEN_URI};
pub use error::{ApiErrorKind, DirectoryError, DirectoryResult, Operation, TraversalError};
pub use pagination::Paginator;
pub use report::{Group, Report, TAG_ADMIN_CREATED};
pub use retry::{RetryConfig, RetryPolicy};
pub use traversal::{GroupLister, TraversalOptions};

// Callers need the token type to cancel traversals.
pub use tokio_util::sync::CancellationToken;
