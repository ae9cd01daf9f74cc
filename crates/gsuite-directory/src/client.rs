//! Admin SDK Directory API client with retry handling.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::auth::{Session, SessionProvider};
use crate::config::DirectoryConfig;
use crate::retry::RetryPolicy;
use crate::{ApiErrorKind, Credentials, DirectoryError, DirectoryResult};

/// One page of a cursor-paged listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    /// Builds a page, treating an empty continuation token as absent.
    pub fn new(items: Vec<T>, next_page_token: Option<String>) -> Self {
        Self {
            items,
            next_page_token: next_page_token.filter(|t| !t.is_empty()),
        }
    }

    /// A final page with no continuation.
    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }
}

/// A group as returned by `groups.list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupItem {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    /// Editable alias addresses. `nonEditableAliases` are not carried.
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_created: Option<bool>,
}

/// A member as returned by `members.list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberItem {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl MemberItem {
    /// The member's email, or its id for members without one.
    #[must_use]
    pub fn identifier(&self) -> &str {
        match self.email.as_deref() {
            Some(email) if !email.is_empty() => email,
            _ => &self.id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupsResponse {
    #[serde(default)]
    groups: Vec<GroupItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MembersResponse {
    #[serde(default)]
    members: Vec<MemberItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Error envelope used by Google APIs.
#[derive(Debug, Deserialize)]
pub struct GoogleApiError {
    pub error: GoogleApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct GoogleApiErrorBody {
    #[serde(default)]
    pub code: u16,
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// The two read capabilities the traversal needs from a directory.
#[async_trait]
pub trait DirectoryApi: Send + Sync {
    /// Lists one page of groups. An empty `user_key` lists every group of
    /// the customer, otherwise only the groups `user_key` belongs to.
    async fn list_groups_page(
        &self,
        user_key: &str,
        page_token: Option<&str>,
    ) -> DirectoryResult<Page<GroupItem>>;

    /// Lists one page of a group's members.
    async fn list_members_page(
        &self,
        group_key: &str,
        page_token: Option<&str>,
    ) -> DirectoryResult<Page<MemberItem>>;
}

#[async_trait]
impl<T: DirectoryApi + ?Sized> DirectoryApi for Arc<T> {
    async fn list_groups_page(
        &self,
        user_key: &str,
        page_token: Option<&str>,
    ) -> DirectoryResult<Page<GroupItem>> {
        (**self).list_groups_page(user_key, page_token).await
    }

    async fn list_members_page(
        &self,
        group_key: &str,
        page_token: Option<&str>,
    ) -> DirectoryResult<Page<MemberItem>> {
        (**self).list_members_page(group_key, page_token).await
    }
}

/// A failed attempt, with the server's Retry-After hint if it sent one.
struct AttemptError {
    error: DirectoryError,
    retry_after: Option<u64>,
}

impl From<DirectoryError> for AttemptError {
    fn from(error: DirectoryError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

/// Directory API client authenticated as an impersonated admin.
#[derive(Debug)]
pub struct GoogleDirectoryClient {
    http_client: reqwest::Client,
    sessions: Arc<SessionProvider>,
    config: DirectoryConfig,
    retry: RetryPolicy,
}

impl GoogleDirectoryClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(credentials: Credentials, config: DirectoryConfig) -> DirectoryResult<Self> {
        config.validate()?;

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DirectoryError::Config(format!("Failed to create HTTP client: {e}")))?;

        let sessions = Arc::new(SessionProvider::new(credentials, &config)?);
        let retry = RetryPolicy::new(config.retry.clone()).map_err(DirectoryError::Config)?;

        Ok(Self {
            http_client,
            sessions,
            config,
            retry,
        })
    }

    #[must_use]
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Returns the session provider backing this client.
    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionProvider> {
        &self.sessions
    }

    /// Establishes (or reuses) a session for the impersonated admin.
    pub async fn establish_session(&self) -> DirectoryResult<Session> {
        self.sessions.session().await
    }

    fn endpoint(&self, segments: &[&str]) -> DirectoryResult<Url> {
        let mut url = Url::parse(&self.config.api_base_url)
            .map_err(|e| DirectoryError::Config(format!("invalid api_base_url: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| DirectoryError::Config("api_base_url cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn with_paging(&self, url: &mut Url, page_token: Option<&str>) {
        let mut query = url.query_pairs_mut();
        query.append_pair("maxResults", &self.config.page_size.to_string());
        if let Some(token) = page_token {
            query.append_pair("pageToken", token);
        }
    }

    pub(crate) fn groups_url(&self, user_key: &str, page_token: Option<&str>) -> DirectoryResult<Url> {
        let mut url = self.endpoint(&["groups"])?;
        if user_key.is_empty() {
            url.query_pairs_mut()
                .append_pair("customer", &self.config.customer);
        } else {
            url.query_pairs_mut().append_pair("userKey", user_key);
        }
        self.with_paging(&mut url, page_token);
        Ok(url)
    }

    pub(crate) fn members_url(
        &self,
        group_key: &str,
        page_token: Option<&str>,
    ) -> DirectoryResult<Url> {
        let mut url = self.endpoint(&["groups", group_key, "members"])?;
        self.with_paging(&mut url, page_token);
        Ok(url)
    }

    /// Performs a GET request with token injection and transient-failure retries.
    async fn get<T: DeserializeOwned>(&self, url: &Url) -> DirectoryResult<T> {
        let mut attempt = 0u32;

        loop {
            match self.get_once(url).await {
                Ok(value) => return Ok(value),
                Err(failure)
                    if failure.error.is_transient() && self.retry.should_retry(attempt) =>
                {
                    warn!(
                        "Transient error, retry {}/{}: {}",
                        attempt + 1,
                        self.retry.config().max_retries,
                        failure.error
                    );
                    self.retry.wait(failure.retry_after, attempt).await;
                    attempt += 1;
                }
                Err(failure) => return Err(failure.error),
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(&self, url: &Url) -> Result<T, AttemptError> {
        let session = self.sessions.session().await?;

        debug!("GET {}", url);
        let response = self
            .http_client
            .get(url.clone())
            .bearer_auth(session.access_token())
            .send()
            .await
            .map_err(|e| DirectoryError::from_transport(&e))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(RetryPolicy::parse_retry_after);

        let body = response
            .text()
            .await
            .map_err(|e| DirectoryError::from_transport(&e))?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| {
                DirectoryError::api(
                    ApiErrorKind::MalformedResponse,
                    format!("unable to decode response: {e}"),
                )
                .into()
            });
        }

        let kind = match status {
            reqwest::StatusCode::UNAUTHORIZED => {
                self.sessions.invalidate().await;
                ApiErrorKind::AuthExpired
            }
            reqwest::StatusCode::FORBIDDEN => ApiErrorKind::PermissionDenied,
            reqwest::StatusCode::NOT_FOUND => ApiErrorKind::NotFound,
            reqwest::StatusCode::TOO_MANY_REQUESTS => ApiErrorKind::RateLimited,
            _ => ApiErrorKind::Remote,
        };

        let message = match serde_json::from_str::<GoogleApiError>(&body) {
            Ok(api_error) => match api_error.error.status {
                Some(s) => format!("{s}: {}", api_error.error.message),
                None => api_error.error.message,
            },
            Err(_) if body.is_empty() => status.to_string(),
            Err(_) => body,
        };

        Err(AttemptError {
            error: DirectoryError::Api {
                kind,
                status: Some(status.as_u16()),
                message,
            },
            retry_after,
        })
    }
}

#[async_trait]
impl DirectoryApi for GoogleDirectoryClient {
    #[instrument(skip(self))]
    async fn list_groups_page(
        &self,
        user_key: &str,
        page_token: Option<&str>,
    ) -> DirectoryResult<Page<GroupItem>> {
        let url = self.groups_url(user_key, page_token)?;
        let response: GroupsResponse = self.get(&url).await?;
        debug!("Received page with {} groups", response.groups.len());
        Ok(Page::new(response.groups, response.next_page_token))
    }

    #[instrument(skip(self))]
    async fn list_members_page(
        &self,
        group_key: &str,
        page_token: Option<&str>,
    ) -> DirectoryResult<Page<MemberItem>> {
        let url = self.members_url(group_key, page_token)?;
        let response: MembersResponse = self.get(&url).await?;
        debug!("Received page with {} members", response.members.len());
        Ok(Page::new(response.members, response.next_page_token))
    }
}
