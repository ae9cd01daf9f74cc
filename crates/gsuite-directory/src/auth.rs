//! OAuth2 service account authentication with subject impersonation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::config::DirectoryConfig;
use crate::{Credentials, DirectoryError, DirectoryResult};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for signed assertions. Google caps this at one hour.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Claims of the signed assertion exchanged for an access token.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AssertionClaims {
    pub iss: String,
    pub sub: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// OAuth2 token response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[allow(dead_code)]
    token_type: String,
}

/// OAuth2 error body returned by the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// An authenticated handle for directory calls.
#[derive(Debug, Clone)]
pub struct Session {
    access_token: Arc<SecretString>,
    expires_at: DateTime<Utc>,
    subject: String,
}

impl Session {
    /// The bearer token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// The impersonated admin this session acts for.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns true if the token is expired or will expire within the grace period.
    fn is_expired(&self, grace_period: Duration) -> bool {
        Utc::now() + grace_period >= self.expires_at
    }
}

/// Establishes sessions and caches the current one until it nears expiry.
#[derive(Debug)]
pub struct SessionProvider {
    credentials: Credentials,
    token_uri: String,
    scopes: Vec<String>,
    http_client: reqwest::Client,
    cached: RwLock<Option<Session>>,
    /// Grace period before expiry to trigger refresh (default: 5 minutes).
    grace_period: Duration,
}

impl SessionProvider {
    /// Creates a provider for the given credentials.
    pub fn new(credentials: Credentials, config: &DirectoryConfig) -> DirectoryResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DirectoryError::Config(format!("Failed to create HTTP client: {e}")))?;

        let token_uri = config
            .token_uri
            .clone()
            .unwrap_or_else(|| credentials.token_uri().to_string());

        Ok(Self {
            credentials,
            token_uri,
            scopes: DirectoryConfig::scopes().iter().map(|s| (*s).to_string()).collect(),
            http_client,
            cached: RwLock::new(None),
            grace_period: Duration::minutes(5),
        })
    }

    /// Returns a valid session, establishing a new one if necessary.
    pub async fn session(&self) -> DirectoryResult<Session> {
        {
            let cache = self.cached.read().await;
            if let Some(ref session) = *cache {
                if !session.is_expired(self.grace_period) {
                    return Ok(session.clone());
                }
            }
        }

        // Only one exchange runs at a time; waiters reuse its result.
        let mut cache = self.cached.write().await;
        if let Some(ref session) = *cache {
            if !session.is_expired(self.grace_period) {
                return Ok(session.clone());
            }
        }

        let session = self.establish_session().await?;
        *cache = Some(session.clone());
        Ok(session)
    }

    /// Performs the signed-assertion exchange without consulting the cache.
    #[instrument(skip(self), fields(subject = %self.credentials.subject()))]
    pub async fn establish_session(&self) -> DirectoryResult<Session> {
        let assertion = self.sign_assertion(Utc::now())?;

        let params = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())];

        let response = self
            .http_client
            .post(&self.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| DirectoryError::Session(format!("Token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{}: {}", err.error, description),
                    None => err.error,
                },
                Err(_) => body,
            };
            return Err(DirectoryError::Session(format!(
                "Token request failed with status {status}: {reason}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| DirectoryError::Session(format!("Failed to parse token response: {e}")))?;

        let expires_at = expiry_after(Utc::now(), token.expires_in)?;
        debug!(
            "Acquired new token, expires at {}",
            expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        Ok(Session {
            access_token: Arc::new(SecretString::from(token.access_token)),
            expires_at,
            subject: self.credentials.subject().to_string(),
        })
    }

    /// Drops the cached session, forcing a new exchange on next use.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    pub(crate) fn assertion_claims(&self, now: DateTime<Utc>) -> AssertionClaims {
        let iat = now.timestamp();
        AssertionClaims {
            iss: self.credentials.client_email().to_string(),
            sub: self.credentials.subject().to_string(),
            scope: self.scopes.join(" "),
            aud: self.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        }
    }

    fn sign_assertion(&self, now: DateTime<Utc>) -> DirectoryResult<String> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.credentials.key_id().map(String::from);

        jsonwebtoken::encode(
            &header,
            &self.assertion_claims(now),
            self.credentials.signing_key(),
        )
        .map_err(|e| DirectoryError::Credential(format!("unable to sign assertion: {e}")))
    }
}

/// Absolute expiry of a token valid for `expires_in` seconds from `now`.
fn expiry_after(now: DateTime<Utc>, expires_in: i64) -> DirectoryResult<DateTime<Utc>> {
    if expires_in <= 0 {
        return Err(DirectoryError::Session(format!(
            "invalid expires_in in token response: {expires_in}"
        )));
    }
    Duration::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            DirectoryError::Session(format!(
                "invalid expires_in in token response: {expires_in}"
            ))
        })
}
