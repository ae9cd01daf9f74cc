//! Service account key material and impersonation subject.

use std::fmt;
use std::path::Path;

use jsonwebtoken::EncodingKey;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::{DirectoryError, DirectoryResult};

/// Token endpoint used when the key file does not name one.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Service account JSON key as downloaded from the Cloud console.
#[derive(Debug, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: SecretString,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    /// Parses a key from its JSON representation.
    pub fn from_json(bytes: &[u8]) -> DirectoryResult<Self> {
        let key: Self = serde_json::from_slice(bytes).map_err(|e| {
            DirectoryError::Credential(format!("unable to parse service account key: {e}"))
        })?;

        if key.key_type != "service_account" {
            return Err(DirectoryError::Credential(format!(
                "expected key of type service_account, got {}",
                key.key_type
            )));
        }
        if key.client_email.trim().is_empty() {
            return Err(DirectoryError::Credential(
                "service account key has no client_email".into(),
            ));
        }

        Ok(key)
    }

    /// Reads and parses a key file.
    pub fn from_file(path: impl AsRef<Path>) -> DirectoryResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            DirectoryError::Credential(format!(
                "error reading service account file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&bytes)
    }
}

/// Key material plus the admin identity that calls are made on behalf of.
///
/// The private key is parsed once at construction so a broken key fails
/// before any network traffic.
pub struct Credentials {
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    subject: String,
}

impl Credentials {
    /// Binds a service account key to an impersonated subject.
    pub fn new(key: ServiceAccountKey, subject: impl Into<String>) -> DirectoryResult<Self> {
        let subject = subject.into();
        if subject.trim().is_empty() {
            return Err(DirectoryError::Credential(
                "impersonated subject must not be empty".into(),
            ));
        }

        let signing_key = EncodingKey::from_rsa_pem(key.private_key.expose_secret().as_bytes())
            .map_err(|e| DirectoryError::Credential(format!("invalid private key: {e}")))?;

        Ok(Self {
            key,
            signing_key,
            subject,
        })
    }

    /// Loads the key file at `path` and binds it to `subject`.
    pub fn from_file(path: impl AsRef<Path>, subject: impl Into<String>) -> DirectoryResult<Self> {
        Self::new(ServiceAccountKey::from_file(path)?, subject)
    }

    #[must_use]
    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    #[must_use]
    pub fn key_id(&self) -> Option<&str> {
        self.key.private_key_id.as_deref()
    }

    #[must_use]
    pub fn token_uri(&self) -> &str {
        &self.key.token_uri
    }

    /// The impersonated admin.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub(crate) fn signing_key(&self) -> &EncodingKey {
        &self.signing_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_email", &self.key.client_email)
            .field("private_key_id", &self.key.private_key_id)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}
