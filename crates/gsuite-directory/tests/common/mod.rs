//! Common test utilities for gsuite-directory integration tests.

#![allow(dead_code)]

use gsuite_directory::{
    Credentials, DirectoryConfig, DirectoryConfigBuilder, GoogleDirectoryClient, RetryConfig,
};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ACCESS_TOKEN: &str = "mock-access-token";
pub const ADMIN: &str = "admin@example.com";
pub const API_PATH: &str = "/admin/directory/v1";

/// Loads the fixture service account bound to [`ADMIN`].
pub fn credentials() -> Credentials {
    Credentials::from_file(
        concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/service_account.json"),
        ADMIN,
    )
    .unwrap()
}

/// Test data factory for directory groups.
pub fn create_group(id: &str, name: &str) -> Value {
    json!({
        "kind": "admin#directory#group",
        "id": id,
        "email": format!("{}@example.com", name.to_lowercase().replace(' ', "-")),
        "name": name,
        "directMembersCount": "0",
        "adminCreated": true
    })
}

/// Test data factory for groups with aliases.
pub fn create_group_with_aliases(id: &str, name: &str, aliases: &[&str]) -> Value {
    let mut group = create_group(id, name);
    group["aliases"] = json!(aliases);
    group
}

/// Test data factory for user members.
pub fn create_member(email: &str) -> Value {
    json!({
        "kind": "admin#directory#member",
        "id": format!("id-{email}"),
        "email": email,
        "role": "MEMBER",
        "type": "USER",
        "status": "ACTIVE"
    })
}

/// Wraps items in a listing response.
pub fn create_page(field: &str, items: Vec<Value>, next_page_token: Option<&str>) -> Value {
    let mut response = json!({ "kind": format!("admin#directory#{field}") });
    if !items.is_empty() {
        response[field] = json!(items);
    }
    if let Some(token) = next_page_token {
        response["nextPageToken"] = json!(token);
    }
    response
}

/// Creates a Google API error response.
pub fn create_google_error(code: u16, message: &str, status: &str) -> Value {
    json!({
        "error": {
            "code": code,
            "message": message,
            "status": status
        }
    })
}

/// Creates a mock OAuth token response.
pub fn create_token_response(access_token: &str, expires_in: u64) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": expires_in
    })
}

/// Mock server wrapper with common setup helpers.
pub struct MockDirectoryServer {
    pub server: MockServer,
}

impl MockDirectoryServer {
    /// Creates a new mock directory server.
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    pub fn url(&self) -> String {
        self.server.uri()
    }

    pub fn api_base(&self) -> String {
        format!("{}{}", self.url(), API_PATH)
    }

    pub fn token_uri(&self) -> String {
        format!("{}/token", self.url())
    }

    /// Client pointed at this server with fast retries.
    pub fn client(&self) -> GoogleDirectoryClient {
        self.client_with(DirectoryConfig::builder().retry(RetryConfig::for_testing()))
    }

    /// Client pointed at this server with caller-supplied settings.
    pub fn client_with(&self, builder: DirectoryConfigBuilder) -> GoogleDirectoryClient {
        let config = builder
            .api_base_url(self.api_base())
            .token_uri(self.token_uri())
            .build()
            .unwrap();
        GoogleDirectoryClient::new(credentials(), config).unwrap()
    }

    /// Sets up the OAuth token endpoint.
    pub async fn mock_token_endpoint(&self) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(create_token_response(ACCESS_TOKEN, 3600)),
            )
            .mount(&self.server)
            .await;
    }

    /// Sets up the groups listing, one mock per page. `scope` is the query
    /// parameter that selects the listing (`customer` or `userKey`).
    pub async fn mock_groups(&self, scope: (&str, &str), pages: Vec<Vec<Value>>) {
        self.mount_pages(format!("{API_PATH}/groups"), Some(scope), "groups", pages)
            .await;
    }

    /// Sets up a group's member listing, one mock per page.
    pub async fn mock_members(&self, group_id: &str, pages: Vec<Vec<Value>>) {
        self.mount_pages(
            format!("{API_PATH}/groups/{group_id}/members"),
            None,
            "members",
            pages,
        )
        .await;
    }

    /// Responds to a group's member listing with an error.
    pub async fn mock_members_error(&self, group_id: &str, status: u16, body: Value) {
        Mock::given(method("GET"))
            .and(path(format!("{API_PATH}/groups/{group_id}/members")))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    async fn mount_pages(
        &self,
        page_path: String,
        scope: Option<(&str, &str)>,
        field: &str,
        pages: Vec<Vec<Value>>,
    ) {
        let total_pages = pages.len();

        for (i, items) in pages.into_iter().enumerate() {
            let next = (i + 1 < total_pages).then(|| format!("page-{}", i + 1));
            let response = create_page(field, items, next.as_deref());

            let mut mock = Mock::given(method("GET"))
                .and(path(page_path.clone()))
                .and(header("authorization", format!("Bearer {ACCESS_TOKEN}").as_str()));
            if let Some((key, value)) = scope {
                mock = mock.and(query_param(key, value));
            }
            mock = if i == 0 {
                mock.and(query_param_is_missing("pageToken"))
            } else {
                mock.and(query_param("pageToken", format!("page-{i}")))
            };

            mock.respond_with(ResponseTemplate::new(200).set_body_json(response))
                .mount(&self.server)
                .await;
        }
    }
}
