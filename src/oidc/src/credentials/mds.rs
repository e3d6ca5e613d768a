// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Base credentials backed by the [Metadata Service].
//!
//! Google Cloud environments such as Compute Engine, GKE, or Cloud Run expose
//! a metadata service local to the VM (or pod). It returns access tokens for
//! the default service account. These tokens never carry an ID token.
//!
//! [Metadata Service]: https://cloud.google.com/compute/docs/metadata/overview

use crate::Result;
use crate::errors::Step;
use crate::http::HttpClient;
use crate::token::{Token, TokenProvider};
use http::HeaderValue;
use reqwest::Method;
use std::time::Duration;
use tokio::time::Instant;

/// Overrides the metadata service host, e.g. `127.0.0.1:8080`.
pub(crate) const GCE_METADATA_HOST_ENV_VAR: &str = "GCE_METADATA_HOST";

const METADATA_FLAVOR_VALUE: &str = "Google";
const METADATA_FLAVOR: &str = "metadata-flavor";
const METADATA_ROOT: &str = "http://metadata.google.internal";
const PROBE_TIMEOUT: Duration = Duration::from_millis(500);
const STEP: Step = Step::Credentials;

/// Returns the metadata service root URL, if the service is available.
///
/// A configured `GCE_METADATA_HOST` is trusted without probing.
pub(crate) async fn detect(client: &HttpClient) -> Option<String> {
    if let Ok(host) = std::env::var(GCE_METADATA_HOST_ENV_VAR) {
        if !host.is_empty() {
            return Some(format!("http://{host}"));
        }
    }
    if probe(client, METADATA_ROOT).await {
        return Some(METADATA_ROOT.to_string());
    }
    None
}

/// Returns true if a metadata service answers at `root` within a short
/// timeout.
pub(crate) async fn probe(client: &HttpClient, root: &str) -> bool {
    let request = client
        .inner()
        .get(root)
        .header(
            METADATA_FLAVOR,
            HeaderValue::from_static(METADATA_FLAVOR_VALUE),
        )
        .timeout(PROBE_TIMEOUT);
    match request.send().await {
        Ok(response) => response
            .headers()
            .get(METADATA_FLAVOR)
            .is_some_and(|v| v == METADATA_FLAVOR_VALUE),
        Err(e) => {
            tracing::debug!("metadata service probe failed: {e}");
            false
        }
    }
}

#[derive(serde::Deserialize)]
struct MdsTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    token_type: String,
}

/// Fetches access tokens for the default service account.
#[derive(Clone, Debug)]
pub(crate) struct MdsTokenProvider {
    client: HttpClient,
    endpoint: String,
}

impl MdsTokenProvider {
    pub(crate) fn new(client: HttpClient, endpoint: String) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait::async_trait]
impl TokenProvider for MdsTokenProvider {
    async fn token(&self) -> Result<Token> {
        let url = format!(
            "{}/computeMetadata/v1/instance/service-accounts/default/token",
            self.endpoint.trim_end_matches('/')
        );
        let builder = self.client.request(STEP, Method::GET, &url)?.header(
            METADATA_FLAVOR,
            HeaderValue::from_static(METADATA_FLAVOR_VALUE),
        );
        let response = self
            .client
            .execute::<MdsTokenResponse>(STEP, builder)
            .await?;
        Ok(Token {
            token: response.access_token,
            token_type: response.token_type,
            expires_at: response
                .expires_in
                .map(|d| Instant::now() + Duration::from_secs(d)),
            id_token: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{Expectation, Server, matchers::*, responders::*};
    use serde_json::json;

    type TestResult = anyhow::Result<()>;

    const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

    #[tokio::test]
    async fn token_success() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", TOKEN_PATH),
                request::headers(contains(("metadata-flavor", "Google"))),
            ])
            .respond_with(json_encoded(json!({
                "access_token": "test-access-token",
                "expires_in": 3600,
                "token_type": "Bearer",
            }))),
        );

        let provider = MdsTokenProvider::new(HttpClient::default(), server.url_str(""));
        let now = Instant::now();
        let token = provider.token().await?;
        assert_eq!(token.token, "test-access-token");
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.id_token, None);
        let expires_at = token.expires_at.expect("token should have an expiry");
        assert!(expires_at >= now + Duration::from_secs(3600), "{expires_at:?}");
        Ok(())
    }

    #[tokio::test]
    async fn token_server_error() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", TOKEN_PATH))
                .respond_with(status_code(503).body("try again")),
        );

        let provider = MdsTokenProvider::new(HttpClient::default(), server.url_str("/"));
        let err = provider.token().await.unwrap_err();
        assert_eq!(err.step(), Step::Credentials);
        assert_eq!(err.http_status(), Some(http::StatusCode::SERVICE_UNAVAILABLE));
        Ok(())
    }

    #[tokio::test]
    async fn probe_success() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/"),
                request::headers(contains(("metadata-flavor", "Google"))),
            ])
            .respond_with(status_code(200).insert_header("metadata-flavor", "Google")),
        );

        assert!(probe(&HttpClient::default(), &server.url_str("/")).await);
    }

    #[tokio::test]
    async fn probe_wrong_server() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/"))
                .respond_with(status_code(200).body("not a metadata server")),
        );

        assert!(!probe(&HttpClient::default(), &server.url_str("/")).await);
    }

    #[tokio::test]
    async fn probe_no_server() -> TestResult {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        assert!(!probe(&HttpClient::default(), &format!("http://{addr}/")).await);
        Ok(())
    }
}
