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

//! Mint an ID token by impersonating a service account.
//!
//! The caller presents an access token to the IAM Credentials
//! [generateIdToken] method. The service account is identified by the URL
//! path, the audience by the request body.
//!
//! [generateIdToken]: https://cloud.google.com/iam/docs/reference/credentials/rest/v1/projects.serviceAccounts/generateIdToken

use crate::Result;
use crate::errors::{Error, Step};
use crate::http::HttpClient;
use crate::options::Endpoints;
use http::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};

const STEP: Step = Step::GenerateIdToken;

/// The body of a `generateIdToken` request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AudienceRequest {
    /// The audience for the token, such as the URL of a Cloud Run service.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub audience: String,
    /// The delegation chain, each entry in the form
    /// `projects/-/serviceAccounts/{ACCOUNT_EMAIL_OR_UNIQUEID}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegates: Option<Vec<String>>,
}

impl AudienceRequest {
    pub fn new<S: Into<String>>(audience: S) -> Self {
        Self {
            audience: audience.into(),
            delegates: None,
        }
    }

    pub fn with_delegates<I, V>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.delegates = Some(v.into_iter().map(Into::into).collect());
        self
    }
}

#[derive(Deserialize)]
struct GenerateIdTokenResponse {
    token: String,
}

/// Mints an ID token for `audience`, acting as `service_account`.
pub(crate) async fn generate_id_token(
    client: &HttpClient,
    endpoints: &Endpoints,
    access_token: &str,
    service_account: &str,
    audience: &str,
) -> Result<String> {
    let request = AudienceRequest::new(audience);
    generate_id_token_with_delegates(client, endpoints, access_token, service_account, &request)
        .await
}

/// Mints an ID token using a full [AudienceRequest], including delegates.
pub(crate) async fn generate_id_token_with_delegates(
    client: &HttpClient,
    endpoints: &Endpoints,
    access_token: &str,
    service_account: &str,
    request: &AudienceRequest,
) -> Result<String> {
    let url = endpoints.generate_id_token_url(service_account);
    let builder = client
        .post_json(STEP, &url, request)?
        .header(AUTHORIZATION, format!("Bearer {access_token}"));
    let response = client
        .execute::<GenerateIdTokenResponse>(STEP, builder)
        .await?;
    if response.token.is_empty() {
        return Err(Error::decode(STEP, EmptyIdToken));
    }
    Ok(response.token)
}

#[derive(thiserror::Error, Debug)]
#[error("the response contains an empty `token`")]
struct EmptyIdToken;

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{Expectation, Server, matchers::*, responders::*};
    use serde_json::json;
    use test_case::test_case;

    type TestResult = anyhow::Result<()>;

    const SERVICE_ACCOUNT: &str = "test-sa@test-project.iam.gserviceaccount.com";
    const GENERATE_PATH: &str =
        "/v1/projects/-/serviceAccounts/test-sa@test-project.iam.gserviceaccount.com:generateIdToken";

    #[test]
    fn request_serialization() -> TestResult {
        let request = AudienceRequest::new("https://example.com");
        assert_eq!(
            serde_json::to_value(&request)?,
            json!({"audience": "https://example.com"})
        );

        let request = request.with_delegates(["projects/-/serviceAccounts/d1@p.iam.gserviceaccount.com"]);
        assert_eq!(
            serde_json::to_value(&request)?,
            json!({
                "audience": "https://example.com",
                "delegates": ["projects/-/serviceAccounts/d1@p.iam.gserviceaccount.com"],
            })
        );

        let request = AudienceRequest::default();
        assert_eq!(serde_json::to_value(&request)?, json!({}));
        Ok(())
    }

    #[test]
    fn request_serde() -> TestResult {
        let request = AudienceRequest::new("https://example.com").with_delegates(["a", "b"]);
        let encoded = serde_json::to_string(&request)?;
        let decoded = serde_json::from_str::<AudienceRequest>(&encoded)?;
        assert_eq!(request, decoded);
        assert_eq!(serde_json::to_string(&decoded)?, encoded);
        Ok(())
    }

    #[test_case(AudienceRequest::new("https://example.com"); "audience only")]
    #[test_case(AudienceRequest::new("https://example.com").with_delegates(["a", "b"]); "with delegates")]
    #[test_case(AudienceRequest::default(); "empty")]
    fn request_wire_roundtrip(request: AudienceRequest) -> TestResult {
        let encoded = crate::http::json_body(Step::GenerateIdToken, &request)?;
        let decoded = serde_json::from_slice::<AudienceRequest>(&encoded)?;
        assert_eq!(request, decoded);
        let reencoded = crate::http::json_body(Step::GenerateIdToken, &decoded)?;
        assert_eq!(encoded, reencoded);
        Ok(())
    }

    #[tokio::test]
    async fn generate_success() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", GENERATE_PATH),
                request::headers(contains(("authorization", "Bearer acc-tok"))),
                request::headers(contains(("content-type", "application/json"))),
                request::body(json_decoded(eq(json!({"audience": "https://example.com"})))),
            ])
            .respond_with(json_encoded(json!({"token": "id-tok-xyz"}))),
        );

        let endpoints = Endpoints::default().with_iam_credentials_url(server.url_str(""));
        let got = generate_id_token(
            &HttpClient::default(),
            &endpoints,
            "acc-tok",
            SERVICE_ACCOUNT,
            "https://example.com",
        )
        .await?;
        assert_eq!(got, "id-tok-xyz");
        Ok(())
    }

    #[tokio::test]
    async fn generate_with_delegates() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", GENERATE_PATH),
                request::body(json_decoded(eq(json!({
                    "audience": "https://example.com",
                    "delegates": ["projects/-/serviceAccounts/d1@p.iam.gserviceaccount.com"],
                })))),
            ])
            .respond_with(json_encoded(json!({"token": "id-tok-xyz"}))),
        );

        let endpoints = Endpoints::default().with_iam_credentials_url(server.url_str(""));
        let request = AudienceRequest::new("https://example.com")
            .with_delegates(["projects/-/serviceAccounts/d1@p.iam.gserviceaccount.com"]);
        let got = generate_id_token_with_delegates(
            &HttpClient::default(),
            &endpoints,
            "acc-tok",
            SERVICE_ACCOUNT,
            &request,
        )
        .await?;
        assert_eq!(got, "id-tok-xyz");
        Ok(())
    }

    #[tokio::test]
    async fn generate_permission_denied() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", GENERATE_PATH))
                .respond_with(status_code(403).body("iam.serviceAccounts.getOpenIdToken denied")),
        );

        let endpoints = Endpoints::default().with_iam_credentials_url(server.url_str(""));
        let err = generate_id_token(
            &HttpClient::default(),
            &endpoints,
            "acc-tok",
            SERVICE_ACCOUNT,
            "https://example.com",
        )
        .await
        .unwrap_err();
        assert!(err.is_http_status(), "{err:?}");
        assert_eq!(err.step(), Step::GenerateIdToken);
        assert_eq!(err.http_status(), Some(http::StatusCode::FORBIDDEN));
        Ok(())
    }

    #[tokio::test]
    async fn generate_missing_token() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", GENERATE_PATH))
                .respond_with(json_encoded(json!({"token": ""}))),
        );

        let endpoints = Endpoints::default().with_iam_credentials_url(server.url_str(""));
        let err = generate_id_token(
            &HttpClient::default(),
            &endpoints,
            "acc-tok",
            SERVICE_ACCOUNT,
            "https://example.com",
        )
        .await
        .unwrap_err();
        assert!(err.is_decode(), "{err:?}");
        Ok(())
    }
}
