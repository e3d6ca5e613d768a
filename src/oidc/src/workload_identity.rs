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

//! Turn a CI federation token into an ID token for a target audience.
//!
//! [Exchanger] runs the three exchanges of workload identity federation in
//! order, each one consuming the output of the previous step:
//!
//! 1. `GET <ci_token_request_url>&audience=...` returns the federation token.
//! 2. `POST https://sts.googleapis.com/v1/token` returns an access token.
//! 3. `POST .../serviceAccounts/<sa>:generateIdToken` returns the ID token.
//!
//! The first failure is returned, later steps are never executed. Nothing is
//! retried and nothing is cached between invocations.
//!
//! Dropping the future returned by [Exchanger::exchange] aborts the request
//! in flight. No state is held between steps, so there is nothing to clean
//! up.

use crate::Result;
use crate::ci_token::fetch_federation_token;
use crate::http::HttpClient;
use crate::impersonate::{AudienceRequest, generate_id_token, generate_id_token_with_delegates};
use crate::options::Endpoints;
use crate::sts_exchange::exchange_token;

/// Describes one run of the workload identity exchange.
///
/// Callers typically populate `ci_token_request_url` and
/// `ci_token_request_token` from the `ACTIONS_ID_TOKEN_REQUEST_URL` and
/// `ACTIONS_ID_TOKEN_REQUEST_TOKEN` environment variables.
#[derive(Clone, Default, PartialEq)]
pub struct WorkloadIdentityRequest {
    /// The CI platform's token endpoint. It must already contain a query
    /// string, the audience is appended as `&audience=...`.
    pub ci_token_request_url: String,
    /// The bearer token for `ci_token_request_url`.
    pub ci_token_request_token: String,
    /// The workload identity provider resource name, e.g.
    /// `projects/123456789/locations/global/workloadIdentityPools/my-pool/providers/my-provider`.
    pub workload_identity_provider: String,
    /// The email of the service account to impersonate.
    pub service_account: String,
    /// The audience of the resulting ID token.
    pub target_audience: String,
}

impl std::fmt::Debug for WorkloadIdentityRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkloadIdentityRequest")
            .field("ci_token_request_url", &self.ci_token_request_url)
            .field("ci_token_request_token", &"[censored]")
            .field("workload_identity_provider", &self.workload_identity_provider)
            .field("service_account", &self.service_account)
            .field("target_audience", &self.target_audience)
            .finish()
    }
}

/// Runs the workload identity exchange.
///
/// # Example
/// ```no_run
/// # use opc_oidc::workload_identity::{Exchanger, WorkloadIdentityRequest};
/// # tokio_test::block_on(async {
/// let exchanger = Exchanger::builder()
///     .with_client(reqwest::Client::new())
///     .build();
/// let request = WorkloadIdentityRequest {
///     ci_token_request_url: std::env::var("ACTIONS_ID_TOKEN_REQUEST_URL")?,
///     ci_token_request_token: std::env::var("ACTIONS_ID_TOKEN_REQUEST_TOKEN")?,
///     workload_identity_provider:
///         "projects/123456789/locations/global/workloadIdentityPools/my-pool/providers/my-provider".into(),
///     service_account: "my-service-account@my-project.iam.gserviceaccount.com".into(),
///     target_audience: "https://my-service.example.com".into(),
/// };
/// let id_token = exchanger.exchange(&request).await?;
/// # Ok::<(), anyhow::Error>(())
/// # });
/// ```
#[derive(Clone, Debug)]
pub struct Exchanger {
    client: HttpClient,
    endpoints: Endpoints,
}

impl Exchanger {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Fetches the federation token from the CI platform.
    pub async fn federation_token(
        &self,
        ci_token_request_url: &str,
        ci_token_request_token: &str,
        provider_path: &str,
    ) -> Result<String> {
        fetch_federation_token(
            &self.client,
            &self.endpoints,
            ci_token_request_url,
            ci_token_request_token,
            provider_path,
        )
        .await
    }

    /// Exchanges a federation token for an access token.
    pub async fn access_token(&self, provider_path: &str, federation_token: &str) -> Result<String> {
        exchange_token(&self.client, &self.endpoints, provider_path, federation_token).await
    }

    /// Mints an ID token for `audience` as `service_account`.
    pub async fn id_token(
        &self,
        access_token: &str,
        service_account: &str,
        audience: &str,
    ) -> Result<String> {
        generate_id_token(
            &self.client,
            &self.endpoints,
            access_token,
            service_account,
            audience,
        )
        .await
    }

    /// Mints an ID token using a complete [AudienceRequest].
    ///
    /// Use this variant when the impersonation goes through a chain of
    /// delegate service accounts.
    pub async fn id_token_with_delegates(
        &self,
        access_token: &str,
        service_account: &str,
        request: &AudienceRequest,
    ) -> Result<String> {
        generate_id_token_with_delegates(
            &self.client,
            &self.endpoints,
            access_token,
            service_account,
            request,
        )
        .await
    }

    /// Runs the three steps and returns the ID token.
    #[tracing::instrument(skip(self, request), fields(
        provider = %request.workload_identity_provider,
        service_account = %request.service_account,
        audience = %request.target_audience,
    ))]
    pub async fn exchange(&self, request: &WorkloadIdentityRequest) -> Result<String> {
        let federation_token = self
            .federation_token(
                &request.ci_token_request_url,
                &request.ci_token_request_token,
                &request.workload_identity_provider,
            )
            .await?;
        let access_token = self
            .access_token(&request.workload_identity_provider, &federation_token)
            .await?;
        let id_token = self
            .id_token(
                &access_token,
                &request.service_account,
                &request.target_audience,
            )
            .await?;
        tracing::info!("minted ID token");
        Ok(id_token)
    }
}

/// A builder for [Exchanger].
#[derive(Debug, Default)]
pub struct Builder {
    client: Option<reqwest::Client>,
    endpoints: Option<Endpoints>,
}

impl Builder {
    /// Sets the HTTP client shared by the three steps.
    ///
    /// Use this to configure timeouts, proxies, or TLS roots. Defaults to
    /// `reqwest::Client::new()`.
    pub fn with_client(mut self, v: reqwest::Client) -> Self {
        self.client = Some(v);
        self
    }

    /// Overrides the service endpoints, typically to use a test server.
    pub fn with_endpoints(mut self, v: Endpoints) -> Self {
        self.endpoints = Some(v);
        self
    }

    pub fn build(self) -> Exchanger {
        Exchanger {
            client: self.client.map(HttpClient::new).unwrap_or_default(),
            endpoints: self.endpoints.unwrap_or_default(),
        }
    }
}

/// Runs the workload identity exchange with the default client and endpoints.
pub async fn workload_identity_token(request: &WorkloadIdentityRequest) -> Result<String> {
    Exchanger::builder().build().exchange(request).await
}
