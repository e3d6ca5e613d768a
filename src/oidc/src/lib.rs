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

//! Workload identity federation for CI jobs.
//!
//! A CI job (GitHub Actions, for example) holds no long-lived secret, but the
//! CI platform can mint a short-lived OIDC token for it. This crate turns that
//! token into an [ID token] for an arbitrary audience by chaining three
//! exchanges:
//!
//! 1. Fetch the federation token from the CI platform ([ci_token]).
//! 2. Exchange it for a Google Cloud access token at the
//!    [Security Token Service] ([sts_exchange]).
//! 3. Use the access token to impersonate a service account and mint an ID
//!    token for the target audience ([impersonate]).
//!
//! [workload_identity::Exchanger] composes the three steps.
//!
//! Independently, the crate offers [credentials::IdTokenCredentials], a
//! cached, thread-safe source of ID tokens backed by
//! [Application Default Credentials], and uses it to build an
//! [transport::AuthenticatedTransport] and a [proxy::ReverseProxy].
//!
//! ## Example: mint an ID token for a Cloud Run service
//!
//! ```no_run
//! # use opc_oidc::workload_identity::{WorkloadIdentityRequest, workload_identity_token};
//! # tokio_test::block_on(async {
//! let request = WorkloadIdentityRequest {
//!     ci_token_request_url: std::env::var("ACTIONS_ID_TOKEN_REQUEST_URL")?,
//!     ci_token_request_token: std::env::var("ACTIONS_ID_TOKEN_REQUEST_TOKEN")?,
//!     workload_identity_provider:
//!         "projects/123456789/locations/global/workloadIdentityPools/my-pool/providers/my-provider".into(),
//!     service_account: "my-service-account@my-project.iam.gserviceaccount.com".into(),
//!     target_audience: "https://helloworld-snjhz2q4pa-uc.a.run.app".into(),
//! };
//! let id_token = workload_identity_token(&request).await?;
//! let response = reqwest::Client::new()
//!     .get("https://helloworld-snjhz2q4pa-uc.a.run.app/api/v1/hello")
//!     .bearer_auth(id_token)
//!     .send()
//!     .await?;
//! # Ok::<(), anyhow::Error>(())
//! # });
//! ```
//!
//! [Application Default Credentials]: https://cloud.google.com/docs/authentication/application-default-credentials
//! [ID token]: https://cloud.google.com/docs/authentication/token-types#identity-tokens
//! [Security Token Service]: https://cloud.google.com/iam/docs/reference/sts/rest

pub mod build_errors;
pub mod errors;

/// Protocol constants for the token exchanges.
pub mod constants;

/// Endpoint configuration.
pub mod options;

pub mod ci_token;
pub mod impersonate;
pub mod sts_exchange;
pub mod workload_identity;

pub mod credentials;

/// Types and traits to work with auth tokens.
pub mod token;

pub mod proxy;
pub mod transport;

/// The token cache
pub(crate) mod token_cache;

pub(crate) mod http;

/// A `Result` alias where the `Err` case is `opc_oidc::errors::Error`.
pub type Result<T> = std::result::Result<T, crate::errors::Error>;

/// A `Result` alias where the `Err` case is `opc_oidc::build_errors::Error`.
pub type BuildResult<T> = std::result::Result<T, crate::build_errors::Error>;
