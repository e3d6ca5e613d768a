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

//! Fetch the federation token from the CI platform.
//!
//! GitHub Actions exposes an OIDC token endpoint to jobs with the
//! `id-token: write` permission. The endpoint URL and a bearer token for it
//! are published in the `ACTIONS_ID_TOKEN_REQUEST_URL` and
//! `ACTIONS_ID_TOKEN_REQUEST_TOKEN` environment variables. This module does
//! not read them, the caller passes their values.

use crate::Result;
use crate::errors::{Error, Step};
use crate::http::HttpClient;
use crate::options::Endpoints;
use http::header::AUTHORIZATION;
use reqwest::Method;

const STEP: Step = Step::FederationToken;

#[derive(Debug, serde::Deserialize)]
struct CiTokenResponse {
    value: String,
}

/// The URL used to request a federation token for the given provider.
///
/// The audience is appended verbatim, the CI platform expects it unescaped.
pub(crate) fn ci_token_url(endpoints: &Endpoints, request_url: &str, provider_path: &str) -> String {
    format!(
        "{request_url}&audience={}",
        endpoints.ci_audience(provider_path)
    )
}

/// Requests a federation token scoped to the workload identity provider.
///
/// Issues `GET <request_url>&audience=https://iam.googleapis.com/<provider_path>`
/// with `Authorization: Bearer <request_token>` and returns the `value`
/// field of the `{count, value}` response. `count` is ignored.
pub(crate) async fn fetch_federation_token(
    client: &HttpClient,
    endpoints: &Endpoints,
    request_url: &str,
    request_token: &str,
    provider_path: &str,
) -> Result<String> {
    let url = ci_token_url(endpoints, request_url, provider_path);
    let builder = client
        .request(STEP, Method::GET, &url)?
        .header(AUTHORIZATION, format!("Bearer {request_token}"));
    let response = client.execute::<CiTokenResponse>(STEP, builder).await?;
    if response.value.is_empty() {
        return Err(Error::decode(STEP, EmptyToken));
    }
    Ok(response.value)
}

#[derive(thiserror::Error, Debug)]
#[error("the response contains an empty `value`")]
struct EmptyToken;
