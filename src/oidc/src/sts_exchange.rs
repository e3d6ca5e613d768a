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

//! Exchange a federation token at the Security Token Service (STS).
//!
//! Reference: <https://datatracker.ietf.org/doc/html/rfc8693>

use crate::Result;
use crate::constants::{ACCESS_TOKEN_TYPE, DEFAULT_SCOPE, JWT_TOKEN_TYPE, TOKEN_EXCHANGE_GRANT_TYPE};
use crate::errors::{Error, Step};
use crate::http::HttpClient;
use crate::options::Endpoints;
use serde::{Deserialize, Serialize};

const STEP: Step = Step::StsExchange;

/// The body of an OAuth 2.0 token exchange request.
///
/// All fields other than `subject_token` are protocol constants, or derived
/// from the workload identity provider.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRequest {
    pub audience: String,
    pub grant_type: String,
    pub requested_token_type: String,
    pub scope: String,
    pub subject_token: String,
    pub subject_token_type: String,
}

impl ExchangeRequest {
    /// Creates the request that exchanges `subject_token` for an access token.
    ///
    /// `provider_path` is the workload identity provider resource name, e.g.
    /// `projects/123456789/locations/global/workloadIdentityPools/my-pool/providers/my-provider`.
    pub fn new<S: Into<String>>(endpoints: &Endpoints, provider_path: &str, subject_token: S) -> Self {
        Self {
            audience: endpoints.sts_audience(provider_path),
            grant_type: TOKEN_EXCHANGE_GRANT_TYPE.to_string(),
            requested_token_type: ACCESS_TOKEN_TYPE.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            subject_token: subject_token.into(),
            subject_token_type: JWT_TOKEN_TYPE.to_string(),
        }
    }
}

impl std::fmt::Debug for ExchangeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeRequest")
            .field("audience", &self.audience)
            .field("grant_type", &self.grant_type)
            .field("requested_token_type", &self.requested_token_type)
            .field("scope", &self.scope)
            .field("subject_token", &"[censored]")
            .field("subject_token_type", &self.subject_token_type)
            .finish()
    }
}

/// The successful response of a token exchange.
///
/// Only `access_token` is used, the remaining fields in the response are
/// ignored.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchanges the federation token for a short-lived access token.
pub(crate) async fn exchange_token(
    client: &HttpClient,
    endpoints: &Endpoints,
    provider_path: &str,
    federation_token: &str,
) -> Result<String> {
    let request = ExchangeRequest::new(endpoints, provider_path, federation_token);
    let builder = client.post_json(STEP, endpoints.sts_url(), &request)?;
    let response = client.execute::<TokenResponse>(STEP, builder).await?;
    if response.access_token.is_empty() {
        return Err(Error::decode(STEP, EmptyAccessToken));
    }
    Ok(response.access_token)
}

#[derive(thiserror::Error, Debug)]
#[error("the response contains an empty `access_token`")]
struct EmptyAccessToken;
