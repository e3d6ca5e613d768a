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

//! Base credentials for [user accounts].
//!
//! These are the credentials created by `gcloud auth application-default
//! login`. Refreshing them returns an access token and, because the login
//! requests the `openid` scope, an ID token for the user.
//!
//! [user accounts]: https://cloud.google.com/docs/authentication#user-accounts

use crate::errors::Step;
use crate::http::HttpClient;
use crate::token::{Token, TokenProvider};
use crate::{BuildResult, Result, build_errors};
use std::time::Duration;
use tokio::time::Instant;

const OAUTH2_TOKEN_SERVER_URL: &str = "https://oauth2.googleapis.com/token";
const STEP: Step = Step::Credentials;

/// Creates a provider from the contents of an `authorized_user` JSON file.
pub(crate) fn from_json(client: HttpClient, json: serde_json::Value) -> BuildResult<UserTokenProvider> {
    let user = serde_json::from_value::<AuthorizedUser>(json).map_err(build_errors::Error::parsing)?;
    Ok(UserTokenProvider {
        client,
        client_id: user.client_id,
        client_secret: user.client_secret,
        refresh_token: user.refresh_token,
        endpoint: user
            .token_uri
            .unwrap_or_else(|| OAUTH2_TOKEN_SERVER_URL.to_string()),
    })
}

#[derive(Clone)]
pub(crate) struct UserTokenProvider {
    client: HttpClient,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    endpoint: String,
}

impl std::fmt::Debug for UserTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserTokenProvider")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[censored]")
            .field("refresh_token", &"[censored]")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[async_trait::async_trait]
impl TokenProvider for UserTokenProvider {
    async fn token(&self) -> Result<Token> {
        let request = Oauth2RefreshRequest {
            grant_type: RefreshGrantType::RefreshToken,
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            refresh_token: self.refresh_token.clone(),
        };
        let builder = self.client.post_json(STEP, &self.endpoint, &request)?;
        let response = self
            .client
            .execute::<Oauth2RefreshResponse>(STEP, builder)
            .await?;
        Ok(Token {
            token: response.access_token,
            token_type: response.token_type,
            expires_at: response
                .expires_in
                .map(|d| Instant::now() + Duration::from_secs(d)),
            id_token: response.id_token,
        })
    }
}

/// The `authorized_user` credentials file.
///
/// See: https://cloud.google.com/docs/authentication#user-accounts
#[derive(serde::Deserialize)]
struct AuthorizedUser {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
enum RefreshGrantType {
    #[serde(rename = "refresh_token")]
    RefreshToken,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
struct Oauth2RefreshRequest {
    grant_type: RefreshGrantType,
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
struct Oauth2RefreshResponse {
    access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_in: Option<u64>,
    token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    id_token: Option<String>,
}
