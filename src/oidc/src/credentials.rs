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

//! Cached ID token credentials.
//!
//! [IdTokenCredentials] turns a base credential into a source of ID tokens.
//! Each refresh of the base credential must carry an ID token alongside the
//! access token. The ID token becomes the bearer token, with the expiry of
//! the base token.
//!
//! Tokens are cached and shared across clones. A cached token is returned
//! until 10 seconds before it expires. After that, exactly one refresh runs
//! at a time, regardless of the number of concurrent callers.
//!
//! By default the base credential is found using [Application Default
//! Credentials]:
//!
//! 1. The file named by the `GOOGLE_APPLICATION_CREDENTIALS` environment
//!    variable.
//! 2. The file created by `gcloud auth application-default login`.
//! 3. The metadata service, when running on Google Cloud.
//!
//! ## Example
//! ```no_run
//! # use opc_oidc::credentials::Builder;
//! # tokio_test::block_on(async {
//! let credentials = Builder::default().build().await?;
//! let header = credentials.authorization_header().await?;
//! # Ok::<(), anyhow::Error>(())
//! # });
//! ```
//!
//! [Application Default Credentials]: https://cloud.google.com/docs/authentication/application-default-credentials

pub(crate) mod mds;
pub(crate) mod user_account;

use crate::errors::{Error, Step};
use crate::http::HttpClient;
use crate::token::{Token, TokenProvider};
use crate::token_cache::TokenCache;
use crate::{BuildResult, Result, build_errors};
use http::HeaderValue;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const GOOGLE_APPLICATION_CREDENTIALS_ENV_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Maps each base token to a bearer token holding its ID token.
#[derive(Debug)]
pub(crate) struct IdTokenSource<T>
where
    T: TokenProvider,
{
    base: T,
}

impl<T: TokenProvider> IdTokenSource<T> {
    pub(crate) fn new(base: T) -> Self {
        Self { base }
    }
}

#[async_trait::async_trait]
impl<T: TokenProvider> TokenProvider for IdTokenSource<T> {
    async fn token(&self) -> Result<Token> {
        let base = self.base.token().await?;
        match base.id_token {
            Some(id_token) if !id_token.is_empty() => Ok(Token {
                token: id_token,
                token_type: "Bearer".to_string(),
                expires_at: base.expires_at,
                id_token: None,
            }),
            _ => Err(Error::missing_id_token()),
        }
    }
}

/// A cached, thread-safe source of ID tokens.
///
/// Cloning is cheap, all clones share the same cache.
#[derive(Clone, Debug)]
pub struct IdTokenCredentials {
    inner: Arc<dyn TokenProvider>,
}

impl IdTokenCredentials {
    fn new<T>(base: T) -> Self
    where
        T: TokenProvider + 'static,
    {
        Self {
            inner: Arc::new(TokenCache::new(IdTokenSource::new(base))),
        }
    }

    /// Returns the current ID token, refreshing it if needed.
    pub async fn token(&self) -> Result<Token> {
        self.inner.token().await
    }

    /// Returns the value for an `Authorization` header.
    ///
    /// The value is marked as sensitive.
    pub async fn authorization_header(&self) -> Result<HeaderValue> {
        let token = self.token().await?;
        let mut value = HeaderValue::from_str(&format!("{} {}", token.token_type, token.token))
            .map_err(|e| Error::request_construction(Step::Credentials, e))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

/// A builder for [IdTokenCredentials].
#[derive(Debug, Default)]
pub struct Builder {
    base: Option<Arc<dyn TokenProvider>>,
    client: Option<reqwest::Client>,
}

impl Builder {
    /// Uses `provider` as the base credential instead of searching for one.
    ///
    /// The tokens returned by `provider` must set [Token::id_token].
    pub fn from_provider<T>(provider: T) -> Self
    where
        T: TokenProvider + 'static,
    {
        Self {
            base: Some(Arc::new(provider)),
            client: None,
        }
    }

    /// Sets the HTTP client used to refresh the base credential.
    pub fn with_client(mut self, v: reqwest::Client) -> Self {
        self.client = Some(v);
        self
    }

    /// Creates the credentials.
    ///
    /// Fails if no base credential was configured and none can be found in
    /// the environment. The credentials are not refreshed until first used.
    pub async fn build(self) -> BuildResult<IdTokenCredentials> {
        let base = match self.base {
            Some(base) => base,
            None => {
                let client = self.client.map(HttpClient::new).unwrap_or_default();
                discover(client).await?
            }
        };
        Ok(IdTokenCredentials::new(base))
    }
}

async fn discover(client: HttpClient) -> BuildResult<Arc<dyn TokenProvider>> {
    if let Some(path) = adc_path_from_env() {
        tracing::debug!(path = %path.display(), "loading credentials from {GOOGLE_APPLICATION_CREDENTIALS_ENV_VAR}");
        return load_file(client, &path);
    }
    if let Some(path) = adc_well_known_path() {
        if path.exists() {
            tracing::debug!(path = %path.display(), "loading gcloud credentials");
            return load_file(client, &path);
        }
    }
    if let Some(endpoint) = mds::detect(&client).await {
        tracing::debug!(%endpoint, "using metadata service credentials");
        return Ok(Arc::new(mds::MdsTokenProvider::new(client, endpoint)));
    }
    Err(build_errors::Error::no_default_credentials())
}

fn adc_path_from_env() -> Option<PathBuf> {
    std::env::var_os(GOOGLE_APPLICATION_CREDENTIALS_ENV_VAR)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// The path of the file created by `gcloud auth application-default login`.
fn adc_well_known_path() -> Option<PathBuf> {
    let mut path = if cfg!(windows) {
        PathBuf::from(std::env::var_os("APPDATA")?)
    } else {
        let mut home = PathBuf::from(std::env::var_os("HOME")?);
        home.push(".config");
        home
    };
    path.push("gcloud");
    path.push("application_default_credentials.json");
    Some(path)
}

fn load_file(client: HttpClient, path: &Path) -> BuildResult<Arc<dyn TokenProvider>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        build_errors::Error::loading(format!("{}: {e}", path.display()))
    })?;
    let json = serde_json::from_str::<serde_json::Value>(&contents)
        .map_err(build_errors::Error::parsing)?;
    let cred_type = json
        .get("type")
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .ok_or_else(|| build_errors::Error::parsing("missing `type` field"))?;
    match cred_type.as_str() {
        "authorized_user" => Ok(Arc::new(user_account::from_json(client, json)?)),
        other => Err(build_errors::Error::unknown_type(format!(
            "{other}, only `authorized_user` credentials can produce ID tokens"
        ))),
    }
}
