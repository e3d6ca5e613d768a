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

//! An HTTP client that authenticates every request with an ID token.
//!
//! ## Example
//! ```no_run
//! # use opc_oidc::transport::new_transport;
//! # tokio_test::block_on(async {
//! let transport = new_transport().await?;
//! let request = transport
//!     .client()
//!     .get("https://my-service.example.com/api/v1/hello")
//!     .build()?;
//! let response = transport.execute(request).await?;
//! # Ok::<(), anyhow::Error>(())
//! # });
//! ```

use crate::credentials::{self, IdTokenCredentials};
use crate::errors::{Error, Step};
use crate::{BuildResult, Result};
use http::header::AUTHORIZATION;

/// Sends requests with an `Authorization` header from [IdTokenCredentials].
#[derive(Clone, Debug)]
pub struct AuthenticatedTransport {
    client: reqwest::Client,
    credentials: IdTokenCredentials,
}

impl AuthenticatedTransport {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// The client used to send requests.
    ///
    /// Use it to build requests for [execute][AuthenticatedTransport::execute].
    /// Requests sent directly through this client are not authenticated.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn credentials(&self) -> &IdTokenCredentials {
        &self.credentials
    }

    /// Sends `request`, replacing any `Authorization` header it carries.
    ///
    /// The response is returned for any status code. Errors obtaining the
    /// credentials are reported as [Step::Credentials], errors sending the
    /// request as [Step::Forward].
    pub async fn execute(&self, mut request: reqwest::Request) -> Result<reqwest::Response> {
        let header = self.credentials.authorization_header().await?;
        request.headers_mut().insert(AUTHORIZATION, header);
        tracing::debug!(method = %request.method(), url = %request.url(), "sending authenticated request");
        self.client
            .execute(request)
            .await
            .map_err(|e| Error::transport(Step::Forward, e))
    }
}

/// A builder for [AuthenticatedTransport].
#[derive(Debug, Default)]
pub struct Builder {
    client: Option<reqwest::Client>,
    credentials: Option<IdTokenCredentials>,
}

impl Builder {
    /// Sets the client used to send requests and to refresh the default
    /// credentials.
    pub fn with_client(mut self, v: reqwest::Client) -> Self {
        self.client = Some(v);
        self
    }

    /// Uses `v` instead of the default credentials.
    pub fn with_credentials(mut self, v: IdTokenCredentials) -> Self {
        self.credentials = Some(v);
        self
    }

    /// Creates the transport.
    ///
    /// Without explicit credentials this searches for the default
    /// credentials, and fails if there are none.
    pub async fn build(self) -> BuildResult<AuthenticatedTransport> {
        let client = self.client.unwrap_or_default();
        let credentials = match self.credentials {
            Some(c) => c,
            None => {
                credentials::Builder::default()
                    .with_client(client.clone())
                    .build()
                    .await?
            }
        };
        Ok(AuthenticatedTransport {
            client,
            credentials,
        })
    }
}

/// Creates a transport backed by the default credentials.
pub async fn new_transport() -> BuildResult<AuthenticatedTransport> {
    Builder::default().build().await
}
