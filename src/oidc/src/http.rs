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

use crate::Result;
use crate::constants::APPLICATION_JSON;
use crate::errors::{Error, Step};
use http::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use url::Url;

/// Serializes an outgoing JSON body, indented.
pub(crate) fn json_body<T>(step: Step, body: &T) -> Result<Vec<u8>>
where
    T: serde::Serialize + ?Sized,
{
    serde_json::to_vec_pretty(body).map_err(|e| Error::marshal(step, e))
}

/// A thin wrapper over `reqwest::Client` shared by the exchange steps.
///
/// Every call is a single attempt. Failures are reported as [Error] values
/// tagged with the step that issued the request.
#[derive(Clone, Debug, Default)]
pub(crate) struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub(crate) fn new(inner: reqwest::Client) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &reqwest::Client {
        &self.inner
    }

    /// Starts a request, validating the URL first.
    pub(crate) fn request(&self, step: Step, method: Method, url: &str) -> Result<RequestBuilder> {
        let url = Url::parse(url).map_err(|e| Error::request_construction(step, e))?;
        Ok(self.inner.request(method, url))
    }

    /// Starts a `POST` request with a pretty-printed JSON body.
    pub(crate) fn post_json<T>(&self, step: Step, url: &str, body: &T) -> Result<RequestBuilder>
    where
        T: serde::Serialize + ?Sized,
    {
        let body = json_body(step, body)?;
        let builder = self
            .request(step, Method::POST, url)?
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .header(ACCEPT, APPLICATION_JSON)
            .body(body);
        Ok(builder)
    }

    /// Sends the request and decodes a successful JSON response.
    pub(crate) async fn execute<O>(&self, step: Step, builder: RequestBuilder) -> Result<O>
    where
        O: serde::de::DeserializeOwned,
    {
        let request = builder
            .build()
            .map_err(|e| Error::request_construction(step, e))?;
        tracing::debug!(?step, method = %request.method(), url = %request.url(), "sending request");

        let response = self
            .inner
            .execute(request)
            .await
            .map_err(|e| Error::transport(step, e))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::read_body(step, e))?;

        if !status.is_success() {
            tracing::debug!(?step, %status, "request failed");
            return Err(Error::http_status_error(
                step,
                status,
                String::from_utf8_lossy(&body),
            ));
        }
        tracing::debug!(?step, %status, "request succeeded");
        serde_json::from_slice::<O>(&body).map_err(|e| Error::decode(step, e))
    }
}
