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

const CI_AUDIENCE_PREFIX: &str = "https://iam.googleapis.com/";
const STS_AUDIENCE_PREFIX: &str = "//iam.googleapis.com/";
const STS_URL: &str = "https://sts.googleapis.com/v1/token";
const IAM_CREDENTIALS_URL: &str = "https://iamcredentials.googleapis.com";

/// The endpoints used by the workload identity exchange.
///
/// The defaults are the production Google Cloud endpoints. Applications only
/// need to change them to talk to a test server.
///
/// # Example
/// ```
/// # use opc_oidc::options::Endpoints;
/// let endpoints = Endpoints::default().with_sts_url("http://127.0.0.1:8080/v1/token");
/// assert_eq!(endpoints.sts_url(), "http://127.0.0.1:8080/v1/token");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Endpoints {
    ci_audience_prefix: String,
    sts_audience_prefix: String,
    sts_url: String,
    iam_credentials_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            ci_audience_prefix: CI_AUDIENCE_PREFIX.to_string(),
            sts_audience_prefix: STS_AUDIENCE_PREFIX.to_string(),
            sts_url: STS_URL.to_string(),
            iam_credentials_url: IAM_CREDENTIALS_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// Sets the URL of the Security Token Service exchange endpoint.
    ///
    /// Defaults to `https://sts.googleapis.com/v1/token`.
    pub fn with_sts_url<S: Into<String>>(mut self, v: S) -> Self {
        self.sts_url = v.into();
        self
    }

    /// Sets the root URL of the IAM Credentials service.
    ///
    /// Defaults to `https://iamcredentials.googleapis.com`. The path
    /// `/v1/projects/-/serviceAccounts/{sa}:generateIdToken` is appended.
    pub fn with_iam_credentials_url<S: Into<String>>(mut self, v: S) -> Self {
        self.iam_credentials_url = v.into();
        self
    }

    pub fn sts_url(&self) -> &str {
        &self.sts_url
    }

    pub fn iam_credentials_url(&self) -> &str {
        &self.iam_credentials_url
    }

    /// The audience requested from the CI platform for a given provider.
    pub fn ci_audience(&self, provider_path: &str) -> String {
        format!("{}{provider_path}", self.ci_audience_prefix)
    }

    /// The audience sent to the Security Token Service for a given provider.
    pub fn sts_audience(&self, provider_path: &str) -> String {
        format!("{}{provider_path}", self.sts_audience_prefix)
    }

    /// The `generateIdToken` URL for a given service account.
    pub fn generate_id_token_url(&self, service_account: &str) -> String {
        format!(
            "{}/v1/projects/-/serviceAccounts/{service_account}:generateIdToken",
            self.iam_credentials_url.trim_end_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROVIDER: &str = "projects/123/locations/global/workloadIdentityPools/p/providers/q";

    #[test]
    fn defaults() {
        let endpoints = Endpoints::default();
        assert_eq!(endpoints.sts_url(), "https://sts.googleapis.com/v1/token");
        assert_eq!(
            endpoints.ci_audience(PROVIDER),
            "https://iam.googleapis.com/projects/123/locations/global/workloadIdentityPools/p/providers/q"
        );
        assert_eq!(
            endpoints.sts_audience(PROVIDER),
            "//iam.googleapis.com/projects/123/locations/global/workloadIdentityPools/p/providers/q"
        );
        assert_eq!(
            endpoints.generate_id_token_url("sa@p.iam.gserviceaccount.com"),
            "https://iamcredentials.googleapis.com/v1/projects/-/serviceAccounts/sa@p.iam.gserviceaccount.com:generateIdToken"
        );
    }

    #[test]
    fn overrides() {
        let endpoints = Endpoints::default()
            .with_sts_url("http://localhost:1/sts")
            .with_iam_credentials_url("http://localhost:2/");
        assert_eq!(endpoints.sts_url(), "http://localhost:1/sts");
        assert_eq!(endpoints.iam_credentials_url(), "http://localhost:2/");
        assert_eq!(
            endpoints.generate_id_token_url("sa"),
            "http://localhost:2/v1/projects/-/serviceAccounts/sa:generateIdToken"
        );
    }
}
