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

use httptest::{Expectation, Server, matchers::*, responders::*};
use opc_oidc::errors::Step;
use opc_oidc::options::Endpoints;
use opc_oidc::sts_exchange::ExchangeRequest;
use opc_oidc::workload_identity::{Exchanger, WorkloadIdentityRequest};
use serde_json::json;

type TestResult = anyhow::Result<()>;

const PROVIDER: &str = "projects/123/locations/global/workloadIdentityPools/p/providers/q";
const SERVICE_ACCOUNT: &str = "deployer@my-project.iam.gserviceaccount.com";

fn exchanger(server: &Server) -> Exchanger {
    Exchanger::builder()
        .with_client(reqwest::Client::new())
        .with_endpoints(
            Endpoints::default()
                .with_sts_url(server.url_str("/v1/token"))
                .with_iam_credentials_url(server.url_str("/")),
        )
        .build()
}

fn request(server: &Server) -> WorkloadIdentityRequest {
    WorkloadIdentityRequest {
        ci_token_request_url: server.url_str("/_apis/token?api-version=2.0"),
        ci_token_request_token: "ci-request-token".into(),
        workload_identity_provider: PROVIDER.into(),
        service_account: SERVICE_ACCOUNT.into(),
        target_audience: "https://helloworld.example.run.app".into(),
    }
}

#[tokio::test]
async fn exchange_three_steps_in_order() -> TestResult {
    let server = Server::run();
    let sts_body = serde_json::to_value(ExchangeRequest::new(
        &Endpoints::default(),
        PROVIDER,
        "fed-tok",
    ))?;
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/_apis/token"),
            request::query(url_decoded(contains(("api-version", "2.0")))),
            request::query(url_decoded(contains((
                "audience",
                "https://iam.googleapis.com/projects/123/locations/global/workloadIdentityPools/p/providers/q"
            )))),
            request::headers(contains(("authorization", "Bearer ci-request-token"))),
        ])
        .times(1)
        .respond_with(json_encoded(json!({"count": 1, "value": "fed-tok"}))),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/v1/token"),
            request::body(json_decoded(eq(sts_body))),
        ])
        .times(1)
        .respond_with(json_encoded(json!({
            "access_token": "acc-tok",
            "issued_token_type": "urn:ietf:params:oauth:token-type:access_token",
            "token_type": "Bearer",
            "expires_in": 3600,
        }))),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path(
                "POST",
                "/v1/projects/-/serviceAccounts/deployer@my-project.iam.gserviceaccount.com:generateIdToken"
            ),
            request::headers(contains(("authorization", "Bearer acc-tok"))),
            request::body(json_decoded(eq(json!({
                "audience": "https://helloworld.example.run.app"
            })))),
        ])
        .times(1)
        .respond_with(json_encoded(json!({"token": "id-tok-xyz"}))),
    );

    let id_token = exchanger(&server).exchange(&request(&server)).await?;
    assert_eq!(id_token, "id-tok-xyz");
    Ok(())
}

#[tokio::test]
async fn impersonation_failure_is_reported() -> TestResult {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/_apis/token"))
            .respond_with(json_encoded(json!({"count": 1, "value": "fed-tok"}))),
    );
    server.expect(
        Expectation::matching(request::method_path("POST", "/v1/token"))
            .respond_with(json_encoded(json!({"access_token": "acc-tok"}))),
    );
    server.expect(
        Expectation::matching(request::method_path(
            "POST",
            "/v1/projects/-/serviceAccounts/deployer@my-project.iam.gserviceaccount.com:generateIdToken",
        ))
        .respond_with(status_code(403).body("Permission 'iam.serviceAccounts.getOpenIdToken' denied")),
    );

    let err = exchanger(&server)
        .exchange(&request(&server))
        .await
        .unwrap_err();
    assert_eq!(err.step(), Step::GenerateIdToken);
    assert_eq!(err.http_status(), Some(http::StatusCode::FORBIDDEN));
    assert!(err.to_string().contains("getOpenIdToken"), "{err}");
    Ok(())
}

#[tokio::test]
async fn ci_failure_skips_later_steps() -> TestResult {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/_apis/token"))
            .respond_with(status_code(401).body("invalid bearer token")),
    );
    server.expect(
        Expectation::matching(request::method("POST"))
            .times(0)
            .respond_with(status_code(500)),
    );

    let err = exchanger(&server)
        .exchange(&request(&server))
        .await
        .unwrap_err();
    assert_eq!(err.step(), Step::FederationToken);
    assert_eq!(err.http_status(), Some(http::StatusCode::UNAUTHORIZED));
    Ok(())
}
