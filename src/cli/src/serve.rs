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

//! Serves a [ReverseProxy] over HTTP/1.1.

use axum::Router;
use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use http_body_util::BodyExt;
use opc_oidc::proxy::ReverseProxy;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;

pub(crate) fn router(proxy: ReverseProxy) -> Router {
    Router::new().fallback(forward).with_state(proxy)
}

/// Serves `proxy` on `listener` until `shutdown` completes.
pub(crate) async fn run<F>(listener: TcpListener, proxy: ReverseProxy, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(proxy).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn forward(
    State(proxy): State<ReverseProxy>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let body = match body.collect().await {
        Ok(b) => b.to_bytes(),
        Err(e) => {
            tracing::warn!("cannot read request body: {e}");
            return (StatusCode::BAD_REQUEST, "cannot read request body").into_response();
        }
    };
    let method = parts.method.clone();
    let path = parts.uri.path().to_string();
    match proxy
        .forward(http::Request::from_parts(parts, body), Some(client.ip()))
        .await
    {
        Ok(response) => {
            tracing::debug!(%method, %path, status = %response.status(), "forwarded");
            response.map(Body::new).into_response()
        }
        Err(e) => {
            tracing::error!(%method, %path, "cannot forward request: {e}");
            (StatusCode::BAD_GATEWAY, "bad gateway").into_response()
        }
    }
}

/// Completes on Ctrl-C, or on SIGTERM where supported.
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::error!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use opc_oidc::credentials::Builder as CredentialsBuilder;
    use opc_oidc::token::{Token, TokenProvider};
    use opc_oidc::transport::AuthenticatedTransport;
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;

    type TestResult = anyhow::Result<()>;

    #[derive(Debug)]
    struct FakeBase {
        id_token: Option<&'static str>,
    }

    #[async_trait::async_trait]
    impl TokenProvider for FakeBase {
        async fn token(&self) -> opc_oidc::Result<Token> {
            Ok(Token {
                token: "test-access-token".into(),
                token_type: "Bearer".into(),
                expires_at: None,
                id_token: self.id_token.map(str::to_string),
            })
        }
    }

    async fn upstream() -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
        let app = Router::new().fallback(|request: Request| async move {
            let auth = request
                .headers()
                .get(http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let forwarded = request
                .headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            format!("{} {} {auth} {forwarded}", request.method(), request.uri())
        });
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok((addr, server))
    }

    async fn start_proxy(
        target: String,
        id_token: Option<&'static str>,
    ) -> anyhow::Result<(SocketAddr, oneshot::Sender<()>, JoinHandle<std::io::Result<()>>)> {
        let credentials = CredentialsBuilder::from_provider(FakeBase { id_token })
            .build()
            .await?;
        let transport = AuthenticatedTransport::builder()
            .with_credentials(credentials)
            .build()
            .await?;
        let proxy = ReverseProxy::new(&target, transport)?;
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(run(listener, proxy, async move {
            let _ = rx.await;
        }));
        Ok((addr, tx, server))
    }

    #[tokio::test]
    async fn forwards_with_id_token() -> TestResult {
        let (upstream, _upstream) = upstream().await?;
        let (addr, shutdown, server) =
            start_proxy(format!("http://{upstream}/base"), Some("test-id-token")).await?;

        let response = reqwest::get(format!("http://{addr}/hello?name=world")).await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.text().await?,
            "GET /base/hello?name=world Bearer test-id-token 127.0.0.1"
        );

        let _ = shutdown.send(());
        server.await??;
        Ok(())
    }

    #[tokio::test]
    async fn credentials_error_is_bad_gateway() -> TestResult {
        let (upstream, _upstream) = upstream().await?;
        let (addr, shutdown, server) = start_proxy(format!("http://{upstream}"), None).await?;

        let response = reqwest::get(format!("http://{addr}/hello")).await?;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let _ = shutdown.send(());
        server.await??;
        Ok(())
    }

    #[tokio::test]
    async fn upstream_down_is_bad_gateway() -> TestResult {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let upstream = listener.local_addr()?;
        drop(listener);
        let (addr, shutdown, server) =
            start_proxy(format!("http://{upstream}"), Some("test-id-token")).await?;

        let response = reqwest::get(format!("http://{addr}/hello")).await?;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let _ = shutdown.send(());
        server.await??;
        Ok(())
    }
}
