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

//! A single-host reverse proxy that authenticates with an ID token.
//!
//! [ReverseProxy] rewrites each incoming request to the target URL and sends
//! it through an [AuthenticatedTransport]. It is independent of any HTTP
//! server, callers collect the request body and write the streamed response.
//!
//! ## Example
//! ```no_run
//! # use opc_oidc::proxy::new_proxy;
//! # tokio_test::block_on(async {
//! let proxy = new_proxy("https://my-service.example.com").await?;
//! let request = http::Request::get("/api/v1/hello").body(bytes::Bytes::new())?;
//! let response = proxy.forward(request, None).await?;
//! # Ok::<(), anyhow::Error>(())
//! # });
//! ```

use crate::errors::{Error, Step};
use crate::transport::{AuthenticatedTransport, new_transport};
use crate::{BuildResult, Result, build_errors};
use bytes::Bytes;
use http::header::{CONNECTION, HOST, HeaderMap, HeaderName, HeaderValue};
use std::net::IpAddr;
use url::Url;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

// Removed in both directions, see RFC 9110 section 7.6.1.
const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Forwards requests to a single target with an ID token attached.
#[derive(Clone, Debug)]
pub struct ReverseProxy {
    target: Url,
    transport: AuthenticatedTransport,
}

impl ReverseProxy {
    /// Creates a proxy for `target_host` using an existing transport.
    ///
    /// `target_host` must be an absolute `http` or `https` URL. Its path and
    /// query are prefixed to the path and query of each request.
    pub fn new(target_host: &str, transport: AuthenticatedTransport) -> BuildResult<Self> {
        let target = parse_target(target_host)?;
        Ok(Self { target, transport })
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Sends `request` to the target and returns the upstream response.
    ///
    /// `client_addr` is the address of the downstream client. If known, it
    /// is appended to `X-Forwarded-For`. The response body is streamed.
    pub async fn forward(
        &self,
        request: http::Request<Bytes>,
        client_addr: Option<IpAddr>,
    ) -> Result<http::Response<reqwest::Body>> {
        let (parts, body) = request.into_parts();
        let url = rewrite_url(&self.target, &parts.uri);

        let mut headers = parts.headers;
        remove_hop_by_hop(&mut headers);
        headers.remove(HOST);
        if let Some(addr) = client_addr {
            append_forwarded_for(&mut headers, addr)?;
        }

        let mut outbound = reqwest::Request::new(parts.method, url);
        *outbound.headers_mut() = headers;
        if !body.is_empty() {
            *outbound.body_mut() = Some(reqwest::Body::from(body));
        }

        let response = self.transport.execute(outbound).await?;
        let mut response = http::Response::<reqwest::Body>::from(response);
        remove_hop_by_hop(response.headers_mut());
        Ok(response)
    }
}

/// Creates a proxy for `target_host` backed by the default credentials.
///
/// The target is validated before looking for credentials.
pub async fn new_proxy(target_host: &str) -> BuildResult<ReverseProxy> {
    let target = parse_target(target_host)?;
    let transport = new_transport().await?;
    Ok(ReverseProxy { target, transport })
}

fn parse_target(target_host: &str) -> BuildResult<Url> {
    let url = Url::parse(target_host)
        .map_err(|e| build_errors::Error::invalid_target(format!("{target_host}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
        return Err(build_errors::Error::invalid_target(format!(
            "{target_host}: expected an absolute http or https URL"
        )));
    }
    Ok(url)
}

fn rewrite_url(target: &Url, uri: &http::Uri) -> Url {
    let mut url = target.clone();
    url.set_path(&join_paths(target.path(), uri.path()));
    let query = match (target.query().unwrap_or_default(), uri.query().unwrap_or_default()) {
        ("", "") => None,
        (t, "") => Some(t.to_string()),
        ("", r) => Some(r.to_string()),
        (t, r) => Some(format!("{t}&{r}")),
    };
    url.set_query(query.as_deref());
    url
}

/// Joins two paths with exactly one slash between them.
fn join_paths(a: &str, b: &str) -> String {
    match (a.ends_with('/'), b.starts_with('/')) {
        (true, true) => format!("{a}{}", &b[1..]),
        (false, false) => format!("{a}/{b}"),
        _ => format!("{a}{b}"),
    }
}

fn remove_hop_by_hop(headers: &mut HeaderMap) {
    let named = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect::<Vec<_>>();
    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, addr: IpAddr) -> Result<()> {
    let prior = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>();
    let value = if prior.is_empty() {
        addr.to_string()
    } else {
        format!("{}, {addr}", prior.join(", "))
    };
    let value =
        HeaderValue::from_str(&value).map_err(|e| Error::request_construction(Step::Forward, e))?;
    headers.insert(X_FORWARDED_FOR, value);
    Ok(())
}
