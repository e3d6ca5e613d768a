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

//! Errors returned while exchanging or using tokens.
//!
//! Every error is terminal: none of the operations in this crate retry. The
//! error records which [Step] failed and why, so callers can log it and abort.

use http::StatusCode;
use std::sync::Arc;

type ArcError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// The operation that produced an [Error].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Step {
    /// Fetching the federation token from the CI platform.
    FederationToken,
    /// Exchanging the federation token at the Security Token Service.
    StsExchange,
    /// Generating the ID token for the target audience.
    GenerateIdToken,
    /// Refreshing a credential, or turning it into a request header.
    Credentials,
    /// Forwarding a request through the authenticated transport.
    Forward,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Step::FederationToken => "cannot fetch the CI federation token",
            Step::StsExchange => "cannot exchange the federation token for an access token",
            Step::GenerateIdToken => "cannot generate the ID token",
            Step::Credentials => "cannot refresh the credentials",
            Step::Forward => "cannot forward the request",
        };
        f.write_str(msg)
    }
}

/// The error type for token exchanges and credential refreshes.
///
/// Applications rarely need to create instances of this error type. The
/// exception might be when testing application code, where the application is
/// mocking a [TokenProvider](crate::token::TokenProvider).
#[derive(thiserror::Error, Clone, Debug)]
#[error("{step}: {kind}")]
pub struct Error {
    step: Step,
    #[source]
    kind: ErrorKind,
}

impl Error {
    /// The operation that failed.
    pub fn step(&self) -> Step {
        self.step
    }

    /// The outgoing request could not be built, for example, because the URL
    /// is malformed or a header value contains invalid characters.
    pub fn is_request_construction(&self) -> bool {
        matches!(self.kind, ErrorKind::RequestConstruction(_))
    }

    /// The request could not be sent or no response was received.
    pub fn is_transport(&self) -> bool {
        matches!(self.kind, ErrorKind::Transport(_))
    }

    /// The service answered with a non-success status code.
    pub fn is_http_status(&self) -> bool {
        matches!(self.kind, ErrorKind::HttpStatus { .. })
    }

    /// The status code, if the service answered with a non-success status.
    pub fn http_status(&self) -> Option<StatusCode> {
        match &self.kind {
            ErrorKind::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The response body could not be read.
    pub fn is_read_body(&self) -> bool {
        matches!(self.kind, ErrorKind::ReadBody(_))
    }

    /// The response body is not the expected JSON document.
    pub fn is_decode(&self) -> bool {
        matches!(self.kind, ErrorKind::Decode(_))
    }

    /// The request body could not be serialized.
    pub fn is_marshal(&self) -> bool {
        matches!(self.kind, ErrorKind::Marshal(_))
    }

    /// The base credentials returned a token without an `id_token` claim.
    pub fn is_missing_id_token(&self) -> bool {
        matches!(self.kind, ErrorKind::MissingIdToken)
    }

    /// Creates an error representing a failure to build the outgoing request.
    pub fn request_construction<T>(step: Step, source: T) -> Self
    where
        T: std::error::Error + Send + Sync + 'static,
    {
        Self::new(step, ErrorKind::RequestConstruction(Arc::new(source)))
    }

    /// Creates an error representing a failure to send the request.
    pub fn transport<T>(step: Step, source: T) -> Self
    where
        T: std::error::Error + Send + Sync + 'static,
    {
        Self::new(step, ErrorKind::Transport(Arc::new(source)))
    }

    /// Creates an error representing a non-success response.
    pub fn http_status_error<B: Into<String>>(step: Step, status: StatusCode, body: B) -> Self {
        Self::new(
            step,
            ErrorKind::HttpStatus {
                status,
                body: body.into(),
            },
        )
    }

    /// Creates an error representing a failure to read the response body.
    pub fn read_body<T>(step: Step, source: T) -> Self
    where
        T: std::error::Error + Send + Sync + 'static,
    {
        Self::new(step, ErrorKind::ReadBody(Arc::new(source)))
    }

    /// Creates an error representing a failure to decode the response body.
    pub fn decode<T>(step: Step, source: T) -> Self
    where
        T: std::error::Error + Send + Sync + 'static,
    {
        Self::new(step, ErrorKind::Decode(Arc::new(source)))
    }

    /// Creates an error representing a failure to serialize the request body.
    pub fn marshal<T>(step: Step, source: T) -> Self
    where
        T: std::error::Error + Send + Sync + 'static,
    {
        Self::new(step, ErrorKind::Marshal(Arc::new(source)))
    }

    /// Creates an error for a base token without an `id_token` claim.
    pub fn missing_id_token() -> Self {
        Self::new(Step::Credentials, ErrorKind::MissingIdToken)
    }

    fn new(step: Step, kind: ErrorKind) -> Self {
        Self { step, kind }
    }
}

#[derive(thiserror::Error, Clone, Debug)]
enum ErrorKind {
    #[error("cannot build the request: {0}")]
    RequestConstruction(#[source] ArcError),
    #[error("the request failed: {0}")]
    Transport(#[source] ArcError),
    #[error("the service returned {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },
    #[error("cannot read the response body: {0}")]
    ReadBody(#[source] ArcError),
    #[error("cannot decode the response body: {0}")]
    Decode(#[source] ArcError),
    #[error("cannot serialize the request body: {0}")]
    Marshal(#[source] ArcError),
    #[error("the token did not contain an id_token")]
    MissingIdToken,
}
