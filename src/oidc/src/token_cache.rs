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
use crate::token::{Token, TokenProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
// Using tokio's wrapper makes the cache testable without relying on clock times.
use tokio::time::Instant;

/// Tokens are refreshed this long before they expire.
pub(crate) const EARLY_EXPIRY: Duration = Duration::from_secs(10);

/// Caches the token of `T`, refreshing it once it is about to expire.
///
/// At most one refresh is in flight. Callers that arrive while a refresh is
/// running wait for it and share its result, including errors. Errors are
/// never served to callers that arrive after the refresh completed, those
/// start a new refresh.
#[derive(Debug)]
pub(crate) struct TokenCache<T>
where
    T: TokenProvider,
{
    // The result of the last refresh, tagged with the number of refreshes
    // completed so far.
    state: Arc<Mutex<CacheState>>,

    // Held for the duration of a refresh.
    refresh_in_progress: Arc<Mutex<()>>,

    // The token provider. This thing does the refreshing.
    inner: Arc<T>,
}

#[derive(Debug, Default)]
struct CacheState {
    generation: u64,
    last: Option<Result<Token>>,
}

fn fresh(token: &Token) -> bool {
    token
        .expires_at
        .is_none_or(|e| Instant::now() + EARLY_EXPIRY < e)
}

// Implemented by hand, deriving would require `T: Clone`.
impl<T: TokenProvider> Clone for TokenCache<T> {
    fn clone(&self) -> TokenCache<T> {
        TokenCache {
            state: self.state.clone(),
            refresh_in_progress: self.refresh_in_progress.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<T: TokenProvider> TokenCache<T> {
    pub(crate) fn new(inner: T) -> TokenCache<T> {
        TokenCache {
            state: Arc::new(Mutex::new(CacheState::default())),
            refresh_in_progress: Arc::new(Mutex::new(())),
            inner: Arc::new(inner),
        }
    }
}

#[async_trait::async_trait]
impl<T: TokenProvider + 'static> TokenProvider for TokenCache<T> {
    async fn token(&self) -> Result<Token> {
        let seen = {
            let state = self.state.lock().await;
            if let Some(Ok(token)) = &state.last {
                if fresh(token) {
                    return Ok(token.clone());
                }
            }
            state.generation
        };

        let _guard = self.refresh_in_progress.lock().await;

        // Another caller completed a refresh while we waited for the guard.
        {
            let state = self.state.lock().await;
            if state.generation != seen {
                if let Some(last) = &state.last {
                    return last.clone();
                }
            }
        }

        tracing::debug!("refreshing token");
        let result = self.inner.token().await;
        let mut state = self.state.lock().await;
        state.generation += 1;
        state.last = Some(result.clone());
        result
    }
}
