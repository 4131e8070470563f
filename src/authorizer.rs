//! Request authorizer - attaches the current access token to outgoing
//! requests and performs exactly one refresh-and-retry cycle on an expiry
//! signal.
//!
//! Requests to the token endpoints themselves are excluded, so a refresh can
//! never recurse into another auth cycle. The retry is structural, not
//! counted: the code path simply has no loop, so a request is retried at
//! most once no matter how often the server keeps reporting expiry.
//! Concurrent requests hitting expiry at the same time may each trigger an
//! independent refresh call; refreshes are not coalesced.

use std::future::Future;
use std::sync::Arc;

use log::{debug, warn};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;

use crate::error::AuthError;
use crate::session::SessionManager;
use crate::transport::{REFRESH_PATH, TOKEN_PATH};

/// Body message distinguishing the expiry signal from other 401 responses.
const EXPIRED_TOKEN_MESSAGE: &str = "Token has expired";

/// Decorates outgoing requests with the session's bearer credential.
pub struct RequestAuthorizer {
    session: Arc<SessionManager>,
    excluded_paths: Vec<String>,
}

impl RequestAuthorizer {
    /// Authorizer with the default exclusions (`/token`, `/token/refresh`).
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self::with_excluded(session, &[])
    }

    /// Authorizer with additional excluded paths. The token endpoints are
    /// always excluded; duplicates are dropped.
    pub fn with_excluded(session: Arc<SessionManager>, extra: &[&str]) -> Self {
        let mut excluded_paths = vec![TOKEN_PATH.to_string(), REFRESH_PATH.to_string()];
        for path in extra {
            if !excluded_paths.iter().any(|p| p == path) {
                excluded_paths.push((*path).to_string());
            }
        }
        Self {
            session,
            excluded_paths,
        }
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.excluded_paths.iter().any(|p| path.contains(p.as_str()))
    }

    /// Run `op` with the current access token attached.
    ///
    /// Excluded paths get a single pass-through with no token and no retry.
    /// Otherwise, when `op` fails with the expiry signal and a refresh token
    /// exists, one refresh is attempted: on success the operation is retried
    /// once with the new token; on failure the session is logged out, a full
    /// client reload requested, and `RefreshFailed` returned. Any other
    /// error propagates untouched.
    pub async fn run<T, F, Fut>(&self, path: &str, mut op: F) -> Result<T, AuthError>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<T, AuthError>>,
    {
        if self.is_excluded(path) {
            debug!("Path {} excluded from authorization", path);
            return op(None).await;
        }

        let token = self.session.current_access_token();
        match op(token).await {
            Err(AuthError::ExpiredToken) => {
                if self.session.current_refresh_token().is_none() {
                    warn!("Access token expired with no refresh token, forcing logout");
                    self.session.logout();
                    self.session.navigator().reload();
                    return Err(AuthError::ExpiredToken);
                }

                if self.session.refresh().await {
                    debug!("Token refreshed, retrying request to {}", path);
                    op(self.session.current_access_token()).await
                } else {
                    // refresh() already logged the session out.
                    warn!("Refresh after expiry failed, forcing client reload");
                    self.session.navigator().reload();
                    Err(AuthError::RefreshFailed)
                }
            }
            other => other,
        }
    }

    /// Send a `reqwest::Request` through the authorizer.
    ///
    /// The request must have a replayable body (`try_clone`), since a retry
    /// re-issues it. A `401` whose JSON body carries the expiry message is
    /// treated as the expiry signal; any other non-success status is
    /// surfaced as [`AuthError::Http`].
    pub async fn execute(
        &self,
        client: &reqwest::Client,
        request: reqwest::Request,
    ) -> Result<reqwest::Response, AuthError> {
        let path = request.url().path().to_string();
        self.run(&path, |token| {
            let cloned = request.try_clone();
            let client = client.clone();
            async move {
                let mut request = cloned.ok_or_else(|| {
                    AuthError::Network("request body cannot be replayed".into())
                })?;
                if let Some(token) = token {
                    let value = HeaderValue::from_str(&format!("Bearer {}", token))
                        .map_err(|e| AuthError::Network(e.to_string()))?;
                    request.headers_mut().insert(AUTHORIZATION, value);
                }
                let response = client
                    .execute(request)
                    .await
                    .map_err(|e| AuthError::Network(e.to_string()))?;
                classify(response).await
            }
        })
        .await
    }
}

/// Map a response to the error taxonomy: success passes through, a 401 with
/// the expiry message becomes `ExpiredToken`, everything else non-success
/// becomes `Http`.
async fn classify(response: reqwest::Response) -> Result<reqwest::Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED && is_expiry_message(&message) {
        return Err(AuthError::ExpiredToken);
    }
    Err(AuthError::Http {
        status: status.as_u16(),
        message,
    })
}

fn is_expiry_message(body: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .and_then(|m| m.as_str())
                .map(|m| m == EXPIRED_TOKEN_MESSAGE)
        })
        .unwrap_or(false)
}
