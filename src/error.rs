//! Error taxonomy for the session core.

use thiserror::Error;

/// Errors produced by the auth transport, session manager, and request
/// authorizer.
///
/// Transport failures never escape the `SessionManager`: they are logged and
/// converted into `None`/`false` results. The `RequestAuthorizer` is the only
/// place an error is deliberately surfaced to the caller.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Bad credentials at login. No state change.
    #[error("unauthorized")]
    Unauthorized,

    /// The identity endpoint rejected the refresh token.
    #[error("invalid refresh token")]
    InvalidRefreshToken,

    /// Expiry signal: the access token is no longer valid. Distinct from
    /// other authorization failures; only this variant triggers the
    /// refresh-and-retry cycle.
    #[error("access token expired")]
    ExpiredToken,

    /// Transport-level failure. No state change, no automatic retry.
    #[error("network error: {0}")]
    Network(String),

    /// The identity endpoint returned a body we refuse to apply (missing
    /// user or token fields). Nothing is stored.
    #[error("invalid auth response: {0}")]
    InvalidResponse(String),

    /// The single refresh attempt after an expiry signal failed. Terminal:
    /// the session has been logged out and a client reload requested.
    #[error("token refresh failed")]
    RefreshFailed,

    /// Non-auth HTTP failure, surfaced to the caller untouched.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
}

impl AuthError {
    /// True iff this error is the expiry signal (`ExpiredToken`).
    pub fn is_expiry(&self) -> bool {
        matches!(self, AuthError::ExpiredToken)
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Network(err.to_string())
    }
}
