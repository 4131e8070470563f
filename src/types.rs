//! Session data model: identities, credentials, and the wire-level auth result.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AuthError;

/// Marker role that bypasses all fine-grained role checks.
pub const ROOT_ROLE: &str = "ROOT";

/// Authenticated user identity.
///
/// Owned exclusively by the `SessionManager`: replaced wholesale on every
/// successful login/refresh, cleared on logout. Never partially mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Identity {
    pub id: String,
    pub username: String,
    pub roles: BTreeSet<String>,
    /// Free-form per-user payload supplied by the backend.
    pub details: Map<String, Value>,
    /// Free-form per-user configuration supplied by the backend.
    pub config: Map<String, Value>,
}

impl Identity {
    /// True iff this identity holds the privileged marker role.
    pub fn is_root(&self) -> bool {
        self.roles.contains(ROOT_ROLE)
    }

    /// Role policy: an empty required list always passes; otherwise the
    /// identity must hold at least one of the listed roles. Root status is
    /// checked separately by the caller (it bypasses this entirely).
    pub fn has_any_role(&self, required: &[&str]) -> bool {
        if required.is_empty() {
            return true;
        }
        required.iter().any(|role| self.roles.contains(*role))
    }
}

/// Access/refresh token pair with expiry metadata.
///
/// Both tokens are written together and cleared together; no observer ever
/// sees a half-replaced pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

impl Credential {
    /// Check if the access token has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.access_token_expires_at
    }

    /// Check if the access token will expire soon (within 5 minutes).
    pub fn expires_soon(&self) -> bool {
        Utc::now() + Duration::minutes(5) >= self.access_token_expires_at
    }
}

/// The atomic unit produced by a successful issue/refresh call: either fully
/// applied or fully discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthResult {
    pub identity: Identity,
    pub credential: Credential,
}

/// Session lifecycle state, derived from the current identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated,
}

/// Wire shape returned by the identity endpoint (`/token` and
/// `/token/refresh`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuthResponseBody {
    #[serde(default)]
    user: Option<Identity>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    access_token_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    refresh_token_expires_at: Option<DateTime<Utc>>,
}

impl AuthResponseBody {
    /// Validate the response into an `AuthResult`. A body missing the user,
    /// either token, or either expiry is rejected whole.
    pub(crate) fn into_result(self) -> Result<AuthResult, AuthError> {
        let identity = self
            .user
            .ok_or_else(|| AuthError::InvalidResponse("missing user".into()))?;
        let access_token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::InvalidResponse("missing accessToken".into()))?;
        let refresh_token = self
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::InvalidResponse("missing refreshToken".into()))?;
        let access_token_expires_at = self
            .access_token_expires_at
            .ok_or_else(|| AuthError::InvalidResponse("missing accessTokenExpiresAt".into()))?;
        let refresh_token_expires_at = self
            .refresh_token_expires_at
            .ok_or_else(|| AuthError::InvalidResponse("missing refreshTokenExpiresAt".into()))?;

        Ok(AuthResult {
            identity,
            credential: Credential {
                access_token,
                refresh_token,
                access_token_expires_at,
                refresh_token_expires_at,
            },
        })
    }
}
