//! Route guard: allow only authenticated sessions.

use crate::session::SessionManager;

/// Decide whether a navigation to `requested_url` may proceed.
///
/// Presence of an access token is the authentication check; a denied
/// request is redirected to the login destination carrying the requested
/// URL so the host can return there after login.
pub fn can_activate(session: &SessionManager, requested_url: &str) -> bool {
    if session.current_access_token().is_some() {
        return true;
    }
    session.navigator().to_login(Some(requested_url));
    false
}
