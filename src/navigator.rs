//! Host-side navigation surface.
//!
//! The session core never performs navigation itself; it signals the host
//! through this trait, and the host moves the UI (route change, full client
//! reload). Hosts inject an implementation at construction time.

use log::debug;

/// Default route the host should show after logout or when a guard denies
/// an unauthenticated request.
pub const LOGIN_ROUTE: &str = "/auth/login";
/// Default route for authenticated users lacking a required role.
pub const ACCESS_DENIED_ROUTE: &str = "/auth/access-denied";

/// Navigation side effects requested by the session core.
pub trait Navigator: Send + Sync {
    /// Navigate to the login destination, optionally carrying the URL to
    /// return to after a successful login.
    fn to_login(&self, return_url: Option<&str>);

    /// Navigate to the access-denied destination. Invoked after a login that
    /// succeeded but lacks a required role.
    fn to_access_denied(&self);

    /// Discard all client state and restart from the login screen. Invoked
    /// when a refresh-and-retry cycle fails terminally.
    fn reload(&self);
}

/// Navigator that only logs. Useful for headless hosts and tests.
#[derive(Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn to_login(&self, return_url: Option<&str>) {
        debug!("Navigation requested: login (return_url={:?})", return_url);
    }

    fn to_access_denied(&self) {
        debug!("Navigation requested: access denied");
    }

    fn reload(&self) {
        debug!("Full client reload requested");
    }
}

/// Percent-encode a string for use in URL query parameters (RFC 3986
/// unreserved chars).
pub fn percent_encode(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => result.push_str(&format!("%{:02X}", byte)),
        }
    }
    result
}

/// Build the login URL with an optional `returnUrl` query parameter, for
/// hosts whose navigator maps routes to URLs directly.
pub fn login_url(return_url: Option<&str>) -> String {
    match return_url {
        Some(url) => format!("{}?returnUrl={}", LOGIN_ROUTE, percent_encode(url)),
        None => LOGIN_ROUTE.to_string(),
    }
}
