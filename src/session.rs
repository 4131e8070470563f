//! Session manager - orchestrates login, silent refresh, and logout, and
//! broadcasts the current authenticated identity.
//!
//! The manager is the single writer of both the credential store and the
//! identity broadcast; everyone else is a reader. A credential and its
//! identity are always applied together (one `AuthResult`), so observers
//! never see a half-updated session.

use std::sync::Arc;

use log::{debug, error, info};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::navigator::Navigator;
use crate::store::CredentialStore;
use crate::transport::AuthTransport;
use crate::types::{AuthResult, Credential, Identity, SessionState};

/// Owns the authenticated-session lifecycle.
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    transport: Arc<dyn AuthTransport>,
    navigator: Arc<dyn Navigator>,
    identity_tx: watch::Sender<Option<Identity>>,
    /// In-memory credential with expiry metadata. The store only persists
    /// the raw token strings.
    credential: Mutex<Option<Credential>>,
}

impl SessionManager {
    /// Create a manager with an anonymous session. Call [`restore`] (or
    /// [`spawn_restore`]) afterwards to resume a persisted session.
    ///
    /// [`restore`]: SessionManager::restore
    /// [`spawn_restore`]: SessionManager::spawn_restore
    pub fn new(
        store: Arc<dyn CredentialStore>,
        transport: Arc<dyn AuthTransport>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let (identity_tx, _) = watch::channel(None);
        Self {
            store,
            transport,
            navigator,
            identity_tx,
            credential: Mutex::new(None),
        }
    }

    /// Snapshot of the current identity, `None` while anonymous.
    pub fn current_identity(&self) -> Option<Identity> {
        self.identity_tx.borrow().clone()
    }

    /// Subscribe to identity changes. The receiver always holds the latest
    /// value; only this manager ever writes to it.
    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.identity_tx.subscribe()
    }

    /// Current lifecycle state, derived from the identity.
    pub fn state(&self) -> SessionState {
        if self.identity_tx.borrow().is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        }
    }

    /// True iff the current identity holds the privileged marker role.
    pub fn is_root(&self) -> bool {
        self.identity_tx
            .borrow()
            .as_ref()
            .map(Identity::is_root)
            .unwrap_or(false)
    }

    /// Current access token as persisted, without triggering a refresh.
    pub fn current_access_token(&self) -> Option<String> {
        self.store.access_token()
    }

    /// Current refresh token as persisted.
    pub fn current_refresh_token(&self) -> Option<String> {
        self.store.refresh_token()
    }

    /// Log in with username and password.
    ///
    /// Any existing credential is cleared first, so a failed attempt never
    /// leaves stale tokens behind. On success the credential is stored, the
    /// new identity published, and the role check applied: an identity
    /// lacking all of `required_roles` (and not root) triggers an
    /// access-denied navigation, but the login still completes. On failure
    /// the error is logged and `None` returned, with no retry.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        required_roles: &[&str],
    ) -> Option<Identity> {
        self.clear_credential();

        match self.transport.issue(username, password).await {
            Ok(result) => {
                self.apply(result, required_roles);
                self.current_identity()
            }
            Err(e) => {
                error!("Login failed for {}: {}", username, e);
                None
            }
        }
    }

    /// Silently refresh the session using the persisted refresh token.
    ///
    /// Returns `true` and replaces both tokens atomically on success. A
    /// missing refresh token or a failed call performs a logout and returns
    /// `false`. Never throws past this method.
    pub async fn refresh(&self) -> bool {
        let refresh_token = match self.store.refresh_token() {
            Some(token) => token,
            None => {
                debug!("No refresh token present, logging out");
                self.logout();
                return false;
            }
        };

        match self.transport.refresh(&refresh_token).await {
            Ok(result) => {
                self.apply(result, &[]);
                info!("Session refreshed");
                true
            }
            Err(e) => {
                error!("Token refresh failed: {}", e);
                self.logout();
                false
            }
        }
    }

    /// Log out: publish a null identity, clear the credential store, and
    /// navigate to the login destination. Idempotent, never fails.
    pub fn logout(&self) {
        self.identity_tx.send_replace(None);
        self.clear_credential();
        self.navigator.to_login(None);
    }

    /// Resume a persisted session: if both tokens survived, attempt a silent
    /// refresh; otherwise stay anonymous.
    pub async fn restore(&self) {
        if self.store.access_token().is_some() && self.store.refresh_token().is_some() {
            info!("Found persisted tokens, attempting silent refresh");
            self.refresh().await;
        } else {
            debug!("No persisted session");
        }
    }

    /// Run [`restore`](SessionManager::restore) on the runtime, deferred one
    /// tick so it never interferes with the host's initial render.
    pub fn spawn_restore(self: Arc<Self>) {
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            self.restore().await;
        });
    }

    /// Get a valid access token, refreshing first when the current one is
    /// expired or about to expire. `None` when anonymous or when the refresh
    /// fails (the session is then logged out).
    pub async fn access_token(&self) -> Option<String> {
        let needs_refresh = self
            .credential
            .lock()
            .as_ref()
            .map(|c| c.is_expired() || c.expires_soon())
            .unwrap_or(false);

        if needs_refresh && !self.refresh().await {
            return None;
        }
        self.store.access_token()
    }

    /// Apply a full `AuthResult`: tokens first, then the identity broadcast,
    /// then the role check.
    fn apply(&self, result: AuthResult, required_roles: &[&str]) {
        let AuthResult {
            identity,
            credential,
        } = result;

        self.store
            .save(&credential.access_token, &credential.refresh_token);
        *self.credential.lock() = Some(credential);

        let denied = !identity.is_root() && !identity.has_any_role(required_roles);
        info!("Session established for {}", identity.username);
        self.identity_tx.send_replace(Some(identity));

        if denied {
            info!("Identity lacks required roles, scheduling access-denied navigation");
            self.navigator.to_access_denied();
        }
    }

    fn clear_credential(&self) {
        *self.credential.lock() = None;
        self.store.clear();
    }

    pub(crate) fn navigator(&self) -> &dyn Navigator {
        self.navigator.as_ref()
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::test_support::{
        auth_result, init_logging, NavEvent, RecordingNavigator, StubTransport,
    };
    use super::*;
    use crate::error::AuthError;
    use crate::store::{CredentialStore, MemoryCredentialStore};

    fn manager_with(
        transport: Arc<StubTransport>,
    ) -> (
        SessionManager,
        Arc<MemoryCredentialStore>,
        Arc<RecordingNavigator>,
    ) {
        init_logging();
        let store = Arc::new(MemoryCredentialStore::new());
        let navigator = Arc::new(RecordingNavigator::default());
        let manager = SessionManager::new(store.clone(), transport, navigator.clone());
        (manager, store, navigator)
    }

    fn manager(
        transport: StubTransport,
    ) -> (
        SessionManager,
        Arc<MemoryCredentialStore>,
        Arc<RecordingNavigator>,
    ) {
        manager_with(Arc::new(transport))
    }

    #[tokio::test]
    async fn login_publishes_identity_and_stores_tokens() {
        let (manager, store, _nav) =
            manager(StubTransport::with_issue(Ok(auth_result(
                "alice",
                &["EDITOR"],
                "1",
            ))));

        let identity = manager.login("alice", "pw", &[]).await.expect("logged in");
        assert_eq!(identity.username, "alice");
        assert_eq!(manager.state(), SessionState::Authenticated);
        assert_eq!(store.access_token().as_deref(), Some("at-1"));
        assert_eq!(store.refresh_token().as_deref(), Some("rt-1"));
        assert_eq!(manager.current_identity(), Some(identity));
    }

    #[tokio::test]
    async fn failed_login_leaves_no_partial_token_write() {
        let (manager, store, _nav) =
            manager(StubTransport::with_issue(Err(AuthError::Unauthorized)));

        // Seed stale tokens to verify the clear-first behavior.
        store.save("stale-at", "stale-rt");

        assert!(manager.login("alice", "wrong", &[]).await.is_none());
        assert_eq!(manager.state(), SessionState::Anonymous);
        assert_eq!(store.access_token(), None);
        assert_eq!(store.refresh_token(), None);
    }

    #[tokio::test]
    async fn network_failure_at_login_returns_none_without_retry() {
        let transport = StubTransport::with_issue(Err(AuthError::Network("boom".into())));
        let (manager, _store, _nav) = manager(transport);

        assert!(manager.login("alice", "pw", &[]).await.is_none());
    }

    #[tokio::test]
    async fn refresh_replaces_both_tokens_atomically() {
        let transport = StubTransport::with_refresh(Ok(auth_result("alice", &[], "2")));
        let (manager, store, _nav) = manager(transport);
        store.save("at-1", "rt-1");

        assert!(manager.refresh().await);
        // Never an access token from call N+1 paired with a refresh token
        // from call N.
        assert_eq!(store.access_token().as_deref(), Some("at-2"));
        assert_eq!(store.refresh_token().as_deref(), Some("rt-2"));
        assert_eq!(manager.state(), SessionState::Authenticated);
    }

    #[tokio::test]
    async fn refresh_without_token_logs_out_and_navigates_to_login() {
        let (manager, _store, nav) = manager(StubTransport::default());

        assert!(!manager.refresh().await);
        assert_eq!(manager.current_identity(), None);
        assert_eq!(nav.events(), vec![NavEvent::Login(None)]);
    }

    #[tokio::test]
    async fn failed_refresh_forces_logout() {
        let transport = StubTransport::with_refresh(Err(AuthError::InvalidRefreshToken));
        let (manager, store, nav) = manager(transport);
        store.save("at-1", "rt-1");

        assert!(!manager.refresh().await);
        assert_eq!(manager.state(), SessionState::Anonymous);
        assert_eq!(store.access_token(), None);
        assert_eq!(nav.events(), vec![NavEvent::Login(None)]);
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let (manager, _store, _nav) = manager(StubTransport::default());

        manager.logout();
        manager.logout();
        assert_eq!(manager.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn missing_required_role_schedules_access_denied_but_login_succeeds() {
        let transport = StubTransport::with_issue(Ok(auth_result("bob", &["EDITOR"], "1")));
        let (manager, _store, nav) = manager(transport);

        let identity = manager.login("bob", "pw", &["ADMIN"]).await;
        assert!(identity.is_some());
        assert_eq!(manager.state(), SessionState::Authenticated);
        assert_eq!(nav.events(), vec![NavEvent::AccessDenied]);
    }

    #[tokio::test]
    async fn root_bypasses_role_checks() {
        let transport = StubTransport::with_issue(Ok(auth_result("root", &["ROOT"], "1")));
        let (manager, _store, nav) = manager(transport);

        assert!(manager.login("root", "pw", &["ADMIN"]).await.is_some());
        assert!(manager.is_root());
        assert!(nav.events().is_empty());
    }

    #[tokio::test]
    async fn empty_required_roles_never_denies() {
        let transport = StubTransport::with_issue(Ok(auth_result("carol", &[], "1")));
        let (manager, _store, nav) = manager(transport);

        assert!(manager.login("carol", "pw", &[]).await.is_some());
        assert!(nav.events().is_empty());
    }

    #[tokio::test]
    async fn restore_refreshes_only_when_both_tokens_are_present() {
        let transport = StubTransport::with_refresh(Ok(auth_result("alice", &[], "2")));
        let (manager, store, _nav) = manager(transport);

        // Nothing persisted: stays anonymous, no refresh call.
        manager.restore().await;
        assert_eq!(manager.state(), SessionState::Anonymous);

        store.save("at-1", "rt-1");
        manager.restore().await;
        assert_eq!(manager.state(), SessionState::Authenticated);
    }

    #[tokio::test]
    async fn restarted_process_stays_anonymous_until_explicit_refresh() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("refresh_token");

        // First process: log in, persisting the refresh token to disk.
        {
            let store = Arc::new(crate::store::FileCredentialStore::new(&path));
            let manager = SessionManager::new(
                store,
                Arc::new(StubTransport::with_issue(Ok(auth_result("alice", &[], "1")))),
                Arc::new(RecordingNavigator::default()),
            );
            assert!(manager.login("alice", "pw", &[]).await.is_some());
        }

        // Second process: only the refresh token survived, so restore()
        // leaves the session anonymous; an explicit refresh() resumes it.
        let store = Arc::new(crate::store::FileCredentialStore::new(&path));
        let manager = SessionManager::new(
            store,
            Arc::new(StubTransport::with_refresh(Ok(auth_result("alice", &[], "2")))),
            Arc::new(RecordingNavigator::default()),
        );
        manager.restore().await;
        assert_eq!(manager.state(), SessionState::Anonymous);

        assert!(manager.refresh().await);
        assert_eq!(manager.state(), SessionState::Authenticated);
        assert_eq!(manager.current_access_token().as_deref(), Some("at-2"));
    }

    #[tokio::test]
    async fn subscribers_observe_login_and_logout() {
        let transport = StubTransport::with_issue(Ok(auth_result("alice", &[], "1")));
        let (manager, _store, _nav) = manager(transport);
        let rx = manager.subscribe();

        assert!(rx.borrow().is_none());
        manager.login("alice", "pw", &[]).await;
        assert_eq!(
            rx.borrow().as_ref().map(|i| i.username.clone()),
            Some("alice".to_string())
        );
        manager.logout();
        assert!(rx.borrow().is_none());
    }

    #[tokio::test]
    async fn access_token_refreshes_an_expiring_credential() {
        let transport = StubTransport::default();
        transport
            .issue_results
            .lock()
            .push_back(Ok(auth_result("alice", &[], "1")));
        transport
            .refresh_results
            .lock()
            .push_back(Ok(auth_result("alice", &[], "2")));
        let (manager, _store, _nav) = manager(transport);

        manager.login("alice", "pw", &[]).await;
        // Force the in-memory credential to look expired.
        {
            let mut guard = manager.credential.lock();
            let cred = guard.as_mut().expect("credential present");
            cred.access_token_expires_at = chrono::Utc::now() - chrono::Duration::minutes(1);
        }

        assert_eq!(manager.access_token().await.as_deref(), Some("at-2"));
    }

    #[tokio::test]
    async fn access_token_returns_fresh_token_without_refreshing() {
        let transport = Arc::new(StubTransport::with_issue(Ok(auth_result("alice", &[], "1"))));
        let (manager, _store, _nav) = manager_with(transport.clone());
        manager.login("alice", "pw", &[]).await;

        assert_eq!(manager.access_token().await.as_deref(), Some("at-1"));
        assert_eq!(transport.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn superseding_logout_wins_over_an_ignored_refresh_result() {
        // An in-flight refresh superseded by logout: its eventual success is
        // simply applied to a session the host already abandoned; a
        // subsequent logout still ends anonymous.
        let transport = StubTransport::with_refresh(Ok(auth_result("alice", &[], "2")));
        let (manager, store, _nav) = manager(transport);
        store.save("at-1", "rt-1");

        assert!(manager.refresh().await);
        manager.logout();
        assert_eq!(manager.state(), SessionState::Anonymous);
        assert_eq!(store.access_token(), None);
    }
}
