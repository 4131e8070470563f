//! px-session — client-side authenticated-session SDK for px-style admin
//! backends.
//!
//! Owns the session lifecycle (login, silent refresh, logout), broadcasts
//! the current identity to subscribers, and decorates outgoing requests with
//! the bearer credential, transparently refreshing once when the server
//! signals token expiry.
//!
//! ```no_run
//! use std::sync::Arc;
//! use px_session::{
//!     FileCredentialStore, HttpAuthTransport, NoopNavigator, RequestAuthorizer, SessionManager,
//! };
//!
//! # async fn demo() {
//! let session = Arc::new(SessionManager::new(
//!     Arc::new(FileCredentialStore::new("/var/lib/myapp/refresh_token")),
//!     Arc::new(HttpAuthTransport::new("https://id.example.com/auth")),
//!     Arc::new(NoopNavigator),
//! ));
//! session.clone().spawn_restore();
//!
//! if let Some(identity) = session.login("alice", "s3cret", &["ADMIN"]).await {
//!     println!("logged in as {}", identity.username);
//! }
//!
//! let authorizer = RequestAuthorizer::new(session.clone());
//! let client = reqwest::Client::new();
//! let request = client
//!     .get("https://api.example.com/admin/users")
//!     .build()
//!     .unwrap();
//! let _response = authorizer.execute(&client, request).await;
//! # }
//! ```

pub mod authorizer;
pub mod error;
pub mod guard;
pub mod navigator;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;

pub use authorizer::RequestAuthorizer;
pub use error::AuthError;
pub use navigator::{NoopNavigator, Navigator, ACCESS_DENIED_ROUTE, LOGIN_ROUTE};
pub use session::SessionManager;
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use transport::{AuthTransport, HttpAuthTransport, REFRESH_TOKEN_HEADER};
pub use types::{AuthResult, Credential, Identity, SessionState, ROOT_ROLE};
