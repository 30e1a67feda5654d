//! Google OAuth 2.0 credential lifecycle for browser sessions
//!
//! This crate drives the authorization code flow, keeps each session's
//! credential valid (refreshing when it expires) and revokes it on logout.
//! Sessions are persisted through the `SessionStore` interface.

pub mod authenticator;
pub mod config;
pub mod constants;
pub mod error;
pub mod flow;
pub mod manager;
pub mod retry;
pub mod session;
pub mod storage;
pub mod tokens;
pub mod transport;

pub use authenticator::SessionAuthenticator;
pub use config::OAuthClientConfig;
pub use error::{OAuthError, Result};
pub use flow::{AuthorizationRedirect, PendingAuthorization};
pub use manager::{CredentialManager, ValidCredential};
pub use retry::RetryPolicy;
pub use session::{MemorySessionStore, SessionData, SessionId, SessionStore};
pub use storage::FileSessionStore;
pub use tokens::CredentialRecord;
pub use transport::{HttpReply, HttpTransport, ReqwestTransport};
