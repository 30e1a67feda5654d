//! Error taxonomy for the credential lifecycle
//!
//! Every variant is recoverable from the caller's point of view: the remedy is
//! to send the browser back through authorization.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OAuthError {
    /// Callback state does not match the session (possible CSRF or stale tab)
    #[error("authorization state mismatch")]
    StateMismatch,

    /// The pending authorization outlived its timeout
    #[error("authorization request expired before the callback arrived")]
    StateExpired,

    /// User or provider refused the grant (`error=` on the callback)
    #[error("authorization denied: {0}")]
    AccessDenied(String),

    #[error("callback is missing the `{0}` parameter")]
    MissingParameter(&'static str),

    #[error("invalid callback url: {0}")]
    InvalidCallback(String),

    /// Token endpoint rejected the authorization code
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// Refresh token missing, expired or revoked
    #[error("token refresh failed: {0}")]
    RefreshFailure(String),

    #[error("token revocation failed: {0}")]
    Revoke(String),

    /// Transport failure or timeout; the only retryable kind
    #[error("network error: {0}")]
    Network(String),

    /// Provider answered with something that is not a token response
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("session storage error: {0}")]
    Storage(String),
}

impl OAuthError {
    /// Whether repeating the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, OAuthError::Network(_))
    }
}

impl From<reqwest::Error> for OAuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            OAuthError::Network(format!("request timed out: {}", e))
        } else {
            OAuthError::Network(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, OAuthError>;
