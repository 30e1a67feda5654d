//! OAuth 2.0 Authorization Code flow with PKCE
//!
//! Builds the browser redirect and parses the provider's callback:
//! 1. Generate state and PKCE code verifier/challenge
//! 2. Redirect the browser to the authorization URL
//! 3. Parse `code` and `state` from the callback URL

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::OAuthClientConfig;
use crate::error::{OAuthError, Result};

/// Generates a cryptographically secure state parameter
pub(crate) fn generate_state() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generates PKCE code verifier and challenge
///
/// Returns (verifier, challenge) tuple
pub(crate) fn generate_pkce() -> (String, String) {
    let verifier: [u8; 32] = rand::thread_rng().gen();
    let verifier_str = URL_SAFE_NO_PAD.encode(verifier);
    (verifier_str.clone(), pkce_challenge(&verifier_str))
}

fn pkce_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Authorization state stored in the session between redirect and callback
///
/// Single use: consumed by the callback handler.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub state: String,
    pub code_verifier: String,
    pub issued_at: DateTime<Utc>,
}

impl PendingAuthorization {
    pub(crate) fn new(now: DateTime<Utc>) -> Self {
        let (code_verifier, _) = generate_pkce();
        Self {
            state: generate_state(),
            code_verifier,
            issued_at: now,
        }
    }

    /// Whether the callback window has closed
    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now >= self.issued_at + ttl
    }

    pub fn code_challenge(&self) -> String {
        pkce_challenge(&self.code_verifier)
    }
}

impl std::fmt::Debug for PendingAuthorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingAuthorization")
            .field("state", &self.state)
            .field("code_verifier", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Where to send the browser, plus the state to persist in the session
#[derive(Debug, Clone)]
pub struct AuthorizationRedirect {
    pub url: String,
    pub pending: PendingAuthorization,
}

/// Returns the authorization URL to open in the browser
pub(crate) fn authorization_url(config: &OAuthClientConfig, pending: &PendingAuthorization) -> String {
    let mut url = format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&state={}&code_challenge={}&code_challenge_method=S256",
        config.auth_endpoint,
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.redirect_uri),
        urlencoding::encode(&config.scope_param()),
        &pending.state,
        pending.code_challenge(),
    );
    if config.prompt_consent {
        url.push_str("&prompt=consent");
    }
    url
}

/// Query parameters from OAuth callback
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    pub fn from_url(callback_url: &str) -> Result<Self> {
        let url = Url::parse(callback_url).map_err(|e| OAuthError::InvalidCallback(e.to_string()))?;
        let mut params = CallbackParams::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                _ => {}
            }
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OAuthClientConfig {
        OAuthClientConfig::google("client-id", "client-secret", "http://localhost:8080/oauth2callback")
    }

    #[test]
    fn test_states_are_unique() {
        assert_ne!(generate_state(), generate_state());
        assert_eq!(generate_state().len(), 43);
    }

    #[test]
    fn test_pkce_challenge_matches_verifier() {
        let (verifier, challenge) = generate_pkce();
        assert_eq!(pkce_challenge(&verifier), challenge);
        // RFC 7636 appendix B
        assert_eq!(
            pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_authorization_url_parameters() {
        let pending = PendingAuthorization::new(Utc::now());
        let url = Url::parse(&authorization_url(&config(), &pending)).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(params["client_id"], "client-id");
        assert_eq!(params["redirect_uri"], "http://localhost:8080/oauth2callback");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "https://www.googleapis.com/auth/drive.file");
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["state"], pending.state);
        assert_eq!(params["prompt"], "consent");
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["code_challenge"], pending.code_challenge());
    }

    #[test]
    fn test_prompt_can_be_disabled() {
        let mut config = config();
        config.prompt_consent = false;
        let url = authorization_url(&config, &PendingAuthorization::new(Utc::now()));
        assert!(!url.contains("prompt="));
    }

    #[test]
    fn test_pending_expiry() {
        let now = Utc::now();
        let pending = PendingAuthorization::new(now);
        assert!(!pending.is_expired_at(now + Duration::minutes(9), Duration::minutes(10)));
        assert!(pending.is_expired_at(now + Duration::minutes(10), Duration::minutes(10)));
    }

    #[test]
    fn test_callback_params() {
        let params = CallbackParams::from_url(
            "http://localhost:8080/oauth2callback?state=abc123&code=4%2F0Adeu&scope=x",
        )
        .unwrap();
        assert_eq!(params.state.as_deref(), Some("abc123"));
        assert_eq!(params.code.as_deref(), Some("4/0Adeu"));
        assert!(params.error.is_none());

        let denied = CallbackParams::from_url("http://localhost/cb?error=access_denied&state=s").unwrap();
        assert_eq!(denied.error.as_deref(), Some("access_denied"));

        assert!(matches!(
            CallbackParams::from_url("not a url"),
            Err(OAuthError::InvalidCallback(_))
        ));
    }
}
