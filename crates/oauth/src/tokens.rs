//! Credential record and token endpoint payloads

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

use crate::config::OAuthClientConfig;
use crate::constants::EXPIRY_BUFFER_SECS;
use crate::error::{OAuthError, Result};

/// Session-owned OAuth credential
///
/// The serialized form is the persisted session mapping
/// `{token, refresh_token, token_uri, client_id, client_secret, scopes, expiry}`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Bearer token for Drive calls (short-lived, ~1 hour)
    #[serde(rename = "token")]
    pub access_token: String,

    /// Long-lived token for obtaining new access tokens; absent when the
    /// provider did not issue one
    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(rename = "token_uri")]
    pub token_endpoint: String,

    pub client_id: String,

    pub client_secret: String,

    pub scopes: BTreeSet<String>,

    /// When the access token expires
    pub expiry: DateTime<Utc>,
}

impl CredentialRecord {
    /// Builds a record from a successful authorization-code exchange
    pub(crate) fn from_exchange(
        config: &OAuthClientConfig,
        response: TokenResponse,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let expiry = response.expiry_at(now)?;
        let scopes = match response.granted_scopes() {
            Some(granted) => {
                let missing: Vec<_> = config.scopes.difference(&granted).collect();
                if !missing.is_empty() {
                    warn!("Provider granted fewer scopes than requested, missing: {:?}", missing);
                }
                granted
            }
            None => config.scopes.clone(),
        };

        Ok(Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            token_endpoint: config.token_endpoint.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scopes,
            expiry,
        })
    }

    /// Checks if the access token has expired at `now` (with 5 minute buffer)
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_BUFFER_SECS) >= self.expiry
    }

    /// Checks if the access token has expired (with 5 minute buffer)
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Applies a refresh response: new access token and expiry, everything
    /// else unchanged
    pub(crate) fn refreshed(&self, response: TokenResponse, now: DateTime<Utc>) -> Result<Self> {
        let expiry = response.expiry_at(now)?;
        Ok(Self {
            access_token: response.access_token,
            expiry,
            ..self.clone()
        })
    }
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_endpoint", &self.token_endpoint)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scopes", &self.scopes)
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Response from the token endpoint
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    pub fn parse(body: &str) -> Result<Self> {
        let response: TokenResponse = serde_json::from_str(body)
            .map_err(|e| OAuthError::MalformedResponse(format!("token response: {}", e)))?;
        if response.access_token.is_empty() {
            return Err(OAuthError::MalformedResponse(
                "token response has an empty access_token".to_string(),
            ));
        }
        Ok(response)
    }

    /// Absolute expiry for a token issued at `now`
    ///
    /// `expires_in` comes straight from the provider, so out-of-range values
    /// are rejected rather than trusted.
    pub fn expiry_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        (self.expires_in >= 0)
            .then(|| Duration::try_seconds(self.expires_in))
            .flatten()
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                OAuthError::MalformedResponse(format!(
                    "token response has an out-of-range expires_in: {}",
                    self.expires_in
                ))
            })
    }

    fn granted_scopes(&self) -> Option<BTreeSet<String>> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_string).collect::<BTreeSet<_>>())
            .filter(|scopes| !scopes.is_empty())
    }
}

/// Error response from the token endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct TokenErrorResponse {
    pub error: String,
    pub error_description: Option<String>,
}

impl TokenErrorResponse {
    /// Parses a provider error body; falls back to the raw text
    pub fn describe(status: u16, body: &str) -> (Option<String>, String) {
        match serde_json::from_str::<TokenErrorResponse>(body) {
            Ok(err) => {
                let message = match err.error_description {
                    Some(desc) if !desc.is_empty() => format!("{} - {}", err.error, desc),
                    _ => err.error.clone(),
                };
                (Some(err.error), message)
            }
            Err(_) => (None, format!("HTTP {}: {}", status, body.trim())),
        }
    }
}
