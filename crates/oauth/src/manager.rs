//! Credential lifecycle: authorization, code exchange, refresh, revocation
//!
//! The manager holds only immutable configuration and its collaborators. All
//! per-user state travels in and out through `PendingAuthorization` and
//! `CredentialRecord` values owned by the caller's session.

use chrono::{Duration, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{debug, error, info, warn};

use crate::config::OAuthClientConfig;
use crate::constants::{DEFAULT_CALL_TIMEOUT_SECS, INVALID_GRANT, PENDING_AUTHORIZATION_TTL_SECS};
use crate::error::{OAuthError, Result};
use crate::flow::{authorization_url, AuthorizationRedirect, CallbackParams, PendingAuthorization};
use crate::retry::RetryPolicy;
use crate::tokens::{CredentialRecord, TokenErrorResponse, TokenResponse};
use crate::transport::{HttpReply, HttpTransport};

/// A credential that may be used for Drive calls right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidCredential {
    /// Unexpired and untouched
    Current(CredentialRecord),
    /// Just refreshed; the caller must persist it
    Refreshed(CredentialRecord),
}

impl ValidCredential {
    pub fn record(&self) -> &CredentialRecord {
        match self {
            ValidCredential::Current(record) | ValidCredential::Refreshed(record) => record,
        }
    }

    pub fn into_record(self) -> CredentialRecord {
        match self {
            ValidCredential::Current(record) | ValidCredential::Refreshed(record) => record,
        }
    }

    pub fn needs_persist(&self) -> bool {
        matches!(self, ValidCredential::Refreshed(_))
    }
}

/// Drives the OAuth 2.0 authorization code flow and keeps credentials valid
pub struct CredentialManager {
    config: Arc<OAuthClientConfig>,
    transport: Arc<dyn HttpTransport>,
    retry: RetryPolicy,
    pending_ttl: Duration,
    call_timeout: StdDuration,
}

impl CredentialManager {
    pub fn new(config: Arc<OAuthClientConfig>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config,
            transport,
            retry: RetryPolicy::default(),
            pending_ttl: Duration::seconds(PENDING_AUTHORIZATION_TTL_SECS),
            call_timeout: StdDuration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// How long a pending authorization waits for its callback
    pub fn with_pending_timeout(mut self, ttl: Duration) -> Self {
        self.pending_ttl = ttl;
        self
    }

    /// Upper bound for any single provider call
    pub fn with_call_timeout(mut self, timeout: StdDuration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn config(&self) -> &OAuthClientConfig {
        &self.config
    }

    /// Starts a new authorization: fresh state and PKCE verifier plus the
    /// provider URL to redirect the browser to
    pub fn begin_authorization(&self) -> AuthorizationRedirect {
        let pending = PendingAuthorization::new(Utc::now());
        let url = authorization_url(&self.config, &pending);
        debug!("Starting authorization for client {}", self.config.client_id);
        AuthorizationRedirect { url, pending }
    }

    /// Finishes authorization from the provider's redirect
    ///
    /// The callback state is checked against `pending` before any network
    /// call; the code exchange itself is never retried.
    pub async fn complete_authorization(
        &self,
        callback_url: &str,
        pending: &PendingAuthorization,
    ) -> Result<CredentialRecord> {
        let params = CallbackParams::from_url(callback_url)?;

        let state = params.state.ok_or(OAuthError::MissingParameter("state"))?;
        if state != pending.state {
            warn!("OAuth callback received with invalid state");
            return Err(OAuthError::StateMismatch);
        }

        if pending.is_expired_at(Utc::now(), self.pending_ttl) {
            warn!("OAuth callback arrived after the authorization request expired");
            return Err(OAuthError::StateExpired);
        }

        if let Some(error) = params.error {
            warn!("Provider denied authorization: {}", error);
            return Err(OAuthError::AccessDenied(error));
        }

        let code = params.code.ok_or(OAuthError::MissingParameter("code"))?;

        info!("Exchanging authorization code for tokens");
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code_verifier", pending.code_verifier.as_str()),
        ];
        let reply = self.post(&self.config.token_endpoint, &form).await?;

        if !reply.is_success() {
            let (_, message) = TokenErrorResponse::describe(reply.status, &reply.body);
            error!("Token exchange rejected: {}", message);
            return Err(OAuthError::TokenExchange(message));
        }

        let response = TokenResponse::parse(&reply.body)?;
        let record = CredentialRecord::from_exchange(&self.config, response, Utc::now())?;
        if record.refresh_token.is_none() {
            warn!("Provider issued no refresh token; the session must re-authorize when it expires");
        }
        info!("Authorization complete, token valid until {}", record.expiry);
        Ok(record)
    }

    /// Returns a credential usable right now, refreshing when expired
    ///
    /// `None` means the caller must re-run authorization: no record, no
    /// refresh token, or the refresh failed. Refresh failures are expected
    /// and are never raised.
    pub async fn get_valid_credential(
        &self,
        record: Option<CredentialRecord>,
    ) -> Option<ValidCredential> {
        let record = record?;

        if !record.is_expired() {
            return Some(ValidCredential::Current(record));
        }

        if record.refresh_token.is_none() {
            info!("Access token expired and no refresh token is available");
            return None;
        }

        match self.refresh(&record).await {
            Ok(refreshed) => Some(ValidCredential::Refreshed(refreshed)),
            Err(OAuthError::RefreshFailure(message)) => {
                warn!("Refresh token rejected: {}", message);
                None
            }
            Err(e) => {
                error!("Failed to refresh access token: {}", e);
                None
            }
        }
    }

    /// Exchanges the record's refresh token for a new access token
    ///
    /// The refresh token and scopes of the result equal the input's.
    pub async fn refresh(&self, record: &CredentialRecord) -> Result<CredentialRecord> {
        let refresh_token = record
            .refresh_token
            .as_deref()
            .ok_or_else(|| OAuthError::RefreshFailure("no refresh token".to_string()))?;

        debug!("Refreshing access token");
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", record.client_id.as_str()),
            ("client_secret", record.client_secret.as_str()),
        ];
        let reply = self
            .retry
            .run("token refresh", || self.post(&record.token_endpoint, &form))
            .await?;

        if !reply.is_success() {
            let (code, message) = TokenErrorResponse::describe(reply.status, &reply.body);
            if code.as_deref() == Some(INVALID_GRANT) {
                return Err(OAuthError::RefreshFailure(
                    "refresh token revoked or expired".to_string(),
                ));
            }
            return Err(OAuthError::RefreshFailure(message));
        }

        let response = TokenResponse::parse(&reply.body)?;
        record.refreshed(response, Utc::now())
    }

    /// Revokes the record's access token at the provider
    ///
    /// Only HTTP 200 counts as success. Callers discard the local record
    /// whatever the outcome.
    pub async fn revoke(&self, record: &CredentialRecord) -> Result<()> {
        let form = [("token", record.access_token.as_str())];
        let reply = self
            .retry
            .run("token revocation", || self.post(&self.config.revoke_endpoint, &form))
            .await?;

        if reply.status != 200 {
            let (_, message) = TokenErrorResponse::describe(reply.status, &reply.body);
            return Err(OAuthError::Revoke(message));
        }

        info!("Access token revoked");
        Ok(())
    }

    async fn post(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpReply> {
        tokio::time::timeout(self.call_timeout, self.transport.post_form(url, form))
            .await
            .map_err(|_| {
                OAuthError::Network(format!(
                    "no response from {} within {:?}",
                    url, self.call_timeout
                ))
            })?
    }
}
