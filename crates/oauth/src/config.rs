//! OAuth client registration

use std::collections::BTreeSet;

use crate::constants::{DRIVE_FILE_SCOPE, GOOGLE_AUTH_URL, GOOGLE_REVOKE_URL, GOOGLE_TOKEN_URL};

/// Client registration and endpoints; immutable for the process lifetime
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_endpoint: String,
    pub token_endpoint: String,
    pub revoke_endpoint: String,
    pub redirect_uri: String,
    pub scopes: BTreeSet<String>,
    /// Append `prompt=consent` so repeat grants still carry a refresh token
    pub prompt_consent: bool,
}

impl OAuthClientConfig {
    /// Google endpoints with the `drive.file` scope
    pub fn google(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_endpoint: GOOGLE_AUTH_URL.to_string(),
            token_endpoint: GOOGLE_TOKEN_URL.to_string(),
            revoke_endpoint: GOOGLE_REVOKE_URL.to_string(),
            redirect_uri: redirect_uri.into(),
            scopes: BTreeSet::from([DRIVE_FILE_SCOPE.to_string()]),
            prompt_consent: true,
        }
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Space separated scope list as sent to the provider
    pub fn scope_param(&self) -> String {
        self.scopes.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
    }
}

impl std::fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("auth_endpoint", &self.auth_endpoint)
            .field("token_endpoint", &self.token_endpoint)
            .field("revoke_endpoint", &self.revoke_endpoint)
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("prompt_consent", &self.prompt_consent)
            .finish()
    }
}
