use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use chrono::Duration;
use common::config::{Config, SessionBackend, default_data_dir};
use drive::{DriveClient, DriveEndpoints};
use oauth::{
    CredentialManager, FileSessionStore, MemorySessionStore, OAuthClientConfig, ReqwestTransport,
    SessionAuthenticator, SessionStore,
};
use std::sync::Arc;
use tracing::warn;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Session-bound OAuth credential lifecycle
    pub auth: Arc<SessionAuthenticator>,
    /// Google Drive API client
    pub drive: Arc<DriveClient>,
    /// Signing key for the session cookie
    pub cookie_key: Key,
    /// Set when sessions live in memory, so idle ones can be purged
    pub memory_store: Option<Arc<MemorySessionStore>>,
}

impl AppState {
    /// Builds the state from configuration with the real Google collaborators
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let google = &config.google;
        let client = OAuthClientConfig {
            client_id: google.client_id.clone(),
            client_secret: google.client_secret.clone(),
            auth_endpoint: google.auth_uri.clone(),
            token_endpoint: google.token_uri.clone(),
            revoke_endpoint: google.revoke_uri.clone(),
            redirect_uri: google.redirect_uri.clone(),
            scopes: google.scopes.iter().cloned().collect(),
            prompt_consent: google.prompt_consent,
        };

        let timeout = std::time::Duration::from_secs(google.request_timeout_secs);
        let transport = ReqwestTransport::new(timeout)?;
        let manager = CredentialManager::new(Arc::new(client), Arc::new(transport))
            .with_call_timeout(timeout)
            .with_pending_timeout(Duration::seconds(config.session.pending_timeout_secs as i64));

        let idle = Duration::seconds(config.session.idle_timeout_secs as i64);
        let (store, memory_store) = match config.session.backend {
            SessionBackend::Memory => {
                let store = Arc::new(MemorySessionStore::new(idle));
                (store.clone() as Arc<dyn SessionStore>, Some(store))
            }
            SessionBackend::File => {
                let dir = config
                    .session
                    .directory
                    .clone()
                    .or_else(|| default_data_dir().map(|d| d.join("sessions")))
                    .ok_or_else(|| {
                        anyhow::anyhow!("Could not determine session directory for your platform")
                    })?;
                let store = FileSessionStore::new(dir, idle)?;
                (Arc::new(store) as Arc<dyn SessionStore>, None)
            }
        };

        let drive = DriveClient::new(DriveEndpoints {
            api_base: config.drive.api_base.clone(),
            upload_base: config.drive.upload_base.clone(),
        })?;

        let cookie_key = match &config.session.secret_key {
            Some(secret) => Key::derive_from(secret.as_bytes()),
            None => {
                warn!("SECRET_KEY not configured; sessions will not survive a restart");
                Key::generate()
            }
        };

        Ok(Self {
            config: Arc::new(config),
            auth: Arc::new(SessionAuthenticator::new(Arc::new(manager), store)),
            drive: Arc::new(drive),
            cookie_key,
            memory_store,
        })
    }

    /// Assembles the state from prebuilt parts
    pub fn from_parts(config: Config, auth: SessionAuthenticator, drive: DriveClient) -> Self {
        Self {
            config: Arc::new(config),
            auth: Arc::new(auth),
            drive: Arc::new(drive),
            cookie_key: Key::generate(),
            memory_store: None,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.session.cookie_name
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret_key: Option<&str>) -> Config {
        let mut config = Config::default();
        config.google.client_id = "client-id".into();
        config.google.client_secret = "client-secret".into();
        config.session.secret_key = secret_key.map(str::to_string);
        config
    }

    #[test]
    fn test_cookie_key_derived_from_secret() {
        let secret = "a-long-enough-secret-for-signing-session-cookies";
        let first = AppState::new(config(Some(secret))).unwrap();
        let second = AppState::new(config(Some(secret))).unwrap();

        // Same secret, same key: cookies survive a restart
        assert_eq!(first.cookie_key.master(), second.cookie_key.master());
        assert!(first.memory_store.is_some());
    }

    #[test]
    fn test_cookie_key_generated_without_secret() {
        let first = AppState::new(config(None)).unwrap();
        let second = AppState::new(config(None)).unwrap();
        assert_ne!(first.cookie_key.master(), second.cookie_key.master());
    }
}
