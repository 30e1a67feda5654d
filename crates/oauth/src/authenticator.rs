//! Session-bound credential lifecycle
//!
//! Connects `CredentialManager` to a `SessionStore`: the manager decides, the
//! store remembers. Each call touches only the session it is given.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{OAuthError, Result};
use crate::manager::{CredentialManager, ValidCredential};
use crate::session::{SessionData, SessionId, SessionStore};
use crate::tokens::CredentialRecord;

pub struct SessionAuthenticator {
    manager: Arc<CredentialManager>,
    store: Arc<dyn SessionStore>,
}

impl SessionAuthenticator {
    pub fn new(manager: Arc<CredentialManager>, store: Arc<dyn SessionStore>) -> Self {
        Self { manager, store }
    }

    pub fn manager(&self) -> &CredentialManager {
        &self.manager
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Starts authorization for `session` and returns the provider URL
    ///
    /// Any earlier pending authorization is replaced.
    pub async fn authorize(&self, session: &SessionId) -> Result<String> {
        let redirect = self.manager.begin_authorization();
        let mut data = self.store.get(session).await?.unwrap_or_default();
        data.pending = Some(redirect.pending);
        self.store.set(session, data).await?;
        debug!("Session {:?} is waiting for the OAuth callback", session);
        Ok(redirect.url)
    }

    /// Completes authorization from the callback URL
    ///
    /// On a state mismatch the session is left exactly as it was. Other
    /// failures consume the pending authorization so the user starts over.
    pub async fn callback(&self, session: &SessionId, callback_url: &str) -> Result<()> {
        let mut data = self.store.get(session).await?.unwrap_or_default();
        let Some(pending) = data.pending.clone() else {
            warn!("OAuth callback for a session with no pending authorization");
            return Err(OAuthError::StateMismatch);
        };

        match self.manager.complete_authorization(callback_url, &pending).await {
            Ok(record) => {
                data.pending = None;
                data.credential = Some(record);
                self.store.set(session, data).await?;
                info!("Session {:?} authenticated", session);
                Ok(())
            }
            Err(OAuthError::StateMismatch) => Err(OAuthError::StateMismatch),
            Err(e) => {
                data.pending = None;
                self.store.set(session, data).await?;
                Err(e)
            }
        }
    }

    /// Returns a valid credential for the session, refreshing if needed
    ///
    /// Refreshed records are persisted; records that can no longer be made
    /// valid are discarded.
    pub async fn credential(&self, session: &SessionId) -> Result<Option<CredentialRecord>> {
        let Some(mut data) = self.store.get(session).await? else {
            return Ok(None);
        };
        let Some(record) = data.credential.take() else {
            return Ok(None);
        };

        match self.manager.get_valid_credential(Some(record)).await {
            Some(ValidCredential::Current(record)) => Ok(Some(record)),
            Some(ValidCredential::Refreshed(record)) => {
                data.credential = Some(record.clone());
                self.store.set(session, data).await?;
                debug!("Persisted refreshed credential for {:?}", session);
                Ok(Some(record))
            }
            None => {
                info!("Discarding unusable credential for {:?}", session);
                self.store.set(session, data).await?;
                Ok(None)
            }
        }
    }

    /// Whether the session holds a credential (valid or refreshable)
    pub async fn is_authenticated(&self, session: &SessionId) -> Result<bool> {
        Ok(self
            .store
            .get(session)
            .await?
            .as_ref()
            .is_some_and(SessionData::is_authenticated))
    }

    /// Revokes the session's token and forgets the session
    ///
    /// The local session is deleted even when it cannot be loaded or
    /// revocation fails.
    pub async fn logout(&self, session: &SessionId) -> Result<()> {
        match self.store.get(session).await {
            Ok(data) => {
                if let Some(record) = data.and_then(|data| data.credential) {
                    if let Err(e) = self.manager.revoke(&record).await {
                        warn!("Token revocation failed, discarding local credential anyway: {}", e);
                    }
                }
            }
            Err(e) => warn!("Could not load session for revocation, deleting it anyway: {}", e),
        }
        self.store.delete(session).await?;
        info!("Session {:?} logged out", session);
        Ok(())
    }
}
