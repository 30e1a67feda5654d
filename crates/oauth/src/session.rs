//! Session store interface and the in-memory implementation
//!
//! Each browser session owns its pending authorization and credential record.
//! Nothing here is shared between sessions.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;
use tracing::debug;

use crate::constants::DEFAULT_SESSION_IDLE_SECS;
use crate::error::Result;
use crate::flow::PendingAuthorization;
use crate::tokens::CredentialRecord;

/// Length of an encoded session id (32 random bytes)
const SESSION_ID_LEN: usize = 43;

/// Opaque, unguessable session identifier
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::thread_rng().gen();
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Accepts only ids in the generated shape, so ids are safe as file names
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = raw.len() == SESSION_ID_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Enough to correlate log lines without leaking the cookie value
        write!(f, "SessionId({}..)", &self.0[..6.min(self.0.len())])
    }
}

/// Everything a session remembers about authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    /// Authorization awaiting its callback
    #[serde(default)]
    pub pending: Option<PendingAuthorization>,

    #[serde(default)]
    pub credential: Option<CredentialRecord>,

    pub last_seen: DateTime<Utc>,
}

impl SessionData {
    pub fn new() -> Self {
        Self {
            pending: None,
            credential: None,
            last_seen: Utc::now(),
        }
    }

    pub fn is_idle_at(&self, now: DateTime<Utc>, idle_timeout: Duration) -> bool {
        now >= self.last_seen + idle_timeout
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }
}

impl Default for SessionData {
    fn default() -> Self {
        Self::new()
    }
}

/// Keyed session persistence
///
/// Stores drop sessions that have been idle longer than their timeout; such
/// sessions read as absent.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &SessionId) -> Result<Option<SessionData>>;

    async fn set(&self, id: &SessionId, data: SessionData) -> Result<()>;

    async fn delete(&self, id: &SessionId) -> Result<()>;
}

/// Process-local session store
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, SessionData>>,
    idle_timeout: Duration,
}

impl MemorySessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops every idle session; returns how many were removed
    pub async fn purge_idle(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, data| !data.is_idle_at(now, self.idle_timeout));
        let removed = before - sessions.len();
        if removed > 0 {
            debug!("Purged {} idle sessions", removed);
        }
        removed
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_SESSION_IDLE_SECS))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<SessionData>> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(data) if data.is_idle_at(Utc::now(), self.idle_timeout) => {
                debug!("Session {:?} expired", id);
                sessions.remove(id);
                Ok(None)
            }
            Some(data) => {
                data.last_seen = Utc::now();
                Ok(Some(data.clone()))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, id: &SessionId, mut data: SessionData) -> Result<()> {
        data.last_seen = Utc::now();
        self.sessions.write().await.insert(id.clone(), data);
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<()> {
        self.sessions.write().await.remove(id);
        Ok(())
    }
}
