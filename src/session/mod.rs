//! Session capability used by the cart and checkout flows.
//!
//! Handlers never touch a global store: the router installs
//! [`crate::middleware_helpers::session::session_middleware`], which resolves the
//! caller's session id and hands a [`Session`] to the request extensions.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

use crate::errors::ServiceError;

/// Session key holding the cart key
pub const CART_KEY: &str = "cart-id";
/// Session key holding a one-shot success notice
pub const FLASH_SUCCESS_KEY: &str = "flash-success";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session backend failure: {0}")]
    Backend(String),
}

impl From<SessionError> for ServiceError {
    fn from(err: SessionError) -> Self {
        ServiceError::InternalError(err.to_string())
    }
}

/// Minimal session storage: values are strings addressed by session id and key.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>, SessionError>;
    async fn set(&self, session_id: &str, key: &str, value: String) -> Result<(), SessionError>;
    async fn remove(&self, session_id: &str, key: &str) -> Result<Option<String>, SessionError>;
    /// Persists the session and refreshes its idle deadline.
    async fn save(&self, session_id: &str) -> Result<(), SessionError>;
}

#[derive(Debug, Clone)]
struct SessionData {
    values: HashMap<String, String>,
    last_seen: Instant,
}

impl SessionData {
    fn new() -> Self {
        Self {
            values: HashMap::new(),
            last_seen: Instant::now(),
        }
    }
}

/// Process-local session store
#[derive(Debug, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<DashMap<String, SessionData>>,
    idle_timeout: Option<Duration>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            idle_timeout: None,
        }
    }

    /// Sessions not saved within `timeout` are dropped on next access
    pub fn with_idle_timeout(timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            idle_timeout: Some(timeout),
        }
    }

    fn is_expired(&self, data: &SessionData) -> bool {
        self.idle_timeout
            .map(|timeout| data.last_seen.elapsed() > timeout)
            .unwrap_or(false)
    }

    fn evict_if_expired(&self, session_id: &str) {
        let expired = self
            .sessions
            .get(session_id)
            .map(|entry| self.is_expired(entry.value()))
            .unwrap_or(false);
        if expired {
            self.sessions.remove(session_id);
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>, SessionError> {
        self.evict_if_expired(session_id);
        Ok(self
            .sessions
            .get(session_id)
            .and_then(|entry| entry.values.get(key).cloned()))
    }

    async fn set(&self, session_id: &str, key: &str, value: String) -> Result<(), SessionError> {
        self.evict_if_expired(session_id);
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(SessionData::new)
            .values
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, session_id: &str, key: &str) -> Result<Option<String>, SessionError> {
        self.evict_if_expired(session_id);
        Ok(self
            .sessions
            .get_mut(session_id)
            .and_then(|mut entry| entry.values.remove(key)))
    }

    async fn save(&self, session_id: &str) -> Result<(), SessionError> {
        if let Some(mut entry) = self.sessions.get_mut(session_id) {
            entry.last_seen = Instant::now();
        }
        Ok(())
    }
}

/// The current request's session
#[derive(Clone)]
pub struct Session {
    id: String,
    store: Arc<dyn SessionStore>,
}

impl Session {
    pub fn new(id: impl Into<String>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            id: id.into(),
            store,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        Ok(self.store.get(&self.id, key).await?)
    }

    pub async fn set(&self, key: &str, value: impl Into<String>) -> Result<(), ServiceError> {
        Ok(self.store.set(&self.id, key, value.into()).await?)
    }

    pub async fn save(&self) -> Result<(), ServiceError> {
        Ok(self.store.save(&self.id).await?)
    }

    /// Returns the cart key for this session, allocating one on first use.
    pub async fn cart_key(&self) -> Result<Uuid, ServiceError> {
        if let Some(existing) = self.get(CART_KEY).await? {
            if let Ok(key) = Uuid::parse_str(&existing) {
                return Ok(key);
            }
        }

        let key = Uuid::new_v4();
        self.set(CART_KEY, key.to_string()).await?;
        self.save().await?;
        Ok(key)
    }

    pub async fn set_flash(&self, message: impl Into<String>) -> Result<(), ServiceError> {
        self.set(FLASH_SUCCESS_KEY, message).await?;
        self.save().await
    }

    /// Reads and clears the flash notice
    pub async fn take_flash(&self) -> Result<Option<String>, ServiceError> {
        let flash = self.store.remove(&self.id, FLASH_SUCCESS_KEY).await?;
        if flash.is_some() {
            self.save().await?;
        }
        Ok(flash)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(store: &InMemorySessionStore, id: &str) -> Session {
        Session::new(id, Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn cart_key_is_stable_per_session() {
        let store = InMemorySessionStore::new();
        let alice = session(&store, "alice");
        let bob = session(&store, "bob");

        let first = alice.cart_key().await.unwrap();
        assert_eq!(alice.cart_key().await.unwrap(), first);
        assert_ne!(bob.cart_key().await.unwrap(), first);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn corrupt_cart_key_is_replaced() {
        let store = InMemorySessionStore::new();
        let s = session(&store, "s1");
        s.set(CART_KEY, "not-a-uuid").await.unwrap();

        let key = s.cart_key().await.unwrap();
        assert_eq!(s.get(CART_KEY).await.unwrap(), Some(key.to_string()));
    }

    #[tokio::test]
    async fn flash_is_consumed_once() {
        let store = InMemorySessionStore::new();
        let s = session(&store, "s1");
        s.set_flash("Order saved").await.unwrap();

        assert_eq!(s.take_flash().await.unwrap().as_deref(), Some("Order saved"));
        assert_eq!(s.take_flash().await.unwrap(), None);
    }

    #[tokio::test]
    async fn idle_sessions_expire() {
        let store = InMemorySessionStore::with_idle_timeout(Duration::from_millis(20));
        store.set("s1", "k", "v".into()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(store.get("s1", "k").await.unwrap(), None);
        assert!(store.is_empty());
    }
}
