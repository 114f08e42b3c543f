//! Per-browser session records
//!
//! The browser holds only a signed, opaque [`SessionId`]; the CSRF state,
//! tokens and cached profile live server-side behind [`SessionStore`], and the
//! callback consumes the state with a single compare-and-clear.

use std::fmt;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::oauth::TokenGrant;
use super::state::random_token;
use crate::platform::Profile;

/// Opaque session identifier carried in the signed cookie.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(random_token())
    }

    /// Accept a cookie value as an id. Rejects anything that could not have
    /// come from [`SessionId::generate`].
    pub fn parse(raw: &str) -> Option<Self> {
        let well_formed = !raw.is_empty()
            && raw.len() <= 128
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        well_formed.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionId(***)")
    }
}

/// Everything stored for one browser session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    /// Unconsumed CSRF state from the last `/login`.
    pub oauth_state: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub open_id: Option<String>,
    pub scope: Option<String>,
    /// Cached user-info response.
    pub profile: Option<Profile>,
}

impl SessionData {
    /// Holds an access token that has not passed its expiry.
    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated_at(Utc::now())
    }

    pub fn is_authenticated_at(&self, now: DateTime<Utc>) -> bool {
        self.access_token.is_some() && !self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    fn apply_grant(&mut self, grant: TokenGrant) {
        self.access_token = Some(grant.access_token);
        self.refresh_token = grant.refresh_token;
        self.expires_at = grant.expires_at;
        self.open_id = grant.open_id;
        self.scope = grant.scope;
        // A new token may belong to a different account.
        self.profile = None;
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found or expired")]
    NotFound,

    #[error("session backend error: {0}")]
    Backend(String),
}

/// Session storage backend.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a live session. Expired sessions read as `None`.
    async fn load(&self, id: &SessionId) -> Result<Option<SessionData>, SessionError>;

    /// Record a fresh CSRF state, creating the session if needed and replacing
    /// any unconsumed state.
    async fn begin_login(&self, id: &SessionId, state: String) -> Result<(), SessionError>;

    /// Atomically compare `presented` with the stored state and clear it on a
    /// match. Returns `false` on mismatch, missing state or missing session.
    async fn consume_state(&self, id: &SessionId, presented: &str) -> Result<bool, SessionError>;

    /// Store the tokens from a successful exchange in one write.
    async fn store_grant(&self, id: &SessionId, grant: TokenGrant) -> Result<(), SessionError>;

    async fn store_profile(&self, id: &SessionId, profile: Profile) -> Result<(), SessionError>;

    /// Drop every key of the session.
    async fn clear(&self, id: &SessionId) -> Result<(), SessionError>;
}

#[derive(Debug, Clone)]
struct SessionEntry {
    data: SessionData,
    expires_at: DateTime<Utc>,
}

impl SessionEntry {
    fn new(now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            data: SessionData::default(),
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// In-process store backed by a sharded concurrent map. Per-key operations
/// run under the shard lock, so `consume_state` is atomic per session.
pub struct MemorySessionStore {
    sessions: DashMap<SessionId, SessionEntry>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(ttl: StdDuration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::days(1)),
        }
    }

    /// Remove expired sessions; returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Run `update` on a live session.
    fn update<F>(&self, id: &SessionId, update: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut SessionData),
    {
        let now = Utc::now();
        self.sessions.remove_if(id, |_, entry| entry.is_expired(now));

        let mut entry = self.sessions.get_mut(id).ok_or(SessionError::NotFound)?;
        update(&mut entry.data);
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionData>, SessionError> {
        let now = Utc::now();
        self.sessions.remove_if(id, |_, entry| entry.is_expired(now));
        Ok(self.sessions.get(id).map(|entry| entry.data.clone()))
    }

    async fn begin_login(&self, id: &SessionId, state: String) -> Result<(), SessionError> {
        let now = Utc::now();
        let mut entry = self
            .sessions
            .entry(id.clone())
            .or_insert_with(|| SessionEntry::new(now, self.ttl));

        if entry.is_expired(now) {
            *entry = SessionEntry::new(now, self.ttl);
        }
        entry.data.oauth_state = Some(state);
        Ok(())
    }

    async fn consume_state(&self, id: &SessionId, presented: &str) -> Result<bool, SessionError> {
        let now = Utc::now();
        self.sessions.remove_if(id, |_, entry| entry.is_expired(now));

        let Some(mut entry) = self.sessions.get_mut(id) else {
            return Ok(false);
        };

        let matches = matches!(entry.data.oauth_state.as_deref(), Some(stored) if stored == presented);
        if matches {
            entry.data.oauth_state = None;
        }
        Ok(matches)
    }

    async fn store_grant(&self, id: &SessionId, grant: TokenGrant) -> Result<(), SessionError> {
        self.update(id, |data| data.apply_grant(grant))
    }

    async fn store_profile(&self, id: &SessionId, profile: Profile) -> Result<(), SessionError> {
        self.update(id, |data| data.profile = Some(profile))
    }

    async fn clear(&self, id: &SessionId) -> Result<(), SessionError> {
        self.sessions.remove(id);
        Ok(())
    }
}
