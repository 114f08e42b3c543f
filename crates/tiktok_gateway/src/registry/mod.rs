//! Optional persistence of signed-in users and the real-estate tool's listings.
//!
//! Both live in an external store. Failures here never block sign-in; callers
//! log them and move on.

pub mod memory;
pub mod supabase;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::platform::Profile;

pub use memory::MemoryUserRegistry;
pub use supabase::SupabaseStore;

/// Minimal user row keyed by the platform's `open_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub open_id: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<&Profile> for UserRecord {
    fn from(profile: &Profile) -> Self {
        Self {
            open_id: profile.open_id.clone(),
            username: profile.username.clone(),
            display_name: profile.display_name.clone(),
            avatar_url: profile.avatar_url.clone(),
        }
    }
}

/// Result of an upsert. Existing users are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Existing,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ListingId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingId::Number(n) => write!(f, "{n}"),
            ListingId::Text(s) => f.write_str(s),
        }
    }
}

/// Property listing owned by a user (`properties.owner_id == open_id`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Listing {
    #[serde(default)]
    pub id: Option<ListingId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid store URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("unexpected store payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// User persistence backend.
#[async_trait]
pub trait UserRegistry: Send + Sync {
    /// Insert `user` unless a record with the same `open_id` exists.
    async fn upsert(&self, user: &UserRecord) -> Result<UpsertOutcome, RegistryError>;
}

/// Listing lookup backend for the real-estate tool.
#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn listings_for(&self, owner_id: &str) -> Result<Vec<Listing>, RegistryError>;
}
