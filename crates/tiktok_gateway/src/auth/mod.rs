//! TikTok Login Kit authorization-code flow and session storage.

pub mod oauth;
pub mod session;
pub mod state;

pub use oauth::{OAuthClient, OAuthConfig, TokenGrant, TokenResponse};
pub use session::{MemorySessionStore, SessionData, SessionError, SessionId, SessionStore};
pub use state::generate_state;
