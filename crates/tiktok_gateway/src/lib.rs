//! TikTok Gateway
//!
//! Sign users in with TikTok Login Kit and serve their profile to a small
//! set of pages and JSON endpoints.
//!
//! # Features
//! - OAuth 2.0 authorization-code flow with single-use CSRF state
//! - Signed session cookies backed by a server-side session store
//! - Profile and video list calls against the TikTok v2 API
//! - Optional Supabase user registry and real-estate listings

pub mod auth;
pub mod config;
pub mod error;
pub mod platform;
pub mod registry;
pub mod server;

pub use auth::{MemorySessionStore, OAuthClient, OAuthConfig, SessionStore};
pub use config::{ConfigError, GatewayConfig};
pub use error::GatewayError;
pub use platform::{PlatformClient, PlatformError, Profile};
pub use server::{build_router, start_server, AppState};
