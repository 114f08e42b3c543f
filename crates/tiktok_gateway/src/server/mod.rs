//! TikTok Gateway HTTP Server
//!
//! Wires the OAuth flow, profile API and pages into one axum router.
//! Collaborators are built once at startup and shared through [`AppState`].

pub mod api_handlers;
pub mod cookies;
pub mod oauth_handlers;
pub mod pages;


use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::{FromRef, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router as AxumRouter,
};
use axum_extra::extract::cookie::{Key, SignedCookieJar};
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{debug, info, warn};

use crate::auth::{MemorySessionStore, OAuthClient, SessionData, SessionId, SessionStore};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::platform::{build_http_client, PlatformClient, PlatformError, Profile};
use crate::registry::{ListingStore, SupabaseStore, UserRegistry};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(300);

/// Request-independent settings the handlers consult.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub secure_cookies: bool,
    pub session_ttl: Duration,
    /// Host restriction is active only when this is non-empty.
    pub allowed_hosts: Vec<String>,
    pub static_dir: PathBuf,
}

impl ServerSettings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        let allowed_hosts = if config.environment.is_production() {
            config.allowed_hosts.clone()
        } else {
            Vec::new()
        };

        Self {
            secure_cookies: config.secure_cookies(),
            session_ttl: config.session_ttl,
            allowed_hosts,
            static_dir: config.static_dir.clone(),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub oauth: Arc<OAuthClient>,
    pub platform: PlatformClient,
    pub sessions: Arc<dyn SessionStore>,
    pub registry: Option<Arc<dyn UserRegistry>>,
    pub listings: Option<Arc<dyn ListingStore>>,
    pub settings: Arc<ServerSettings>,
    cookie_key: Key,
}

impl AppState {
    /// Build the state around an existing HTTP client and session store.
    /// The registry and listing store start disabled.
    pub fn new(config: &GatewayConfig, http: reqwest::Client, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            oauth: Arc::new(OAuthClient::new(
                config.oauth.clone(),
                config.endpoints.clone(),
                http.clone(),
            )),
            platform: PlatformClient::new(http, config.endpoints.clone()),
            sessions,
            registry: None,
            listings: None,
            settings: Arc::new(ServerSettings::from_config(config)),
            cookie_key: cookies::cookie_key(&config.session_secret),
        }
    }

    pub fn with_registry(mut self, registry: Arc<dyn UserRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_listings(mut self, listings: Arc<dyn ListingStore>) -> Self {
        self.listings = Some(listings);
        self
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// A session holding an unexpired access token.
pub(crate) struct Authenticated {
    pub id: SessionId,
    pub data: SessionData,
    pub access_token: String,
}

/// Resolve the signed session cookie to an authenticated session, if any.
pub(crate) async fn authenticated(
    state: &AppState,
    jar: &SignedCookieJar,
) -> Result<Option<Authenticated>, GatewayError> {
    let Some(id) = cookies::session_id(jar) else {
        return Ok(None);
    };
    let Some(data) = state.sessions.load(&id).await? else {
        return Ok(None);
    };
    if !data.is_authenticated() {
        return Ok(None);
    }
    let Some(access_token) = data.access_token.clone() else {
        return Ok(None);
    };

    Ok(Some(Authenticated {
        id,
        data,
        access_token,
    }))
}

/// Cached profile, or a fresh fetch that is then cached in the session.
pub(crate) async fn current_profile(
    state: &AppState,
    auth: &Authenticated,
) -> Result<Profile, PlatformError> {
    if let Some(profile) = &auth.data.profile {
        return Ok(profile.clone());
    }

    let profile = state.platform.fetch_profile(&auth.access_token).await?;
    if let Err(e) = state.sessions.store_profile(&auth.id, profile.clone()).await {
        warn!(error = %e, "failed to cache profile in session");
    }
    Ok(profile)
}

/// `302 Found` to `location`.
pub(crate) fn found(location: &str) -> Response {
    match HeaderValue::try_from(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Build the router with every gateway route.
pub fn build_router(state: AppState) -> AxumRouter {
    let static_dir = state.settings.static_dir.clone();

    AxumRouter::new()
        // Pages
        .route("/", get(pages::home))
        .route("/dashboard", get(pages::dashboard))
        .route("/service/real-estate", get(pages::real_estate))
        .route("/service/real-estate/listings", get(pages::real_estate_listings))
        // OAuth flow
        .route("/login", get(oauth_handlers::login))
        .route(
            "/callback",
            get(oauth_handlers::callback_query).post(oauth_handlers::callback_form),
        )
        .route("/logout", get(oauth_handlers::logout))
        // JSON API
        .route("/me", get(api_handlers::me))
        .route("/api/me", get(api_handlers::me))
        .route("/videos", get(api_handlers::videos))
        .route("/api/videos", get(api_handlers::videos))
        .route("/health", get(api_handlers::health))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(middleware::from_fn_with_state(state.clone(), restrict_hosts))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn restrict_hosts(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(host) = rejected_host(&state.settings.allowed_hosts, request.headers()) {
        return GatewayError::HostNotAllowed(host).into_response();
    }
    next.run(request).await
}

/// The request's host, when it is not on a non-empty allow list.
fn rejected_host(allowed_hosts: &[String], headers: &HeaderMap) -> Option<String> {
    if allowed_hosts.is_empty() {
        return None;
    }

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(strip_port)
        .unwrap_or_default();

    let allowed = allowed_hosts
        .iter()
        .any(|candidate| candidate == "*" || candidate.eq_ignore_ascii_case(host));
    (!allowed).then(|| host.to_string())
}

fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        // [v6]:port
        return rest.split(']').next().unwrap_or(rest);
    }
    host.rsplit_once(':').map(|(name, _)| name).unwrap_or(host)
}

/// Start the TikTok Gateway HTTP server
///
/// Builds the shared HTTP client, session store and optional Supabase
/// registry, then serves until the listener fails.
///
/// # Errors
/// Returns error if the HTTP client cannot be built, the Supabase URL is
/// unusable, or the listener cannot bind.
pub async fn start_server(config: GatewayConfig) -> anyhow::Result<()> {
    let http = build_http_client(config.http_timeout).context("Failed to build HTTP client")?;

    let sessions = Arc::new(MemorySessionStore::new(config.session_ttl));
    let mut state = AppState::new(&config, http.clone(), sessions.clone());

    match &config.supabase {
        Some(supabase) => {
            let store = Arc::new(
                SupabaseStore::new(http, supabase).context("Failed to configure Supabase store")?,
            );
            state = state.with_registry(store.clone()).with_listings(store);
            info!(url = %supabase.url, "[OK] Supabase user registry enabled");
        }
        None => info!("[INFO] SUPABASE_URL not set, user registry disabled"),
    }

    if config.environment.is_production() && config.allowed_hosts.is_empty() {
        warn!("[WARN] APP_ENV=production without ALLOWED_HOSTS, host restriction disabled");
    }

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = sessions.purge_expired();
            if purged > 0 {
                debug!(purged, "purged expired sessions");
            }
        }
    });

    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("[INFO] TikTok Gateway listening on {}", addr);
    info!("[INFO] Available endpoints:");
    info!("  GET    /                  - Home page");
    info!("  GET    /login             - Start TikTok authorization");
    info!("  GET    /callback          - OAuth callback (also POST)");
    info!("  GET    /dashboard         - Signed-in dashboard");
    info!("  GET    /me, /api/me       - Profile JSON");
    info!("  GET    /videos, /api/videos - Video list JSON");
    info!("  GET    /logout            - Clear session");

    axum::serve(listener, app).await?;

    Ok(())
}
