//! OAuth Authentication Handlers
//!
//! `/login` → TikTok authorize page → `/callback` → token exchange → dashboard,
//! plus `/logout`.

use axum::{
    extract::{Query, State},
    response::Response,
    Form,
};
use axum_extra::extract::{cookie::SignedCookieJar, WithRejection};
use serde::Deserialize;
use tracing::{info, warn};

use super::{cookies, found, AppState};
use crate::auth::{generate_state, SessionId};
use crate::error::GatewayError;
use crate::platform::Profile;
use crate::registry::{UpsertOutcome, UserRecord};

/// Landing page after a successful sign-in.
pub const LOGIN_REDIRECT: &str = "/dashboard";

/// OAuth callback parameters (query string or form body)
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Start the authorization flow: store a fresh state and redirect to TikTok.
///
/// Every login starts a new session id. A presented session is dropped, so a
/// cookie planted before sign-in never becomes the authenticated one.
pub async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, Response), GatewayError> {
    if let Some(previous) = cookies::session_id(&jar) {
        state.sessions.clear(&previous).await?;
    }
    let session_id = SessionId::generate();

    let oauth_state = generate_state();
    state.sessions.begin_login(&session_id, oauth_state.clone()).await?;

    let url = state.oauth.authorization_url(&oauth_state);
    info!(scopes = %state.oauth.config().scopes.join(","), "redirecting to TikTok authorization");

    let cookie = cookies::session_cookie(
        &session_id,
        state.settings.session_ttl,
        state.settings.secure_cookies,
    );
    Ok((jar.add(cookie), found(url.as_str())))
}

/// `GET /callback?code=..&state=..`
pub async fn callback_query(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    WithRejection(Query(params), _): WithRejection<Query<CallbackParams>, GatewayError>,
) -> Result<Response, GatewayError> {
    complete_login(&state, &jar, params).await
}

/// `POST /callback` with a form body (`response_mode=form_post`).
pub async fn callback_form(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    WithRejection(Form(params), _): WithRejection<Form<CallbackParams>, GatewayError>,
) -> Result<Response, GatewayError> {
    complete_login(&state, &jar, params).await
}

async fn complete_login(
    state: &AppState,
    jar: &SignedCookieJar,
    params: CallbackParams,
) -> Result<Response, GatewayError> {
    if let Some(error) = params.error {
        warn!(error = %error, description = ?params.error_description, "OAuth error from TikTok");
        return Err(GatewayError::AuthorizationDenied {
            error,
            description: params.error_description,
        });
    }

    let code = params
        .code
        .filter(|code| !code.is_empty())
        .ok_or(GatewayError::MissingCode)?;

    // The state check gates the exchange: no token request without a match.
    let session_id = cookies::session_id(jar).ok_or(GatewayError::InvalidState)?;
    let presented = params.state.unwrap_or_default();
    if presented.is_empty() || !state.sessions.consume_state(&session_id, &presented).await? {
        warn!("OAuth state mismatch");
        return Err(GatewayError::InvalidState);
    }

    let grant = state.oauth.exchange_code(&code).await.map_err(|e| {
        warn!(error = %e, "token exchange failed");
        e
    })?;

    let access_token = grant.access_token.clone();
    let open_id = grant.open_id.clone();
    state.sessions.store_grant(&session_id, grant).await?;
    info!(open_id = ?open_id, "TikTok OAuth login successful");

    match state.platform.fetch_profile(&access_token).await {
        Ok(profile) => {
            register_user(state, &profile).await;
            if let Err(e) = state.sessions.store_profile(&session_id, profile).await {
                warn!(error = %e, "failed to cache profile in session");
            }
        }
        Err(e) => warn!(error = %e, "profile fetch after login failed, continuing"),
    }

    Ok(found(LOGIN_REDIRECT))
}

/// Best-effort registry write; failures are logged only.
async fn register_user(state: &AppState, profile: &Profile) {
    let Some(registry) = &state.registry else {
        return;
    };

    match registry.upsert(&UserRecord::from(profile)).await {
        Ok(UpsertOutcome::Inserted) => info!(open_id = %profile.open_id, "registered new user"),
        Ok(UpsertOutcome::Existing) => {}
        Err(e) => warn!(open_id = %profile.open_id, error = %e, "user registry upsert failed"),
    }
}

/// Clear the whole session and go home.
pub async fn logout(State(state): State<AppState>, jar: SignedCookieJar) -> (SignedCookieJar, Response) {
    if let Some(session_id) = cookies::session_id(&jar) {
        if let Err(e) = state.sessions.clear(&session_id).await {
            warn!(error = %e, "session clear failed during logout");
        }
    }

    (jar.remove(cookies::clear_session_cookie()), found("/"))
}
