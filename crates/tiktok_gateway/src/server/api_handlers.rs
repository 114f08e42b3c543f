//! JSON endpoints for the signed-in user.

use axum::{
    extract::{Query, State},
    Json,
};
use axum_extra::extract::{cookie::SignedCookieJar, WithRejection};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{authenticated, current_profile, AppState};
use crate::error::GatewayError;
use crate::platform::{Profile, VideoPage, MAX_VIDEOS_PER_PAGE};

/// Profile of the signed-in user, served from the session cache when present.
pub async fn me(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<Json<Profile>, GatewayError> {
    let auth = authenticated(&state, &jar)
        .await?
        .ok_or(GatewayError::Unauthenticated)?;

    Ok(Json(current_profile(&state, &auth).await?))
}

#[derive(Debug, Deserialize)]
pub struct VideoQuery {
    pub cursor: Option<i64>,
    pub max_count: Option<u32>,
}

/// One page of the signed-in user's videos. Requires the `video.list` scope.
pub async fn videos(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    WithRejection(Query(query), _): WithRejection<Query<VideoQuery>, GatewayError>,
) -> Result<Json<VideoPage>, GatewayError> {
    let auth = authenticated(&state, &jar)
        .await?
        .ok_or(GatewayError::Unauthenticated)?;

    let page = state
        .platform
        .list_videos(
            &auth.access_token,
            query.cursor,
            query.max_count.unwrap_or(MAX_VIDEOS_PER_PAGE),
        )
        .await?;
    Ok(Json(page))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
