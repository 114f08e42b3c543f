//! TikTok Open API client
//!
//! Typed access to the user-info and video-list endpoints. Every outbound call
//! resolves to `Result<_, PlatformError>`; the error carries the upstream
//! status and body so handlers can surface them unchanged.

mod profile;
mod videos;

use std::time::Duration;

use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub use profile::Profile;
pub use videos::{Video, VideoPage, MAX_VIDEOS_PER_PAGE};

const TOKEN_PATH: &str = "v2/oauth/token/";
const USER_INFO_PATH: &str = "v2/user/info/";
const VIDEO_LIST_PATH: &str = "v2/video/list/";

/// Resolved platform endpoint URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformEndpoints {
    pub authorize: Url,
    pub token: Url,
    pub user_info: Url,
    pub video_list: Url,
}

impl PlatformEndpoints {
    /// Derive the API endpoints from `api_base` (e.g. `https://open.tiktokapis.com`).
    pub fn new(authorize: Url, api_base: &Url) -> Result<Self, url::ParseError> {
        Ok(Self {
            authorize,
            token: api_base.join(TOKEN_PATH)?,
            user_info: api_base.join(USER_INFO_PATH)?,
            video_list: api_base.join(VIDEO_LIST_PATH)?,
        })
    }
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("{endpoint} endpoint returned {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    #[error("{endpoint} endpoint reported {code}: {message}")]
    Api {
        endpoint: &'static str,
        code: String,
        message: String,
    },

    #[error("{endpoint} endpoint timed out")]
    Timeout { endpoint: &'static str },

    #[error("{endpoint} request failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} endpoint returned an unexpected payload: {reason}")]
    Decode {
        endpoint: &'static str,
        reason: String,
    },
}

impl PlatformError {
    pub(crate) fn from_reqwest(endpoint: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PlatformError::Timeout { endpoint }
        } else {
            PlatformError::Transport {
                endpoint,
                source: err,
            }
        }
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            PlatformError::Status { endpoint, .. }
            | PlatformError::Api { endpoint, .. }
            | PlatformError::Timeout { endpoint }
            | PlatformError::Transport { endpoint, .. }
            | PlatformError::Decode { endpoint, .. } => endpoint,
        }
    }
}

/// Build the shared HTTP client. Every platform and store call goes through it,
/// so the timeout bounds all outbound I/O.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(concat!("tiktok_gateway/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Read a response body, failing on non-2xx with the upstream status and body.
pub(crate) async fn read_json<T: DeserializeOwned>(
    endpoint: &'static str,
    response: Response,
) -> Result<T, PlatformError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| PlatformError::from_reqwest(endpoint, e))?;

    if !status.is_success() {
        return Err(PlatformError::Status {
            endpoint,
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| PlatformError::Decode {
        endpoint,
        reason: e.to_string(),
    })
}

/// `{"data": ..., "error": {"code": "ok", ...}}` wrapper used by the Open API.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    code: String,
    #[serde(default)]
    message: String,
}

impl<T> Envelope<T> {
    fn into_data(self, endpoint: &'static str) -> Result<T, PlatformError> {
        if let Some(status) = self.error {
            if status.code != "ok" {
                return Err(PlatformError::Api {
                    endpoint,
                    code: status.code,
                    message: status.message,
                });
            }
        }
        self.data.ok_or_else(|| PlatformError::Decode {
            endpoint,
            reason: "missing data".to_string(),
        })
    }
}

/// Client for the bearer-authenticated Open API endpoints.
#[derive(Clone)]
pub struct PlatformClient {
    http: reqwest::Client,
    endpoints: PlatformEndpoints,
}

impl PlatformClient {
    pub fn new(http: reqwest::Client, endpoints: PlatformEndpoints) -> Self {
        Self { http, endpoints }
    }
}
