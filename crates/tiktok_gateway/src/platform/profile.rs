use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{read_json, Envelope, PlatformClient, PlatformError};

const ENDPOINT: &str = "user info";
const PROFILE_FIELDS: &str = "open_id,union_id,avatar_url,display_name,username";

/// Basic TikTok profile (`user.info.basic` scope).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Stable per-app user identifier.
    pub open_id: String,
    #[serde(default)]
    pub union_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Profile {
    /// Best human-readable label for pages.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or(&self.open_id)
    }
}

#[derive(Debug, Deserialize)]
struct UserData {
    user: Profile,
}

impl PlatformClient {
    /// Fetch the profile of the user owning `access_token`.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<Profile, PlatformError> {
        let mut url = self.endpoints.user_info.clone();
        url.query_pairs_mut().append_pair("fields", PROFILE_FIELDS);

        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| PlatformError::from_reqwest(ENDPOINT, e))?;

        let envelope: Envelope<UserData> = read_json(ENDPOINT, response).await?;
        let profile = envelope.into_data(ENDPOINT)?.user;
        debug!(open_id = %profile.open_id, "fetched TikTok profile");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformEndpoints;
    use mockito::{Matcher, Server};
    use std::time::Duration;

    fn client_for(server: &Server) -> PlatformClient {
        let base = server.url().parse().unwrap();
        let authorize = "https://www.tiktok.com/v2/auth/authorize/".parse().unwrap();
        let endpoints = PlatformEndpoints::new(authorize, &base).unwrap();
        let http = crate::platform::build_http_client(Duration::from_secs(5)).unwrap();
        PlatformClient::new(http, endpoints)
    }

    #[tokio::test]
    async fn test_fetch_profile_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/user/info/")
            .match_query(Matcher::UrlEncoded("fields".into(), PROFILE_FIELDS.into()))
            .match_header("authorization", "Bearer tok-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"data":{"user":{"open_id":"oid-1","union_id":"uid-1","username":"shwe","display_name":"Shwe","avatar_url":"https://cdn.example/a.png"}},"error":{"code":"ok","message":"","log_id":"l"}}"#,
            )
            .create_async()
            .await;

        let profile = client_for(&server).fetch_profile("tok-1").await.unwrap();

        mock.assert_async().await;
        assert_eq!(profile.open_id, "oid-1");
        assert_eq!(profile.username.as_deref(), Some("shwe"));
        assert_eq!(profile.label(), "Shwe");
    }

    #[tokio::test]
    async fn test_fetch_profile_tolerates_missing_optional_fields() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v2/user/info/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"data":{"user":{"open_id":"oid-2","display_name":null}},"error":{"code":"ok"}}"#)
            .create_async()
            .await;

        let profile = client_for(&server).fetch_profile("tok").await.unwrap();

        assert_eq!(profile.display_name, None);
        assert_eq!(profile.label(), "oid-2");
    }

    #[tokio::test]
    async fn test_fetch_profile_upstream_status_is_propagated() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v2/user/info/")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"error":{"code":"access_token_invalid"}}"#)
            .create_async()
            .await;

        match client_for(&server).fetch_profile("stale").await {
            Err(PlatformError::Status { status, body, .. }) => {
                assert_eq!(status, 401);
                assert!(body.contains("access_token_invalid"));
            }
            other => panic!("Expected Status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_profile_missing_open_id_is_decode_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v2/user/info/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"data":{"user":{"display_name":"Nobody"}},"error":{"code":"ok"}}"#)
            .create_async()
            .await;

        assert!(matches!(
            client_for(&server).fetch_profile("tok").await,
            Err(PlatformError::Decode { .. })
        ));
    }
}
