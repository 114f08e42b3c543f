use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use url::Url;

use crate::config::Secret;
use crate::platform::{read_json, PlatformEndpoints, PlatformError};

const TOKEN_ENDPOINT: &str = "token";

/// TikTok Login Kit client registration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_key: String,
    pub client_secret: Secret,
    /// Must be identical at authorize time and at token exchange.
    pub redirect_uri: Url,
    pub scopes: Vec<String>,
}

/// Token endpoint success payload.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_expires_in: Option<i64>,
    #[serde(default)]
    pub open_id: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// OAuth error payload. TikTok may send it with a 200 status.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenPayload {
    Granted(TokenResponse),
    Rejected(TokenErrorResponse),
}

/// Credentials obtained from a successful code exchange, ready for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub open_id: Option<String>,
    pub scope: Option<String>,
}

impl TokenGrant {
    pub fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: response
                .expires_in
                .filter(|secs| *secs > 0)
                .map(|secs| now + Duration::seconds(secs)),
            open_id: response.open_id,
            scope: response.scope,
        }
    }
}

/// OAuth client for the authorization-code flow.
pub struct OAuthClient {
    config: OAuthConfig,
    endpoints: PlatformEndpoints,
    http_client: reqwest::Client,
}

impl OAuthClient {
    /// Create a new OAuth client. `http_client` is shared and carries the
    /// outbound timeout.
    pub fn new(config: OAuthConfig, endpoints: PlatformEndpoints, http_client: reqwest::Client) -> Self {
        Self {
            config,
            endpoints,
            http_client,
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the authorize URL the browser is redirected to.
    pub fn authorization_url(&self, state: &str) -> Url {
        let mut url = self.endpoints.authorize.clone();

        url.query_pairs_mut()
            .append_pair("client_key", &self.config.client_key)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scopes.join(","))
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("state", state);

        url
    }

    /// Exchange an authorization code for tokens.
    ///
    /// Non-2xx responses and OAuth error payloads are returned as errors;
    /// nothing is persisted here.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, PlatformError> {
        let form_params = [
            ("client_key", self.config.client_key.as_str()),
            ("client_secret", self.config.client_secret.expose()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let response = self
            .http_client
            .post(self.endpoints.token.clone())
            .header("Cache-Control", "no-cache")
            .form(&form_params)
            .send()
            .await
            .map_err(|e| PlatformError::from_reqwest(TOKEN_ENDPOINT, e))?;

        match read_json::<TokenPayload>(TOKEN_ENDPOINT, response).await? {
            TokenPayload::Granted(token) => {
                tracing::debug!(
                    open_id = ?token.open_id,
                    scope = ?token.scope,
                    token_type = ?token.token_type,
                    refresh_expires_in = ?token.refresh_expires_in,
                    "token exchange succeeded"
                );
                Ok(TokenGrant::from_response(token, Utc::now()))
            }
            TokenPayload::Rejected(rejection) => Err(PlatformError::Api {
                endpoint: TOKEN_ENDPOINT,
                code: rejection.error,
                message: rejection.error_description.unwrap_or_default(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::build_http_client;
    use mockito::{Matcher, Server};

    fn test_client(api_base: &str) -> OAuthClient {
        let config = OAuthConfig {
            client_key: "awkey123".to_string(),
            client_secret: Secret::new("topsecret"),
            redirect_uri: "https://gateway.example.com/callback".parse().unwrap(),
            scopes: vec!["user.info.basic".to_string(), "video.list".to_string()],
        };
        let endpoints = PlatformEndpoints::new(
            "https://www.tiktok.com/v2/auth/authorize/".parse().unwrap(),
            &api_base.parse().unwrap(),
        )
        .unwrap();
        OAuthClient::new(
            config,
            endpoints,
            build_http_client(std::time::Duration::from_secs(5)).unwrap(),
        )
    }

    #[test]
    fn test_authorization_url() {
        let client = test_client("https://open.tiktokapis.com");

        let url = client.authorization_url("state-xyz");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert!(url.as_str().starts_with("https://www.tiktok.com/v2/auth/authorize/?"));
        assert!(pairs.contains(&("client_key".into(), "awkey123".into())));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&("scope".into(), "user.info.basic,video.list".into())));
        assert!(pairs.contains(&(
            "redirect_uri".into(),
            "https://gateway.example.com/callback".into()
        )));
        assert!(pairs.contains(&("state".into(), "state-xyz".into())));
    }

    #[test]
    fn test_grant_expiry_is_absolute() {
        let now = Utc::now();
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"T","expires_in":3600}"#).unwrap();

        let grant = TokenGrant::from_response(response, now);

        assert_eq!(grant.access_token, "T");
        assert_eq!(grant.refresh_token, None);
        assert_eq!(grant.expires_at, Some(now + Duration::seconds(3600)));
    }

    #[tokio::test]
    async fn test_exchange_code_posts_form() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v2/oauth/token/")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("client_key".into(), "awkey123".into()),
                Matcher::UrlEncoded("client_secret".into(), "topsecret".into()),
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "abc".into()),
                Matcher::UrlEncoded(
                    "redirect_uri".into(),
                    "https://gateway.example.com/callback".into(),
                ),
            ]))
            .with_status(200)
            .with_body(
                r#"{"access_token":"act.1","expires_in":86400,"open_id":"oid","refresh_token":"rft.1","refresh_expires_in":31536000,"scope":"user.info.basic","token_type":"Bearer"}"#,
            )
            .create_async()
            .await;

        let grant = test_client(&server.url()).exchange_code("abc").await.unwrap();

        mock.assert_async().await;
        assert_eq!(grant.access_token, "act.1");
        assert_eq!(grant.refresh_token.as_deref(), Some("rft.1"));
        assert_eq!(grant.open_id.as_deref(), Some("oid"));
        assert!(grant.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_exchange_code_error_status() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v2/oauth/token/")
            .with_status(401)
            .with_body(r#"{"error":"invalid_client"}"#)
            .create_async()
            .await;

        match test_client(&server.url()).exchange_code("abc").await {
            Err(PlatformError::Status { status, body, .. }) => {
                assert_eq!(status, 401);
                assert!(body.contains("invalid_client"));
            }
            other => panic!("Expected Status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exchange_code_error_payload_with_ok_status() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v2/oauth/token/")
            .with_status(200)
            .with_body(r#"{"error":"invalid_grant","error_description":"Authorization code is expired.","log_id":"abc"}"#)
            .create_async()
            .await;

        match test_client(&server.url()).exchange_code("old").await {
            Err(PlatformError::Api { code, message, .. }) => {
                assert_eq!(code, "invalid_grant");
                assert_eq!(message, "Authorization code is expired.");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exchange_code_garbage_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v2/oauth/token/")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        assert!(matches!(
            test_client(&server.url()).exchange_code("abc").await,
            Err(PlatformError::Decode { .. })
        ));
    }
}
