use serde::{Deserialize, Serialize};

use super::{read_json, Envelope, PlatformClient, PlatformError};

const ENDPOINT: &str = "video list";
const VIDEO_FIELDS: &str = "id,title,cover_image_url,share_url,create_time";

/// Upper bound the platform accepts for `max_count`.
pub const MAX_VIDEOS_PER_PAGE: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub share_url: Option<String>,
    #[serde(default)]
    pub create_time: Option<i64>,
}

/// One page of the user's public videos. `cursor` feeds the next request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoPage {
    #[serde(default)]
    pub videos: Vec<Video>,
    #[serde(default)]
    pub cursor: Option<i64>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
struct VideoListRequest {
    max_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<i64>,
}

impl PlatformClient {
    /// List the user's videos (`video.list` scope). `max_count` is clamped to
    /// `1..=MAX_VIDEOS_PER_PAGE`.
    pub async fn list_videos(
        &self,
        access_token: &str,
        cursor: Option<i64>,
        max_count: u32,
    ) -> Result<VideoPage, PlatformError> {
        let mut url = self.endpoints.video_list.clone();
        url.query_pairs_mut().append_pair("fields", VIDEO_FIELDS);

        let request = VideoListRequest {
            max_count: max_count.clamp(1, MAX_VIDEOS_PER_PAGE),
            cursor,
        };

        let response = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| PlatformError::from_reqwest(ENDPOINT, e))?;

        let envelope: Envelope<VideoPage> = read_json(ENDPOINT, response).await?;
        envelope.into_data(ENDPOINT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{build_http_client, PlatformEndpoints};
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::time::Duration;

    fn client_for(server: &Server) -> PlatformClient {
        let base = server.url().parse().unwrap();
        let authorize = "https://www.tiktok.com/v2/auth/authorize/".parse().unwrap();
        let endpoints = PlatformEndpoints::new(authorize, &base).unwrap();
        PlatformClient::new(build_http_client(Duration::from_secs(5)).unwrap(), endpoints)
    }

    #[tokio::test]
    async fn test_list_videos_sends_cursor_and_clamped_count() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v2/video/list/")
            .match_query(Matcher::UrlEncoded("fields".into(), VIDEO_FIELDS.into()))
            .match_header("authorization", "Bearer tok")
            .match_body(Matcher::Json(json!({"max_count": 20, "cursor": 1700000000000i64})))
            .with_status(200)
            .with_body(
                r#"{"data":{"videos":[{"id":"v1","title":"First","share_url":"https://tiktok.com/v1","create_time":1699999999}],"cursor":1699999999000,"has_more":true},"error":{"code":"ok","message":""}}"#,
            )
            .create_async()
            .await;

        let page = client_for(&server)
            .list_videos("tok", Some(1_700_000_000_000), 50)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(page.videos.len(), 1);
        assert_eq!(page.videos[0].title.as_deref(), Some("First"));
        assert_eq!(page.cursor, Some(1_699_999_999_000));
        assert!(page.has_more);
    }

    #[tokio::test]
    async fn test_list_videos_first_page_omits_cursor() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v2/video/list/")
            .match_query(Matcher::Any)
            .match_body(Matcher::Json(json!({"max_count": 1})))
            .with_status(200)
            .with_body(r#"{"data":{"videos":[],"has_more":false},"error":{"code":"ok"}}"#)
            .create_async()
            .await;

        let page = client_for(&server).list_videos("tok", None, 0).await.unwrap();

        mock.assert_async().await;
        assert!(page.videos.is_empty());
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_list_videos_scope_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v2/video/list/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"data":{},"error":{"code":"scope_not_authorized","message":"video.list missing"}}"#)
            .create_async()
            .await;

        match client_for(&server).list_videos("tok", None, 10).await {
            Err(PlatformError::Api { code, .. }) => assert_eq!(code, "scope_not_authorized"),
            other => panic!("Expected Api error, got {:?}", other),
        }
    }
}
