use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::IgnoredAny;
use tracing::debug;
use url::Url;

use super::{Listing, ListingStore, RegistryError, UpsertOutcome, UserRecord, UserRegistry};
use crate::config::{Secret, SupabaseConfig};

const USERS_TABLE: &str = "users";
const PROPERTIES_TABLE: &str = "properties";

/// Supabase (PostgREST) backend for users and property listings.
///
/// Expected schema:
///
/// ```sql
/// CREATE TABLE users (
///     id BIGSERIAL PRIMARY KEY,
///     open_id TEXT UNIQUE NOT NULL,
///     username TEXT,
///     display_name TEXT,
///     avatar_url TEXT,
///     created_at TIMESTAMPTZ DEFAULT now()
/// );
///
/// CREATE TABLE properties (
///     id BIGSERIAL PRIMARY KEY,
///     owner_id TEXT NOT NULL,
///     title TEXT,
///     address TEXT,
///     price NUMERIC
/// );
/// ```
#[derive(Clone)]
pub struct SupabaseStore {
    http: reqwest::Client,
    rest_base: Url,
    key: Secret,
}

impl SupabaseStore {
    pub fn new(http: reqwest::Client, config: &SupabaseConfig) -> Result<Self, RegistryError> {
        Ok(Self {
            http,
            rest_base: config.url.join("rest/v1/")?,
            key: config.key.clone(),
        })
    }

    fn table(&self, name: &str) -> Result<Url, RegistryError> {
        Ok(self.rest_base.join(name)?)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", self.key.expose())
            .bearer_auth(self.key.expose())
    }

    async fn find_user(&self, open_id: &str) -> Result<bool, RegistryError> {
        let mut url = self.table(USERS_TABLE)?;
        url.query_pairs_mut()
            .append_pair("select", "open_id")
            .append_pair("open_id", &format!("eq.{open_id}"))
            .append_pair("limit", "1");

        let response = self.authorized(self.http.get(url)).send().await?;
        let rows: Vec<IgnoredAny> = serde_json::from_str(&success_body(response).await?)?;
        Ok(!rows.is_empty())
    }

    async fn insert_user(&self, user: &UserRecord) -> Result<UpsertOutcome, RegistryError> {
        let response = self
            .authorized(self.http.post(self.table(USERS_TABLE)?))
            .header("Prefer", "return=minimal")
            .json(user)
            .send()
            .await?;

        // A concurrent first login for the same user won the insert.
        if response.status() == StatusCode::CONFLICT {
            return Ok(UpsertOutcome::Existing);
        }
        success_body(response).await?;
        Ok(UpsertOutcome::Inserted)
    }
}

async fn success_body(response: Response) -> Result<String, RegistryError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(RegistryError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

#[async_trait]
impl UserRegistry for SupabaseStore {
    async fn upsert(&self, user: &UserRecord) -> Result<UpsertOutcome, RegistryError> {
        if self.find_user(&user.open_id).await? {
            debug!(open_id = %user.open_id, "user already registered");
            return Ok(UpsertOutcome::Existing);
        }
        self.insert_user(user).await
    }
}

#[async_trait]
impl ListingStore for SupabaseStore {
    async fn listings_for(&self, owner_id: &str) -> Result<Vec<Listing>, RegistryError> {
        let mut url = self.table(PROPERTIES_TABLE)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("owner_id", &format!("eq.{owner_id}"));

        let response = self.authorized(self.http.get(url)).send().await?;
        Ok(serde_json::from_str(&success_body(response).await?)?)
    }
}
