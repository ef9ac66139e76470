//! Livestream store backed by a PostgREST endpoint (e.g. Supabase).
//!
//! Rows live in the `livestreams` table under `{base}/rest/v1`. The service key
//! is sent both as `apikey` and as a bearer token.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::LivestreamRepository;
use crate::domain::{LivestreamRecord, LivestreamUpdate, NewLivestream};
use crate::{Error, Result};

const TABLE: &str = "livestreams";

/// Postgres error code for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Clone, Deserialize)]
struct PostgrestRow {
    id: Value,
    facebook_video_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    is_active: bool,
    #[serde(default)]
    is_private: bool,
    #[serde(default)]
    facebook_group_id: Option<String>,
    #[serde(default)]
    class_id: Option<Value>,
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    ended_at: Option<DateTime<Utc>>,
}

impl From<PostgrestRow> for LivestreamRecord {
    fn from(row: PostgrestRow) -> Self {
        Self {
            id: value_to_string(row.id),
            external_video_id: row.facebook_video_id,
            title: row.title.unwrap_or_default(),
            is_active: row.is_active,
            is_private: row.is_private,
            group_id: row.facebook_group_id,
            class_id: row.class_id.filter(|v| !v.is_null()).map(value_to_string),
            started_at: row.started_at,
            ended_at: row.ended_at,
        }
    }
}

/// Ids may be integer or uuid columns.
fn value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[derive(Debug, Serialize)]
struct InsertRow<'a> {
    facebook_video_id: &'a str,
    title: &'a str,
    is_active: bool,
    is_private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    facebook_group_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    class_id: Option<&'a str>,
    started_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
struct PostgrestErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

/// PostgREST implementation of [`LivestreamRepository`].
pub struct PostgrestLivestreamRepository {
    client: Client,
    base_url: String,
    service_key: String,
}

impl PostgrestLivestreamRepository {
    pub fn new(client: Client, url: &str, service_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: format!("{}/rest/v1", url.trim_end_matches('/')),
            service_key: service_key.into(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}/{}", self.base_url, TABLE)
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.table_url())
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header("Prefer", "return=representation")
    }

    async fn rows(&self, response: Response, key: &str) -> Result<Vec<PostgrestRow>> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<Vec<PostgrestRow>>().await?);
        }

        let text = response.text().await.unwrap_or_default();
        let body: PostgrestErrorBody = serde_json::from_str(&text).unwrap_or_default();
        if status == StatusCode::CONFLICT || body.code.as_deref() == Some(UNIQUE_VIOLATION) {
            return Err(Error::conflict("Livestream", key));
        }

        let detail = match body.message.or(body.details) {
            Some(detail) => detail,
            None if text.is_empty() => status.to_string(),
            None => text,
        };
        Err(Error::store(format!("{TABLE} request failed ({status}): {detail}")))
    }
}

/// Only the fields an update sets are sent; `ended_at: Some(None)` becomes `null`.
fn patch_body(update: &LivestreamUpdate) -> Map<String, Value> {
    let mut body = Map::new();
    if let Some(title) = &update.title {
        body.insert("title".into(), Value::from(title.as_str()));
    }
    if let Some(active) = update.is_active {
        body.insert("is_active".into(), Value::from(active));
    }
    if let Some(started) = update.started_at {
        body.insert("started_at".into(), Value::from(started.to_rfc3339()));
    }
    if let Some(ended) = update.ended_at {
        body.insert(
            "ended_at".into(),
            ended.map_or(Value::Null, |at| Value::from(at.to_rfc3339())),
        );
    }
    body
}

#[async_trait]
impl LivestreamRepository for PostgrestLivestreamRepository {
    async fn find_by_external_id(
        &self,
        external_video_id: &str,
    ) -> Result<Option<LivestreamRecord>> {
        let filter = format!("eq.{external_video_id}");
        let response = self
            .request(reqwest::Method::GET)
            .query(&[
                ("select", "*"),
                ("facebook_video_id", filter.as_str()),
                ("limit", "1"),
            ])
            .send()
            .await?;
        let rows = self.rows(response, external_video_id).await?;
        Ok(rows.into_iter().next().map(Into::into))
    }

    async fn create(&self, new: &NewLivestream) -> Result<LivestreamRecord> {
        let row = InsertRow {
            facebook_video_id: &new.external_video_id,
            title: &new.title,
            is_active: true,
            is_private: new.is_private,
            facebook_group_id: new.group_id.as_deref(),
            class_id: new.class_id.as_deref(),
            started_at: new.started_at,
        };
        let response = self
            .request(reqwest::Method::POST)
            .json(&row)
            .send()
            .await?;
        let rows = self.rows(response, &new.external_video_id).await?;
        rows.into_iter()
            .next()
            .map(Into::into)
            .ok_or_else(|| Error::store(format!("{TABLE} insert returned no row")))
    }

    async fn update(
        &self,
        id: &str,
        update: &LivestreamUpdate,
    ) -> Result<Option<LivestreamRecord>> {
        let id_filter = format!("eq.{id}");
        let mut query = vec![("id", id_filter)];
        if let Some(expected) = update.expect_active {
            query.push(("is_active", format!("eq.{expected}")));
        }

        let body = patch_body(update);
        if body.is_empty() {
            let response = self
                .request(reqwest::Method::GET)
                .query(&query)
                .send()
                .await?;
            let rows = self.rows(response, id).await?;
            return Ok(rows.into_iter().next().map(Into::into));
        }

        debug!(id, fields = body.len(), "Patching livestream");
        let response = self
            .request(reqwest::Method::PATCH)
            .query(&query)
            .json(&body)
            .send()
            .await?;
        let rows = self.rows(response, id).await?;
        Ok(rows.into_iter().next().map(Into::into))
    }

    async fn list_active(&self) -> Result<Vec<LivestreamRecord>> {
        let response = self
            .request(reqwest::Method::GET)
            .query(&[
                ("select", "*"),
                ("is_active", "eq.true"),
                ("order", "started_at.desc.nullslast"),
            ])
            .send()
            .await?;
        let rows = self.rows(response, "active").await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
