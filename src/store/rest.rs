//! HTTP client for the hosted backend.
//!
//! Speaks two APIs from one base URL:
//!
//! - **Rows** (`/rest/v1/{table}`, PostgREST conventions): filters as
//!   `col=eq.value`, sort as `order=a.asc,b.desc`, writes return the
//!   affected rows via `Prefer: return=representation`.
//! - **Objects** (`/storage/v1/object/...`): raw-body uploads with
//!   `x-upsert: false`, bulk deletes by prefix list.
//!
//! Every request carries the anon key as both `apikey` and bearer token.

use super::query::Query;
use super::{BlobStore, ContentStore, StoreError, public_object_url};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use std::time::Duration;

const RETURN_ROWS: &str = "return=representation";
const MERGE_ROWS: &str = "resolution=merge-duplicates,return=representation";

pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl RestStore {
    /// Create a client for the backend at `base_url`.
    ///
    /// * `anon_key` - public API key sent with every request.
    /// * `timeout` - applied to every request when set; `None` waits forever.
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, StoreError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_client(builder.build()?, base_url, anon_key))
    }

    /// Reuse an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(key) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", key);
        }
        if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {}", self.anon_key)) {
            headers.insert(AUTHORIZATION, bearer);
        }
        headers
    }

    fn id_filter(id: &str) -> [(&'static str, String); 1] {
        [("id", format!("eq.{id}"))]
    }

    /// Return the response unchanged on 2xx, otherwise an `Api` error
    /// carrying the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_rows(response: reqwest::Response) -> Result<Vec<Value>, StoreError> {
        let response = Self::ensure_success(response).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl ContentStore for RestStore {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        tracing::debug!(table, params = ?query.to_params(), "select");
        let response = self
            .client
            .get(self.table_url(table))
            .headers(self.auth_headers())
            .query(&query.to_params())
            .send()
            .await?;
        Self::parse_rows(response).await
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, StoreError> {
        let response = self
            .client
            .post(self.table_url(table))
            .headers(self.auth_headers())
            .header("Prefer", RETURN_ROWS)
            .json(&rows)
            .send()
            .await?;
        Self::parse_rows(response).await
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Vec<Value>, StoreError> {
        let response = self
            .client
            .patch(self.table_url(table))
            .headers(self.auth_headers())
            .header("Prefer", RETURN_ROWS)
            .query(&Self::id_filter(id))
            .json(&patch)
            .send()
            .await?;
        Self::parse_rows(response).await
    }

    async fn delete(&self, table: &str, id: &str) -> Result<usize, StoreError> {
        let response = self
            .client
            .delete(self.table_url(table))
            .headers(self.auth_headers())
            .header("Prefer", RETURN_ROWS)
            .query(&Self::id_filter(id))
            .send()
            .await?;
        Ok(Self::parse_rows(response).await?.len())
    }

    async fn upsert(
        &self,
        table: &str,
        rows: Vec<Value>,
        on_conflict: &str,
    ) -> Result<Vec<Value>, StoreError> {
        let response = self
            .client
            .post(self.table_url(table))
            .headers(self.auth_headers())
            .header("Prefer", MERGE_ROWS)
            .query(&[("on_conflict", on_conflict)])
            .json(&rows)
            .send()
            .await?;
        Self::parse_rows(response).await
    }
}

#[async_trait]
impl BlobStore for RestStore {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError> {
        let response = self
            .client
            .post(format!(
                "{}/storage/v1/object/{}/{}",
                self.base_url, bucket, key
            ))
            .headers(self.auth_headers())
            .header(CONTENT_TYPE, content_type)
            .header(CACHE_CONTROL, "3600")
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;

        match Self::ensure_success(response).await {
            Ok(_) => Ok(key.to_string()),
            // Storage reports a taken key as a conflict.
            Err(StoreError::Api { status, body }) if status == 409 || body.contains("Duplicate") => {
                Err(StoreError::AlreadyExists(key.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        public_object_url(&self.base_url, bucket, key)
    }

    async fn remove(&self, bucket: &str, keys: &[String]) -> Result<(), StoreError> {
        let response = self
            .client
            .delete(format!("{}/storage/v1/object/{}", self.base_url, bucket))
            .headers(self.auth_headers())
            .json(&serde_json::json!({ "prefixes": keys }))
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }
}
