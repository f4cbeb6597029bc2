use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::auth::{Session, User};
use crate::common::{is_retryable_status, next_backoff, parse_retry_after, truncate_for_log};
use crate::error::{StoreError, StoreResult};
use crate::store::{EntityKind, EntityStore, Record, SortSpec};

/// Connection settings for the hosted backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub app_id: String,
    pub token: Option<String>,
    pub max_retries: u32,
}

/// REST client for the hosted entity API:
/// `{base}/apps/{app_id}/entities/{Entity}[/{id}]`.
#[derive(Clone)]
pub struct HttpStore {
    client: Client,
    config: BackendConfig,
}

impl HttpStore {
    pub fn new(client: Client, config: BackendConfig) -> Self {
        Self { client, config }
    }

    fn entity_url(&self, kind: EntityKind) -> String {
        format!(
            "{}/apps/{}/entities/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.app_id,
            kind
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let req = self.client.request(method, url);
        match self.config.token.as_deref() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Reads are idempotent, so retryable statuses and transport errors are
    /// retried with backoff. Writes go through `send_once`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> StoreResult<T> {
        let attempts = self.config.max_retries.max(1);
        let mut backoff = Duration::from_secs(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let response = self.request(Method::GET, url).query(query).send().await;
            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp.json::<T>().await?);
                    }
                    let retry_after = parse_retry_after(resp.headers().get(RETRY_AFTER));
                    let body = resp.text().await.unwrap_or_default();
                    if is_retryable_status(status) && attempt < attempts {
                        tracing::debug!(
                            "GET {} returned {} (attempt {}/{}); retrying",
                            url,
                            status,
                            attempt,
                            attempts
                        );
                        tokio::time::sleep(retry_after.unwrap_or(backoff)).await;
                        backoff = next_backoff(backoff);
                        continue;
                    }
                    return Err(status_error(status, &body));
                }
                Err(err) => {
                    if attempt == attempts {
                        return Err(StoreError::Transport(err));
                    }
                    tracing::debug!("GET {} failed (attempt {}/{}): {}", url, attempt, attempts, err);
                    tokio::time::sleep(backoff).await;
                    backoff = next_backoff(backoff);
                }
            }
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&Record>,
    ) -> StoreResult<reqwest::Response> {
        let mut req = self.request(method, url);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }
        Ok(resp)
    }

    async fn write_record(&self, method: Method, url: &str, body: &Record) -> StoreResult<Record> {
        let resp = self.send_once(method, url, Some(body)).await?;
        Ok(resp.json::<Record>().await?)
    }
}

fn status_error(status: StatusCode, body: &str) -> StoreError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return StoreError::Unauthenticated;
    }
    StoreError::Status {
        status: status.as_u16(),
        body: truncate_for_log(body),
    }
}

fn not_found_as(kind: EntityKind, id: &str, err: StoreError) -> StoreError {
    match err {
        StoreError::Status { status: 404, .. } => StoreError::NotFound {
            kind,
            id: id.to_string(),
        },
        other => other,
    }
}

impl EntityStore for HttpStore {
    async fn list(
        &self,
        kind: EntityKind,
        sort: Option<&SortSpec>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Record>> {
        let mut query = Vec::new();
        if let Some(sort) = sort {
            query.push(("sort", sort.as_param()));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        self.get_json(&self.entity_url(kind), &query).await
    }

    async fn filter(
        &self,
        kind: EntityKind,
        matches: &Record,
        sort: Option<&SortSpec>,
    ) -> StoreResult<Vec<Record>> {
        let mut query = vec![("q", Value::Object(matches.clone()).to_string())];
        if let Some(sort) = sort {
            query.push(("sort", sort.as_param()));
        }
        self.get_json(&self.entity_url(kind), &query).await
    }

    async fn get(&self, kind: EntityKind, id: &str) -> StoreResult<Record> {
        let url = format!("{}/{}", self.entity_url(kind), id);
        self.get_json(&url, &[])
            .await
            .map_err(|e| not_found_as(kind, id, e))
    }

    async fn create(&self, kind: EntityKind, fields: Record) -> StoreResult<Record> {
        let url = self.entity_url(kind);
        self.write_record(Method::POST, &url, &fields).await
    }

    async fn update(&self, kind: EntityKind, id: &str, fields: Record) -> StoreResult<Record> {
        let url = format!("{}/{}", self.entity_url(kind), id);
        self.write_record(Method::PUT, &url, &fields)
            .await
            .map_err(|e| not_found_as(kind, id, e))
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> StoreResult<()> {
        let url = format!("{}/{}", self.entity_url(kind), id);
        self.send_once(Method::DELETE, &url, None)
            .await
            .map(|_| ())
            .map_err(|e| not_found_as(kind, id, e))
    }
}

impl Session for HttpStore {
    async fn me(&self) -> StoreResult<User> {
        let url = format!(
            "{}/apps/{}/entities/User/me",
            self.config.base_url.trim_end_matches('/'),
            self.config.app_id
        );
        if self.config.token.is_none() {
            return Err(StoreError::Unauthenticated);
        }
        self.get_json(&url, &[]).await
    }
}
