use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::store::traits::DocumentStore;
use crate::store::types::{segments, ETag, Versioned};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Realtime Database accessed over its REST interface.
pub struct FirebaseStore {
    client: Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl FirebaseStore {
    /// Create a REST store for `base_url`, e.g. `https://my-app.firebaseio.com`
    pub fn new(base_url: &str, auth_token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("logement-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        let base_url = Url::parse(base_url).with_context(|| format!("Invalid database URL {base_url}"))?;

        Ok(Self {
            client,
            base_url,
            auth_token,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let url = config
            .database_url
            .as_deref()
            .context("No database URL configured")?;
        Self::new(url, config.auth_token.clone(), config.timeout())
    }

    /// REST endpoint of `path`; each segment is percent-encoded.
    fn url(&self, path: &str) -> ClientResult<Url> {
        let parts: Vec<&str> = segments(path).collect();
        let mut url = self.base_url.clone();
        {
            let mut out = url
                .path_segments_mut()
                .map_err(|_| ClientError::store("database URL cannot take a path"))?;
            out.pop_if_empty();
            match parts.split_last() {
                Some((last, parents)) => {
                    out.extend(parents);
                    out.push(&format!("{last}.json"));
                }
                None => {
                    out.push(".json");
                }
            }
        }
        Ok(url)
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.query(&[("auth", token)]),
            None => builder,
        }
    }

    async fn check(response: Response, path: &str) -> ClientResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!("Database returned {} for {}: {}", status, path, body);
        Err(ClientError::Store(format!("{} ({})", status, body.trim())))
    }
}

fn non_null(value: Value) -> Option<Value> {
    (!value.is_null()).then_some(value)
}

#[async_trait]
impl DocumentStore for FirebaseStore {
    async fn get(&self, path: &str) -> ClientResult<Option<Value>> {
        let url = self.url(path)?;
        debug!("GET {}", url);

        let response = self.request(self.client.get(url.clone())).send().await?;
        let response = Self::check(response, path).await?;
        Ok(non_null(response.json::<Value>().await?))
    }

    async fn set(&self, path: &str, value: Value) -> ClientResult<()> {
        let url = self.url(path)?;
        debug!("PUT {}", url);

        let response = self.request(self.client.put(url.clone())).json(&value).send().await?;
        Self::check(response, path).await?;
        Ok(())
    }

    async fn get_versioned(&self, path: &str) -> ClientResult<Versioned> {
        let url = self.url(path)?;
        debug!("GET {} (versioned)", url);

        let response = self
            .request(self.client.get(url.clone()))
            .header("X-Firebase-ETag", "true")
            .send()
            .await?;
        let response = Self::check(response, path).await?;
        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| ETag(v.to_string()))
            .ok_or_else(|| ClientError::store("database did not return an ETag"))?;
        let value = non_null(response.json::<Value>().await?);
        Ok(Versioned { value, etag })
    }

    async fn set_if(&self, path: &str, value: Value, etag: &ETag) -> ClientResult<bool> {
        let url = self.url(path)?;
        debug!("PUT {} if-match {}", url, etag.0);

        let response = self
            .request(self.client.put(url.clone()))
            .header(reqwest::header::IF_MATCH, &etag.0)
            .json(&value)
            .send()
            .await?;
        if response.status() == StatusCode::PRECONDITION_FAILED {
            debug!("Version mismatch on {}", path);
            return Ok(false);
        }
        Self::check(response, path).await?;
        Ok(true)
    }

    fn backend_name(&self) -> &'static str {
        "firebase"
    }
}
