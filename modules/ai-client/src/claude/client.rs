use anyhow::{anyhow, Result};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use tracing::debug;

use super::types::{MessagesRequest, MessagesResponse};

pub(crate) const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// HTTP transport for the Messages API.
pub(crate) struct MessagesClient<'a> {
    http: &'a reqwest::Client,
    api_key: &'a str,
    base_url: &'a str,
}

impl<'a> MessagesClient<'a> {
    pub fn new(http: &'a reqwest::Client, api_key: &'a str, base_url: &'a str) -> Self {
        Self {
            http,
            api_key,
            base_url,
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(self.api_key)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    pub async fn send(&self, request: &MessagesRequest) -> Result<MessagesResponse> {
        let url = format!("{}/messages", self.base_url.trim_end_matches('/'));

        debug!(model = %request.model, tools = request.tools.len(), "Claude messages request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Claude API error ({status}): {body}"));
        }

        Ok(response.json().await?)
    }
}
