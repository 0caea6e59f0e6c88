//! Remote API client
//!
//! Thin wrapper over `reqwest` carrying the account credentials. Every
//! request sends the developer key as the `api_key` query parameter and,
//! when configured, the account access token as a bearer token.

use dcombine_common::config::ApiConfig;
use dcombine_common::{Error, Result};
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::error;

/// Responses at or above this status end the current operation
pub const HTTP_FAIL_THRESHOLD: u16 = 400;

const USER_AGENT: &str = concat!("dcombine-sync/", env!("CARGO_PKG_VERSION"));

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Status, reason and body of a failed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl From<FetchFailure> for Error {
    fn from(f: FetchFailure) -> Self {
        Error::Fetch {
            status: f.status,
            reason: f.reason,
            body: f.body,
        }
    }
}

/// Authenticated client for the remote contacts API
#[derive(Clone)]
pub struct ApiClient {
    http_client: Client,
    base_uri: String,
    api_key: String,
    access_token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::Config("API key not configured".to_string()))?;

        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http_client,
            base_uri: config.base_uri.trim_end_matches('/').to_string(),
            api_key,
            access_token: config.access_token.clone(),
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Absolute URL for an API path or continuation link
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_uri, path)
    }

    /// GET `path` with `params`; the API key is always appended
    pub async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Response> {
        let mut request = self
            .http_client
            .get(self.url(path))
            .query(&[("api_key", self.api_key.as_str())])
            .query(params);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        request.send().await.map_err(|e| Error::Http(e.to_string()))
    }

    /// POST a JSON body to `path` with `params`; the API key is always appended
    pub async fn post_json(&self, path: &str, params: &[(&str, String)], body: &Value) -> Result<Response> {
        let mut request = self
            .http_client
            .post(self.url(path))
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
            .json(body);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        request.send().await.map_err(|e| Error::Http(e.to_string()))
    }
}

/// Split a response into its JSON body or the failure it reports
///
/// Failures are logged here with status, reason and body.
pub async fn read_json(response: Response) -> Result<std::result::Result<Value, FetchFailure>> {
    let status = response.status();
    if status.as_u16() >= HTTP_FAIL_THRESHOLD {
        let failure = FetchFailure {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            body: response.text().await.unwrap_or_default(),
        };
        error!(
            status = failure.status,
            "Attempt to harvest encountered {}: {}: {}",
            failure.status,
            failure.reason,
            failure.body
        );
        return Ok(Err(failure));
    }

    let body = response
        .json::<Value>()
        .await
        .map_err(|e| Error::Http(format!("Invalid JSON response: {}", e)))?;
    Ok(Ok(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(key: Option<&str>) -> ApiConfig {
        ApiConfig {
            base_uri: "http://127.0.0.1:9/".to_string(),
            api_key: key.map(String::from),
            access_token: None,
        }
    }

    #[test]
    fn test_requires_api_key() {
        assert!(matches!(ApiClient::new(&config(None)), Err(Error::Config(_))));
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = ApiClient::new(&config(Some("k"))).unwrap();
        assert_eq!(client.url("/v2/lists"), "http://127.0.0.1:9/v2/lists");
        assert_eq!(client.api_key(), "k");
    }

    #[test]
    fn test_fetch_failure_converts_to_fetch_error() {
        let err: Error = FetchFailure { status: 503, reason: "Service Unavailable".into(), body: "down".into() }.into();
        assert_eq!(err.kind(), dcombine_common::ErrorKind::FetchFailure);
    }
}
