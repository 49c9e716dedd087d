//! Upstream fetcher: one GET per call, no retries

use crate::error::RelayError;
use hyper::body::Bytes;
use tracing::debug;

/// Raw upstream response, kept only for the lifetime of one request
#[derive(Debug, Clone)]
pub struct Fetched {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl Fetched {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl UpstreamFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for a suffix appended to the base (`?id=...` or a relative path)
    pub fn url_for(&self, suffix: &str) -> String {
        format!("{}{}", self.base_url, suffix)
    }

    /// Fetch the page for a pathway id
    pub async fn fetch_page(&self, pathway_id: &str) -> Result<Fetched, RelayError> {
        let suffix = format!("?id={}", urlencoding::encode(pathway_id));
        self.fetch(&suffix).await
    }

    /// GET `base + suffix`. Transport failures are returned as errors; any
    /// HTTP status, including errors, is a successful fetch.
    pub async fn fetch(&self, suffix: &str) -> Result<Fetched, RelayError> {
        let url = self.url_for(suffix);
        debug!(url = %url, "Fetching from upstream");

        let response = self.client.get(&url).send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.bytes().await?;

        debug!(url = %url, status, content_type = ?content_type, bytes = body.len(), "Upstream responded");

        Ok(Fetched {
            status,
            content_type,
            body,
        })
    }
}
