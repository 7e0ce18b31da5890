use async_trait::async_trait;
use reqwest::{Client, redirect::Policy};
use std::{fmt::Debug, time::Duration};

use crate::error::FetchError;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_REDIRECTS: usize = 10;

/// Outbound GET returning the fully buffered body.
#[async_trait]
pub trait HttpFetch: Send + Sync + Debug {
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<String, FetchError>;
}

#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: Client,
}

impl RemoteClient {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    /// Certificate verification stays on; there is no switch for it.
    pub fn with_connect_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .connect_timeout(timeout)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .use_rustls_tls()
            .build()
            .map_err(|e| FetchError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { http })
    }
}

#[async_trait]
impl HttpFetch for RemoteClient {
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<String, FetchError> {
        let res = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::transport(url, e))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| FetchError::transport(url, e))?;

        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        Ok(body)
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
