//! HTTP seam between the credential manager and the provider

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::constants::DEFAULT_CALL_TIMEOUT_SECS;
use crate::error::Result;

/// Status and body of a provider response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Form-encoded POST against the token and revoke endpoints
///
/// Implementations map connection failures and timeouts to
/// `OAuthError::Network`; any HTTP status is returned as a reply.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpReply>;
}

/// `reqwest` backed transport with a request timeout
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cloud-drive/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::with_client(
            reqwest::Client::builder()
                .timeout(Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
        )
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpReply> {
        let response = self.client.post(url).form(form).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!("POST {} -> {}", url, status);
        Ok(HttpReply { status, body })
    }
}
