use crate::app::ports::{HttpClientPort, HttpGetResult};
use crate::config::HttpConfig;
use crate::error::Result;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

/// `HttpClientPort` over a shared reqwest client with a per-request timeout.
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<HttpGetResult, String> {
        tracing::debug!("HTTP GET request to: {}", url);
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    format!("timed out: {}", e)
                } else {
                    e.to_string()
                }
            })?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = resp.bytes().await.map_err(|e| e.to_string())?.to_vec();
        tracing::debug!("HTTP response: status={}, size={} bytes", status, bytes.len());
        Ok(HttpGetResult {
            status,
            bytes,
            content_type,
        })
    }
}
