use async_trait::async_trait;

// Ingest-side ports
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    /// GET `url` with the given query parameters. Transport failures and timeouts
    /// are `Err`; any HTTP status, including non-2xx, is `Ok`.
    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpGetResult, String>;
}

#[derive(Clone, Debug)]
pub struct HttpGetResult {
    pub status: u16,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl HttpGetResult {
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}
