use crate::error::FetchError;
use reqwest::Client;
use std::time::Duration;

/// Retrieves raw reputation data from remote sources.
///
/// Returns payload bytes or a typed failure; retry policy belongs to the
/// refresh coordinator, not here.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    client: Client,
}

impl SourceFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(concat!("repguard/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Fetch the raw payload for a source within `timeout`.
    ///
    /// A non-success HTTP status is an error; received-but-garbage content
    /// is not, that is the parser's call.
    pub async fn fetch(
        &self,
        source_name: &str,
        url: &str,
        timeout: Duration,
    ) -> Result<Vec<u8>, FetchError> {
        log::debug!("Fetching '{source_name}' from {url}");

        let response = self.client.get(url).timeout(timeout).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await?;
        log::debug!("Fetched {} bytes from '{source_name}'", body.len());
        Ok(body.to_vec())
    }
}

impl Default for SourceFetcher {
    fn default() -> Self {
        Self::new()
    }
}
