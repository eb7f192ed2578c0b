//! HTTP client abstraction for testability

use super::CatalogError;

/// Trait for the HTTP operations the catalog and asset fetcher need.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests.
pub trait HttpClient: Send + Sync {
    /// Performs an HTTP GET request and returns the response body.
    fn get(&self, url: &str) -> Result<Vec<u8>, CatalogError>;

    /// Performs an HTTP POST request with a JSON body and returns the
    /// response body.
    fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<Vec<u8>, CatalogError>;
}

/// Real HTTP client implementation using reqwest.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with default configuration.
    pub fn new() -> Result<Self, CatalogError> {
        Self::with_timeout(30)
    }

    /// Creates a new ReqwestClient with custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, CatalogError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CatalogError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    fn read_body(url: &str, response: reqwest::blocking::Response) -> Result<Vec<u8>, CatalogError> {
        if !response.status().is_success() {
            return Err(CatalogError::Http(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| CatalogError::Http(format!("Failed to read response: {}", e)))
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| CatalogError::Http(format!("Request failed: {}", e)))?;
        Self::read_body(url, response)
    }

    fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<Vec<u8>, CatalogError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .map_err(|e| CatalogError::Http(format!("Request failed: {}", e)))?;
        Self::read_body(url, response)
    }
}
