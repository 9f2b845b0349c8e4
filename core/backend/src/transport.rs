//! Raw byte transfer against pre-signed upload/download URLs.

use async_trait::async_trait;
use reqwest::{header, Client};

use pftoolkit_common::{Error, Result};

/// Companion transport for moving file bytes.
///
/// Upload and download URLs are issued by the file store; this trait only
/// moves bytes to and from them.
#[async_trait]
pub trait BlobTransport: Send + Sync {
    /// PUT `data` to `url` with the given content type.
    async fn put(&self, url: &str, data: Vec<u8>, content_type: &str) -> Result<()>;

    /// GET the bytes behind `url`.
    async fn get(&self, url: &str) -> Result<Vec<u8>>;
}

/// HTTP implementation of [`BlobTransport`].
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    /// Create a transport sharing an existing client.
    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl BlobTransport for HttpTransport {
    async fn put(&self, url: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        let size = data.len();
        let response = self
            .http
            .put(url)
            .header(header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to upload file: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network(format!("Upload failed: {} - {}", status, body)));
        }

        tracing::debug!(bytes = size, "Raw upload complete");
        Ok(())
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to download file: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network(format!("Download failed: {} - {}", status, body)));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Error::Network(format!("Failed to read download response: {}", e)))
    }
}
