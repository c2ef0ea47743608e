//! Dataset sources.
//!
//! A source turns a resource key (usually a compact dtg such as
//! `202401150300`) into a parsed dataset. Every failure, transport or
//! content, is reported as [`FlowError::Fetch`] tagged with the key.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use flow_common::{FlowError, FlowResult, GridData};
use futures::StreamExt;
use reqwest::Client;
use tracing::{debug, instrument};

/// Something that can fetch a dataset by key.
#[async_trait]
pub trait GridSource: Send + Sync {
    async fn fetch(&self, key: &str) -> FlowResult<GridData>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Reads `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileSource {
    dir: PathBuf,
}

impl FileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> FlowResult<PathBuf> {
        if key.is_empty() || key.contains(&['/', '\\'][..]) || key.contains("..") {
            return Err(FlowError::fetch(key, "key is not a plain file name"));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl GridSource for FileSource {
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn fetch(&self, key: &str) -> FlowResult<GridData> {
        let path = self.path_for(key)?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| FlowError::fetch(key, format!("{}: {}", path.display(), e)))?;
        debug!(bytes = bytes.len(), "Read dataset file");
        GridData::from_slice(&bytes).map_err(|e| FlowError::fetch(key, e.to_string()))
    }

    fn describe(&self) -> String {
        format!("file://{}", self.dir.display())
    }
}

/// Fetches over HTTP from a URL template containing `{key}`.
///
/// A template without the placeholder gets the key appended.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    url_template: String,
    max_bytes: u64,
}

impl HttpSource {
    pub fn new(url_template: impl Into<String>, timeout: Duration, max_bytes: u64) -> FlowResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FlowError::config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url_template: url_template.into(),
            max_bytes,
        })
    }

    pub fn url_for(&self, key: &str) -> String {
        if self.url_template.contains("{key}") {
            self.url_template.replace("{key}", key)
        } else {
            format!("{}{}", self.url_template, key)
        }
    }
}

#[async_trait]
impl GridSource for HttpSource {
    #[instrument(skip(self))]
    async fn fetch(&self, key: &str) -> FlowResult<GridData> {
        let url = self.url_for(key);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FlowError::fetch(key, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FlowError::fetch(key, format!("HTTP {} from {}", status, url)));
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FlowError::fetch(key, e.to_string()))?;
            if (body.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(FlowError::fetch(
                    key,
                    format!("response exceeds {} bytes", self.max_bytes),
                ));
            }
            body.extend_from_slice(&chunk);
        }
        debug!(bytes = body.len(), url = %url, "Fetched dataset");
        GridData::from_slice(&body).map_err(|e| FlowError::fetch(key, e.to_string()))
    }

    fn describe(&self) -> String {
        self.url_template.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_template() {
        let source = HttpSource::new("http://host/wind/{key}.json", Duration::from_secs(1), 1024).unwrap();
        assert_eq!(source.url_for("202401150300"), "http://host/wind/202401150300.json");

        let source = HttpSource::new("http://host/wind/", Duration::from_secs(1), 1024).unwrap();
        assert_eq!(source.url_for("a.json"), "http://host/wind/a.json");
    }

    #[test]
    fn test_file_keys_cannot_escape_dir() {
        let source = FileSource::new("/data");
        assert!(source.path_for("../etc/passwd").is_err());
        assert!(source.path_for("a/b").is_err());
        assert!(source.path_for("").is_err());
        assert_eq!(
            source.path_for("202401150000").unwrap(),
            PathBuf::from("/data/202401150000.json")
        );
    }
}
