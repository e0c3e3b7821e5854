//! HTTP download source

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info};

use super::{Source, StageError, StageOutput};

/// Default request timeout for downloads
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Streams the body of an HTTP GET as byte chunks
pub struct FileDownloader {
    url: String,
    headers: BTreeMap<String, String>,
    timeout: Duration,
    user_agent: Option<String>,
}

impl FileDownloader {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        debug!(%url, "FileDownloader::new: called");
        Self {
            url,
            headers: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
        }
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    fn client(&self) -> Result<reqwest::Client, StageError> {
        let mut builder = reqwest::Client::builder().timeout(self.timeout);
        if let Some(agent) = &self.user_agent {
            builder = builder.user_agent(agent.as_str());
        }
        Ok(builder.build()?)
    }
}

#[async_trait]
impl Source for FileDownloader {
    fn name(&self) -> &'static str {
        "file-downloader"
    }

    async fn produce(self: Box<Self>, output: StageOutput) -> Result<(), StageError> {
        debug!(url = %self.url, "FileDownloader::produce: called");
        let client = self.client()?;

        let mut request = client.get(&self.url);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            debug!(url = %self.url, %status, "FileDownloader::produce: non-success status");
            return Err(StageError::HttpStatus {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let mut body = response.bytes_stream();
        let mut total = 0usize;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            total += chunk.len();
            output.send(chunk).await?;
        }

        info!(url = %self.url, bytes = total, "Download finished");
        Ok(())
    }
}
