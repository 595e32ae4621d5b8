use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;

use crate::{Error, Result, config::ScheduleConfig};

/// Where the raw ICS document comes from
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Feed location, used in logs and errors
    fn url(&self) -> &str;

    /// Fetch the full ICS payload
    async fn fetch(&self) -> Result<String>;
}

/// ICS feed served over HTTP
pub struct HttpFeed {
    client: Client,
    url: String,
}

impl HttpFeed {
    pub fn new(config: &ScheduleConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::ACCEPT,
                    reqwest::header::HeaderValue::from_static("text/calendar, */*;q=0.8"),
                );
                headers
            })
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    fn handle_error_req(&self, error: reqwest::Error) -> Error {
        let reason = if error.is_timeout() {
            "request timed out".to_string()
        } else if error.is_connect() {
            format!("connection failed: {}", error)
        } else {
            format!("request failed: {}", error)
        };
        Error::feed(&self.url, reason)
    }
}

#[async_trait]
impl FeedSource for HttpFeed {
    fn url(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<String> {
        tracing::debug!("Fetching calendar feed: {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.handle_error_req(e))?;

        if !response.status().is_success() {
            return Err(Error::feed(
                &self.url,
                format!("HTTP {}", response.status()),
            ));
        }

        response.text().await.map_err(|e| self.handle_error_req(e))
    }
}

/// Feed backed by an in-memory payload or a local `.ics` file
#[derive(Debug, Clone)]
pub enum StaticFeed {
    Payload { label: String, body: String },
    File(PathBuf),
}

impl StaticFeed {
    pub fn payload(label: impl Into<String>, body: impl Into<String>) -> Self {
        StaticFeed::Payload {
            label: label.into(),
            body: body.into(),
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        StaticFeed::File(path.into())
    }
}

#[async_trait]
impl FeedSource for StaticFeed {
    fn url(&self) -> &str {
        match self {
            StaticFeed::Payload { label, .. } => label,
            StaticFeed::File(path) => path.to_str().unwrap_or("<non-utf8 path>"),
        }
    }

    async fn fetch(&self) -> Result<String> {
        match self {
            StaticFeed::Payload { body, .. } => Ok(body.clone()),
            StaticFeed::File(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| Error::feed(self.url(), format!("cannot read file: {}", e))),
        }
    }
}

/// Pick the feed for a configured location: `file://` and plain paths are
/// read from disk, everything else goes over HTTP.
pub fn feed_for(config: &ScheduleConfig) -> Result<Box<dyn FeedSource>> {
    if let Some(path) = config.url.strip_prefix("file://") {
        return Ok(Box::new(StaticFeed::file(path)));
    }
    if config.url.starts_with("http://") || config.url.starts_with("https://") {
        return Ok(Box::new(HttpFeed::new(config)?));
    }
    Ok(Box::new(StaticFeed::file(&config.url)))
}
