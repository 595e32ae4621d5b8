use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Calendar feed unavailable: {url} - {reason}")]
    FeedUnavailable { url: String, reason: String },

    #[error("Timezone adjustment failed: {0}")]
    TimezoneAdjustment(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn feed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::FeedUnavailable {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Feed failures are worth retrying on the next scheduled cycle.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::FeedUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
