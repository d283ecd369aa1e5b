use browserless_client::BrowserlessError;

pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Challenge page returned for {0} and no browser fallback is configured")]
    Challenged(String),

    #[error("Browser fallback failed: {0}")]
    Browser(#[from] BrowserlessError),
}
