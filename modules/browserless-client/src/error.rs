use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserlessError>;

#[derive(Debug, Error)]
pub enum BrowserlessError {
    #[error("Failed to build HTTP client: {0}")]
    Build(String),

    #[error("Browserless unreachable: {0}")]
    Network(String),

    #[error("Rendering {url} failed (status {status}): {message}")]
    Render {
        url: String,
        status: u16,
        message: String,
    },
}

impl From<reqwest::Error> for BrowserlessError {
    fn from(err: reqwest::Error) -> Self {
        BrowserlessError::Network(err.to_string())
    }
}
