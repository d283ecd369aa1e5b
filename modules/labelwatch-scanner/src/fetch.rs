use std::time::Duration;

use async_trait::async_trait;
use browserless_client::BrowserlessClient;
use tracing::{info, warn};

use crate::error::{FetchError, Result};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
const CHALLENGE_MARKER: &str = "just a moment";

/// Fetches explorer pages. Implementations return the body lower-cased.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Bot-wall interstitial served instead of the real page.
pub fn is_challenge_page(body: &str) -> bool {
    body.contains(CHALLENGE_MARKER)
}

/// Plain HTTP fetch, retried through Browserless when the explorer serves a
/// challenge page.
pub struct HttpPageFetcher {
    client: reqwest::Client,
    browserless: Option<BrowserlessClient>,
}

impl HttpPageFetcher {
    pub fn new(browserless: Option<BrowserlessClient>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        if browserless.is_some() {
            info!("HttpPageFetcher initialized with browser fallback");
        } else {
            info!("HttpPageFetcher initialized without browser fallback");
        }

        Ok(Self {
            client,
            browserless,
        })
    }

    async fn render(&self, url: &str) -> Result<String> {
        let Some(ref browserless) = self.browserless else {
            return Err(FetchError::Challenged(url.to_string()));
        };
        info!(url, fetcher = "browserless", "Challenge page, retrying through browser");
        let html = browserless.content(url).await?;
        Ok(html.to_lowercase())
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let network = |e: reqwest::Error| FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        };

        let resp = self.client.get(url).send().await.map_err(network)?;
        let status = resp.status();
        let body = resp.text().await.map_err(network)?.to_lowercase();

        if is_challenge_page(&body) {
            return self.render(url).await;
        }

        if !status.is_success() {
            warn!(url, status = status.as_u16(), "Explorer returned error status");
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(body)
    }
}
