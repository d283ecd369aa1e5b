use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::botdb::{BotDbClient, Scope};
use crate::error::{Result, StoreError};

const SECRETS_OBJECT: &str = "secrets.json";

/// Credentials bundle, loaded once at process start.
#[derive(Clone, Deserialize)]
pub struct Secrets {
    pub postgres: PostgresSecrets,
}

#[derive(Clone, Deserialize)]
pub struct PostgresSecrets {
    pub url: String,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("postgres.url", &"<redacted>")
            .finish()
    }
}

impl Secrets {
    pub fn from_json(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path)?;
        Self::from_json(&raw)
    }

    pub async fn from_botdb(db: &BotDbClient) -> Result<Self> {
        let raw = db.get(Scope::Owner, SECRETS_OBJECT).await?;
        Self::from_json(&raw)
    }
}

pub enum SecretsSource {
    File(PathBuf),
    BotDb(Arc<BotDbClient>),
}

impl SecretsSource {
    async fn load(&self) -> Result<Secrets> {
        match self {
            SecretsSource::File(path) => Secrets::from_file(path),
            SecretsSource::BotDb(db) => Secrets::from_botdb(db).await,
        }
    }
}

/// Load secrets, retrying to ride out a provider that is not up yet.
pub async fn load_with_retry(
    source: &SecretsSource,
    attempts: u32,
    delay: Duration,
) -> Result<Secrets> {
    let mut last_err = StoreError::Unavailable("no attempts made to load secrets".to_string());
    for attempt in 1..=attempts {
        match source.load().await {
            Ok(secrets) => {
                info!(attempt, "Loaded secrets");
                return Ok(secrets);
            }
            Err(e) => {
                warn!(attempt, error = %e, "Failed to load secrets, retrying in {delay:?}");
                last_err = e;
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_bundle() {
        let secrets = Secrets::from_json(br#"{"postgres": {"url": "postgres://u:p@db/labels"}}"#)
            .unwrap();
        assert_eq!(secrets.postgres.url, "postgres://u:p@db/labels");
        assert!(!format!("{secrets:?}").contains("u:p"));
    }

    #[tokio::test]
    async fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"postgres": {{"url": "postgres://localhost/labels"}}}}"#).unwrap();

        let source = SecretsSource::File(file.path().to_path_buf());
        let secrets = load_with_retry(&source, 1, Duration::ZERO).await.unwrap();
        assert_eq!(secrets.postgres.url, "postgres://localhost/labels");
    }

    #[tokio::test]
    async fn gives_up_after_attempts() {
        let source = SecretsSource::File(PathBuf::from("/nonexistent/secrets.json"));
        let err = load_with_retry(&source, 3, Duration::from_millis(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
