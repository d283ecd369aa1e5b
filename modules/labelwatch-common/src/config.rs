use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::chain::parse_chain_id;

pub const DEFAULT_BOT_ID: &str =
    "0x6f022d4a65f397dffd059e269e1c2b5004d822f905674dbf518d968f744c2ede";

/// Where emitted labels are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            other => Err(anyhow!("unknown LABEL_STORE backend: {other}")),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Credentials for the label store come from the secrets bundle, not from here.
#[derive(Debug, Clone)]
pub struct Config {
    // Identity
    pub chain_id: u64,
    pub bot_id: String,

    // Host server
    pub host: String,
    pub port: u16,

    // Research database + JWT provider
    pub research_db_url: String,
    pub jwt_provider_host: String,
    pub jwt_provider_port: u16,
    pub secrets_file: Option<PathBuf>,

    // Duplicate checks
    pub label_api_url: String,
    pub store_backend: StoreBackend,

    // Page fetching
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,

    // Engine
    pub cache_ttl_hours: i64,
    pub max_workers: usize,
    pub snapshot_sync: bool,
    pub snapshot_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.log_redacted();
        Ok(config)
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let raw_chain = var("FORTA_CHAIN_ID").context("FORTA_CHAIN_ID is required")?;
        let chain_id = parse_chain_id(&raw_chain)?;

        Ok(Self {
            chain_id,
            bot_id: or("FORTA_BOT_ID", DEFAULT_BOT_ID),
            host: or("AGENT_HOST", "0.0.0.0"),
            port: parse_var("AGENT_PORT", &or("AGENT_PORT", "50051"))?,
            research_db_url: or("RESEARCH_DB_URL", "https://research.forta.network"),
            jwt_provider_host: or("FORTA_JWT_PROVIDER_HOST", "forta-jwt-provider"),
            jwt_provider_port: parse_var(
                "FORTA_JWT_PROVIDER_PORT",
                &or("FORTA_JWT_PROVIDER_PORT", "8515"),
            )?,
            secrets_file: var("SECRETS_FILE").map(PathBuf::from),
            label_api_url: or("LABEL_API_URL", "https://api.forta.network"),
            store_backend: or("LABEL_STORE", "postgres").parse()?,
            browserless_url: var("BROWSERLESS_URL"),
            browserless_token: var("BROWSERLESS_TOKEN"),
            cache_ttl_hours: parse_var("CACHE_TTL_HOURS", &or("CACHE_TTL_HOURS", "72"))?,
            max_workers: parse_var("MAX_WORKERS", &or("MAX_WORKERS", "10"))?,
            snapshot_sync: parse_var("SNAPSHOT_SYNC", &or("SNAPSHOT_SYNC", "false"))?,
            snapshot_interval_secs: parse_var(
                "SNAPSHOT_INTERVAL_SECS",
                &or("SNAPSHOT_INTERVAL_SECS", "300"),
            )?,
        })
    }

    pub fn jwt_provider_url(&self) -> String {
        format!(
            "http://{}:{}/create",
            self.jwt_provider_host, self.jwt_provider_port
        )
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_secs)
    }

    pub fn log_redacted(&self) {
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => preview(v),
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  FORTA_CHAIN_ID: {}", self.chain_id);
        tracing::info!("  FORTA_BOT_ID: {}", preview(&self.bot_id));
        tracing::info!("  LABEL_API_URL: {}", self.label_api_url);
        tracing::info!("  LABEL_STORE: {:?}", self.store_backend);
        tracing::info!("  BROWSERLESS_URL: {}", preview_opt(&self.browserless_url));
        tracing::info!("  BROWSERLESS_TOKEN: {}", preview_opt(&self.browserless_token));
        tracing::info!(
            "  SECRETS_FILE: {}",
            self.secrets_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<not set>".to_string())
        );
        tracing::info!(
            "  engine: ttl={}h workers={} snapshot_sync={}",
            self.cache_ttl_hours,
            self.max_workers,
            self.snapshot_sync
        );
    }
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| anyhow!("{key} has an invalid value: {raw}"))
}

/// First ten characters of a secret, plus its length.
fn preview(val: &str) -> String {
    let head: String = val.chars().take(10).collect();
    format!("{head}...({} chars)", val.chars().count())
}
