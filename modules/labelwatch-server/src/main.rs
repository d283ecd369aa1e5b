use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use browserless_client::BrowserlessClient;
use labelwatch_common::{Config, StoreBackend};
use labelwatch_engine::{Agent, EngineSettings, Evaluator, EvaluatorDeps, TracingSink};
use labelwatch_scanner::{extractor_for_chain_id, HttpPageFetcher};
use labelwatch_store::{
    load_with_retry, BotDbClient, BotDbSnapshotStore, LabelApiClient, LabelKeys, LabelStore,
    MemoryLabelStore, PgLabelStore, SecretsSource,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use labelwatch_server::build_router;

const SECRETS_ATTEMPTS: u32 = 10;
const SECRETS_RETRY_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("labelwatch=info".parse()?))
        .init();

    let config = Config::from_env()?;

    let botdb = Arc::new(BotDbClient::new(
        &config.research_db_url,
        &config.jwt_provider_url(),
    )?);
    let keys = LabelKeys::new(config.chain_id, &config.bot_id)?;

    let store: Arc<dyn LabelStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let source = match &config.secrets_file {
                Some(path) => SecretsSource::File(path.clone()),
                None => SecretsSource::BotDb(botdb.clone()),
            };
            let secrets = load_with_retry(&source, SECRETS_ATTEMPTS, SECRETS_RETRY_DELAY)
                .await
                .context("Could not load secrets")?;
            let store = PgLabelStore::connect(&secrets.postgres.url, keys).await?;
            store.migrate().await?;
            info!("Connected to label store");
            Arc::new(store)
        }
        StoreBackend::Memory => {
            warn!("Using in-memory label store; emitted labels are forgotten on restart");
            Arc::new(MemoryLabelStore::new(keys))
        }
    };

    let browserless = config
        .browserless_url
        .as_deref()
        .map(|url| BrowserlessClient::new(url, config.browserless_token.as_deref()))
        .transpose()?;
    let fetcher = Arc::new(HttpPageFetcher::new(browserless)?);

    let extractor = extractor_for_chain_id(config.chain_id);
    if extractor.is_none() {
        warn!(chain_id = config.chain_id, "No explorer for this chain; transactions will be ignored");
    }

    let settings = EngineSettings {
        max_workers: config.max_workers,
        cache_ttl: chrono::Duration::hours(config.cache_ttl_hours),
    };
    let evaluator = Evaluator::new(
        EvaluatorDeps {
            extractor,
            fetcher,
            store,
            label_api: Arc::new(LabelApiClient::new(&config.label_api_url)?),
            sink: Arc::new(TracingSink),
            bot_id: config.bot_id.clone(),
        },
        settings,
    );

    let mut agent = Agent::new(evaluator, config.chain_id);
    if config.snapshot_sync {
        agent = agent.with_snapshot(
            Arc::new(BotDbSnapshotStore::new(botdb)),
            config.snapshot_interval(),
        );
    }

    let app = build_router(Arc::new(agent));

    let addr = format!("{}:{}", config.host, config.port);
    info!(chain_id = config.chain_id, "labelwatch listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
