// Postgres-backed label store. One row per (item_id, sort_key).

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::error::Result;
use crate::labels::{LabelKeys, LabelRecord, LabelStore};

const MAX_CONNECTIONS: u32 = 10;

pub struct PgLabelStore {
    pool: PgPool,
    keys: LabelKeys,
}

impl PgLabelStore {
    pub fn new(pool: PgPool, keys: LabelKeys) -> Self {
        Self { pool, keys }
    }

    pub async fn connect(database_url: &str, keys: LabelKeys) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await?;
        info!("Connected to label store");
        Ok(Self::new(pool, keys))
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl LabelStore for PgLabelStore {
    async fn entity_exists(&self, entity: &str) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM bot_labels
            WHERE item_id = $1
            "#,
        )
        .bind(self.keys.item_id(entity))
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn get_label(&self, entity: &str, label: &str) -> Result<Option<LabelRecord>> {
        let row = sqlx::query_as::<_, LabelRecord>(
            r#"
            SELECT item_id, sort_key, entity, label FROM bot_labels
            WHERE item_id = $1 AND sort_key = $2
            "#,
        )
        .bind(self.keys.item_id(entity))
        .bind(self.keys.sort_key(label))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn put_label(&self, entity: &str, label: &str) -> Result<()> {
        let record = self.keys.record(entity, label);
        sqlx::query(
            r#"
            INSERT INTO bot_labels (item_id, sort_key, entity, label)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (item_id, sort_key) DO NOTHING
            "#,
        )
        .bind(&record.item_id)
        .bind(&record.sort_key)
        .bind(&record.entity)
        .bind(&record.label)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
