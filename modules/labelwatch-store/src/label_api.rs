//! Client for the public label service, used as the second source of truth
//! for "has this label already been emitted".

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelFilter {
    pub source_ids: Vec<String>,
    pub entities: Vec<String>,
    pub labels: Vec<String>,
    pub limit: u32,
}

impl LabelFilter {
    /// Filter for one (entity, label) pair emitted by `source_id`.
    pub fn single(source_id: &str, entity: &str, label: &str) -> Self {
        Self {
            source_ids: vec![source_id.to_string()],
            entities: vec![entity.to_string()],
            labels: vec![label.to_string()],
            limit: 1,
        }
    }

    /// One query pair per value; labels may themselves contain commas.
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        params.extend(self.source_ids.iter().map(|v| ("sourceIds", v.clone())));
        params.extend(self.entities.iter().map(|v| ("entities", v.clone())));
        params.extend(self.labels.iter().map(|v| ("labels", v.clone())));
        if self.limit > 0 {
            params.push(("limit", self.limit.to_string()));
        }
        params
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExistingLabel {
    pub entity: String,
    pub label: String,
}

#[derive(Debug, Deserialize)]
struct LabelsResponse {
    #[serde(default)]
    events: Vec<LabelEvent>,
}

#[derive(Debug, Deserialize)]
struct LabelEvent {
    label: ExistingLabel,
}

#[async_trait]
pub trait LabelApi: Send + Sync {
    async fn get_labels(&self, filter: &LabelFilter) -> Result<Vec<ExistingLabel>>;
}

pub struct LabelApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl LabelApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl LabelApi for LabelApiClient {
    async fn get_labels(&self, filter: &LabelFilter) -> Result<Vec<ExistingLabel>> {
        let url = format!("{}/labels/state", self.base_url);
        let resp = self.client.get(&url).query(&filter.query()).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: LabelsResponse = resp.json().await?;
        debug!(count = body.events.len(), "Label service lookup");
        Ok(body.events.into_iter().map(|e| e.label).collect())
    }
}
