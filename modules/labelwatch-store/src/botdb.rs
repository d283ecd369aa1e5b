//! Client for the research object store (`/database/{scope}/{object}`).
//! Every request is authorized with a short-lived token from the local JWT provider.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Bot,
    Scanner,
    Owner,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Bot => "bot",
            Scope::Scanner => "scanner",
            Scope::Owner => "owner",
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

pub struct BotDbClient {
    client: reqwest::Client,
    base_url: String,
    jwt_provider_url: String,
}

impl BotDbClient {
    pub fn new(base_url: &str, jwt_provider_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            jwt_provider_url: jwt_provider_url.to_string(),
        })
    }

    fn object_url(&self, scope: Scope, object_id: &str) -> String {
        format!("{}/database/{}/{}", self.base_url, scope.as_str(), object_id)
    }

    async fn token(&self) -> Result<String> {
        let resp = self.client.post(&self.jwt_provider_url).send().await?;
        let token: TokenResponse = resp.json().await?;
        Ok(token.token)
    }

    async fn send(
        &self,
        method: Method,
        scope: Scope,
        object_id: &str,
        payload: Option<Vec<u8>>,
    ) -> Result<reqwest::Response> {
        let url = self.object_url(scope, object_id);
        let token = self.token().await?;

        let mut request = self.client.request(method.clone(), &url).bearer_auth(token);
        if let Some(payload) = payload {
            request = request.body(payload);
        }

        debug!(%method, url = %url, "Research db request");
        let resp = request.send().await?;
        check_status(resp.status(), &url)?;
        Ok(resp)
    }

    pub async fn get(&self, scope: Scope, object_id: &str) -> Result<Vec<u8>> {
        let resp = self.send(Method::GET, scope, object_id, None).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    pub async fn put(&self, scope: Scope, object_id: &str, payload: Vec<u8>) -> Result<()> {
        self.send(Method::PUT, scope, object_id, Some(payload)).await?;
        Ok(())
    }

    pub async fn del(&self, scope: Scope, object_id: &str) -> Result<()> {
        self.send(Method::DELETE, scope, object_id, None).await?;
        Ok(())
    }
}

fn check_status(status: StatusCode, url: &str) -> Result<()> {
    if status == StatusCode::NOT_FOUND {
        return Err(StoreError::NotFound(url.to_string()));
    }
    if status.is_client_error() || status.is_server_error() {
        return Err(StoreError::Api {
            status: status.as_u16(),
            message: format!("research db request to {url} failed"),
        });
    }
    Ok(())
}
