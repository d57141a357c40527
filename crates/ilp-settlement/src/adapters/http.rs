use std::time::Duration;

use async_trait::async_trait;
use ilp_core::packet::{Fulfill, Prepare, Reply};
use serde::Serialize;

use crate::error::SettlementError;
use crate::traits::SettlementEngine;
use crate::types::{amount_string, SettlementResponse};

#[derive(Serialize)]
struct CreateAccount<'a> {
    id: &'a str,
}

#[derive(Serialize)]
struct SettlementRequest {
    #[serde(with = "amount_string")]
    amount: u64,
    scale: u8,
}

/// Client for an out-of-process settlement engine speaking the HTTP
/// settlement engine API.
#[derive(Debug, Clone)]
pub struct RemoteSettlementEngine {
    id: String,
    base_url: String,
    client: reqwest::Client,
}

impl RemoteSettlementEngine {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>) -> Result<Self, SettlementError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            id: id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn account_url(&self, account_id: &str, suffix: &str) -> String {
        format!("{}/accounts/{}{}", self.base_url, account_id, suffix)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SettlementError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(SettlementError::EngineStatus { status, body })
    }
}

#[async_trait]
impl SettlementEngine for RemoteSettlementEngine {
    async fn add_account(&self, account_id: &str) -> Result<(), SettlementError> {
        let url = format!("{}/accounts", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&CreateAccount { id: account_id })
            .send()
            .await?;
        Self::check(response).await?;
        tracing::info!(engine_id = %self.id, account_id = %account_id, "account created on settlement engine");
        Ok(())
    }

    async fn remove_account(&self, account_id: &str) -> Result<(), SettlementError> {
        let response = self.client.delete(self.account_url(account_id, "")).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn receive_request(&self, account_id: &str, prepare: &Prepare) -> Result<Reply, SettlementError> {
        let response = self
            .client
            .post(self.account_url(account_id, "/messages"))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(prepare.data.clone())
            .send()
            .await?;
        let body = Self::check(response).await?.bytes().await?;
        Ok(Reply::Fulfill(Fulfill {
            fulfillment: [0u8; 32],
            data: body,
        }))
    }

    async fn send_settlement(
        &self,
        account_id: &str,
        amount: u64,
        scale: u8,
    ) -> Result<SettlementResponse, SettlementError> {
        let response = self
            .client
            .post(self.account_url(account_id, "/settlements"))
            .header("Idempotency-Key", uuid::Uuid::now_v7().to_string())
            .json(&SettlementRequest { amount, scale })
            .send()
            .await?;
        let body = Self::check(response).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| SettlementError::InvalidResponse(e.to_string()))
    }

    fn engine_id(&self) -> &str {
        &self.id
    }
}
