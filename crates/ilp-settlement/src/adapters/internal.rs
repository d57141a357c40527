use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use ilp_core::packet::{Fulfill, Prepare, Reply};

use crate::error::SettlementError;
use crate::traits::SettlementEngine;
use crate::types::{rescale, SettlementResponse};

/// A settlement the engine was asked to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementRecord {
    pub account_id: String,
    pub amount: u64,
    pub scale: u8,
}

/// In-process settlement engine.
///
/// Settles instantly and remembers every request it served. The scale it
/// reports back can be pinned with [`with_response_scale`](Self::with_response_scale)
/// to exercise rescaling by the caller.
pub struct InMemorySettlementEngine {
    id: String,
    response_scale: Option<u8>,
    accounts: DashMap<String, ()>,
    settlements: DashMap<String, Vec<SettlementRecord>>,
    messages: DashMap<String, Vec<bytes::Bytes>>,
    failing: AtomicBool,
}

impl InMemorySettlementEngine {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            response_scale: None,
            accounts: DashMap::new(),
            settlements: DashMap::new(),
            messages: DashMap::new(),
            failing: AtomicBool::new(false),
        }
    }

    /// Report settled amounts at `scale` instead of the requested scale.
    pub fn with_response_scale(mut self, scale: u8) -> Self {
        self.response_scale = Some(scale);
        self
    }

    /// Make subsequent settlements fail as if the engine were unreachable.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn has_account(&self, account_id: &str) -> bool {
        self.accounts.contains_key(account_id)
    }

    pub fn settlements(&self, account_id: &str) -> Vec<SettlementRecord> {
        self.settlements
            .get(account_id)
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn messages(&self, account_id: &str) -> Vec<bytes::Bytes> {
        self.messages.get(account_id).map(|m| m.clone()).unwrap_or_default()
    }

    fn require_account(&self, account_id: &str) -> Result<(), SettlementError> {
        if self.accounts.contains_key(account_id) {
            Ok(())
        } else {
            Err(SettlementError::NoEngineForAccount(account_id.to_string()))
        }
    }
}

#[async_trait]
impl SettlementEngine for InMemorySettlementEngine {
    async fn add_account(&self, account_id: &str) -> Result<(), SettlementError> {
        self.accounts.insert(account_id.to_string(), ());
        tracing::debug!(engine_id = %self.id, account_id = %account_id, "account added to engine");
        Ok(())
    }

    async fn remove_account(&self, account_id: &str) -> Result<(), SettlementError> {
        self.accounts.remove(account_id);
        Ok(())
    }

    async fn receive_request(&self, account_id: &str, prepare: &Prepare) -> Result<Reply, SettlementError> {
        self.require_account(account_id)?;
        self.messages
            .entry(account_id.to_string())
            .or_default()
            .push(prepare.data.clone());
        Ok(Reply::Fulfill(Fulfill {
            fulfillment: [0u8; 32],
            data: prepare.data.clone(),
        }))
    }

    async fn send_settlement(
        &self,
        account_id: &str,
        amount: u64,
        scale: u8,
    ) -> Result<SettlementResponse, SettlementError> {
        self.require_account(account_id)?;
        if self.failing.load(Ordering::SeqCst) {
            return Err(SettlementError::EngineStatus {
                status: 503,
                body: "engine offline".into(),
            });
        }
        self.settlements
            .entry(account_id.to_string())
            .or_default()
            .push(SettlementRecord {
                account_id: account_id.to_string(),
                amount,
                scale,
            });

        let response_scale = self.response_scale.unwrap_or(scale);
        let settled = rescale(amount, scale, response_scale).ok_or(SettlementError::AmountOverflow {
            amount,
            from: scale,
            to: response_scale,
        })?;
        tracing::info!(engine_id = %self.id, account_id = %account_id, amount, scale, "settled");
        Ok(SettlementResponse {
            amount: settled,
            scale: response_scale,
        })
    }

    fn engine_id(&self) -> &str {
        &self.id
    }
}
