use std::sync::Arc;

use ilp_core::packet::{Prepare, Reply};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::SettlementError;
use crate::ledger::Ledger;
use crate::manager::SettlementEngineRegistry;
use crate::traits::SettlementEngine;
use crate::types::{rescale, AccountSettings, AccountSnapshot};

/// Ties ledger accounts to their settlement engines and settles payable
/// balances once they cross the configured threshold.
#[derive(Clone)]
pub struct AccountingSystem {
    ledger: Arc<dyn Ledger>,
    engines: Arc<SettlementEngineRegistry>,
}

impl AccountingSystem {
    pub fn new(ledger: Arc<dyn Ledger>, engines: Arc<SettlementEngineRegistry>) -> Self {
        Self { ledger, engines }
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    /// Create the ledger account and register it with its settlement engine, if any.
    pub async fn add_account(&self, settings: AccountSettings) -> Result<AccountSnapshot, SettlementError> {
        let engine = match &settings.settlement_engine {
            Some(engine_id) => Some(self.engines.get(engine_id)?),
            None => None,
        };
        let snapshot = self.ledger.create(settings).await?;
        if let Some(engine) = engine {
            engine.add_account(snapshot.id()).await?;
        }
        tracing::info!(account_id = %snapshot.id(), engine = ?snapshot.settings.settlement_engine, "account added");
        Ok(snapshot)
    }

    pub async fn remove_account(&self, account_id: &str) -> Result<(), SettlementError> {
        let snapshot = self.ledger.remove(account_id).await?;
        if let Some(engine_id) = &snapshot.settings.settlement_engine {
            self.engines.get(engine_id)?.remove_account(account_id).await?;
        }
        tracing::info!(account_id = %account_id, "account removed");
        Ok(())
    }

    /// Pass a peer's settlement message to the engine managing that account.
    pub async fn receive_request(&self, account_id: &str, prepare: &Prepare) -> Result<Reply, SettlementError> {
        let account = self.ledger.get(account_id).await?;
        let engine = self.engine_for(&account)?;
        engine.receive_request(account_id, prepare).await
    }

    /// Settle `amount` (in the account's scale) and subtract what the engine
    /// reports as settled from the payable balance. Returns that amount in
    /// the account's scale.
    pub async fn send_settlement(&self, account_id: &str, amount: u64) -> Result<u64, SettlementError> {
        let account = self.ledger.get(account_id).await?;
        let engine = self.engine_for(&account)?;
        let account_scale = account.asset_scale();

        let response = engine.send_settlement(account_id, amount, account_scale).await?;
        if response.scale > account_scale {
            return Err(SettlementError::ScaleTooPrecise {
                response_scale: response.scale,
                account_scale,
            });
        }
        let settled = rescale(response.amount, response.scale, account_scale).ok_or(
            SettlementError::AmountOverflow {
                amount: response.amount,
                from: response.scale,
                to: account_scale,
            },
        )?;

        let tx = self
            .ledger
            .adjust_balance_payable(account_id, -i128::from(settled))
            .await?;
        tx.commit().await?;
        tracing::info!(account_id = %account_id, requested = amount, settled, scale = account_scale, "settlement sent");
        Ok(settled)
    }

    /// Settle the account if its payable balance is past the threshold.
    ///
    /// The snapshot check is only a filter; the decision is made on the live
    /// account. Failures are logged and swallowed. Returns the settled amount.
    pub async fn maybe_settle(&self, snapshot: &AccountSnapshot) -> Option<u64> {
        if !snapshot.exceeds_settlement_threshold() {
            return None;
        }
        let live = match self.ledger.get(snapshot.id()).await {
            Ok(live) => live,
            Err(e) => {
                tracing::warn!(account_id = %snapshot.id(), error = %e, "could not load account for settlement");
                return None;
            }
        };
        if !live.exceeds_settlement_threshold() {
            return None;
        }

        let settle_to = i128::from(live.settings.settle_to.unwrap_or(0));
        let settle_amount = live.balance_payable - settle_to;
        if settle_amount <= 0 {
            return None;
        }
        let amount = u64::try_from(settle_amount).unwrap_or(u64::MAX);

        match self.send_settlement(live.id(), amount).await {
            Ok(settled) => Some(settled),
            Err(e) => {
                tracing::error!(account_id = %live.id(), amount, error = %e, "settlement failed");
                None
            }
        }
    }

    /// Consume balance updates and attempt settlement for each, one at a time.
    pub fn spawn_settlement_worker(self: Arc<Self>, mut updates: mpsc::Receiver<AccountSnapshot>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("settlement worker started");
            while let Some(snapshot) = updates.recv().await {
                self.maybe_settle(&snapshot).await;
            }
            tracing::info!("settlement worker stopped");
        })
    }

    fn engine_for(&self, account: &AccountSnapshot) -> Result<Arc<dyn SettlementEngine>, SettlementError> {
        let engine_id = account
            .settings
            .settlement_engine
            .as_deref()
            .ok_or_else(|| SettlementError::NoEngineForAccount(account.id().to_string()))?;
        self.engines.get(engine_id)
    }
}
