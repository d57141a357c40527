use async_trait::async_trait;
use ilp_core::packet::{Prepare, Reply};

use crate::error::SettlementError;
use crate::types::SettlementResponse;

/// Settlement engine interface.
///
/// Each implementation moves real value for the accounts it manages, either
/// in-process or by calling an out-of-process engine.
#[async_trait]
pub trait SettlementEngine: Send + Sync {
    /// Start managing an account.
    async fn add_account(&self, account_id: &str) -> Result<(), SettlementError>;

    /// Stop managing an account.
    async fn remove_account(&self, account_id: &str) -> Result<(), SettlementError>;

    /// Hand a peer's settlement message (carried in a Prepare) to the engine.
    async fn receive_request(&self, account_id: &str, prepare: &Prepare) -> Result<Reply, SettlementError>;

    /// Ask the engine to settle `amount` at `scale`. The response reports what
    /// was actually settled, possibly at a different scale.
    async fn send_settlement(
        &self,
        account_id: &str,
        amount: u64,
        scale: u8,
    ) -> Result<SettlementResponse, SettlementError>;

    /// Unique identifier of this engine (e.g. "se-memory").
    fn engine_id(&self) -> &str;
}
