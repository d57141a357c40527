use std::sync::Arc;

use async_trait::async_trait;
use ilp_settlement::AccountingSystem;

use crate::context::PacketContext;
use crate::error::PipelineError;
use crate::pipeline::{Middleware, Next};

/// Destination peers use to exchange settlement engine messages.
pub const SETTLEMENT_ADDRESS: &str = "peer.settle";

/// Answers packets addressed to `peer.settle` by handing them to the
/// incoming peer's settlement engine. Everything else continues down the
/// pipeline.
pub struct SettlementMessageMiddleware {
    accounting: Arc<AccountingSystem>,
}

impl SettlementMessageMiddleware {
    pub fn new(accounting: Arc<AccountingSystem>) -> Self {
        Self { accounting }
    }
}

#[async_trait]
impl Middleware for SettlementMessageMiddleware {
    async fn handle(&self, ctx: &mut PacketContext, next: Next<'_>) -> Result<(), PipelineError> {
        if ctx.destination().as_str() != SETTLEMENT_ADDRESS {
            return next.run(ctx).await;
        }
        if ctx.amount() != 0 {
            return Err(PipelineError::InvalidPacket(
                "settlement messages must carry a zero amount".into(),
            ));
        }
        let account_id = ctx.incoming().id.clone();
        let reply = self.accounting.receive_request(&account_id, ctx.prepare()).await?;
        tracing::debug!(account_id = %account_id, "settlement message handled");
        ctx.set_reply(reply);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "settlement-messages"
    }
}
