use std::sync::Arc;

use async_trait::async_trait;
use ilp_settlement::{Ledger, Transfer};

use crate::context::PacketContext;
use crate::error::PipelineError;
use crate::pipeline::{Middleware, Next};
use crate::rates::ExchangeRates;

/// Converts the amount into the outgoing peer's asset and books the packet
/// on the ledger.
///
/// The transfer is reserved before forwarding, committed once a fulfill
/// comes back and rolled back on anything else. Zero-amount packets and
/// packets flagged unfulfillable or as local STREAM deliveries never touch
/// the ledger.
pub struct BalanceMiddleware {
    ledger: Arc<dyn Ledger>,
    rates: Arc<dyn ExchangeRates>,
}

impl BalanceMiddleware {
    pub fn new(ledger: Arc<dyn Ledger>, rates: Arc<dyn ExchangeRates>) -> Self {
        Self { ledger, rates }
    }
}

#[async_trait]
impl Middleware for BalanceMiddleware {
    async fn handle(&self, ctx: &mut PacketContext, next: Next<'_>) -> Result<(), PipelineError> {
        let source_amount = ctx.amount();
        if source_amount == 0 {
            return next.run(ctx).await;
        }
        let incoming = ctx.incoming().clone();
        let outgoing = ctx.outgoing_peer()?.clone();

        let destination_amount = self
            .rates
            .convert(source_amount, &incoming.asset, &outgoing.asset)
            .await?;
        ctx.set_amount(destination_amount);

        if ctx.unfulfillable || ctx.stream_destination.is_some() {
            return next.run(ctx).await;
        }

        let transfer = self
            .ledger
            .create_transfer(Transfer {
                source_account_id: incoming.id.clone(),
                destination_account_id: outgoing.id.clone(),
                source_amount,
                destination_amount,
            })
            .await?;

        let result = next.run(ctx).await;
        if result.is_ok() && ctx.fulfill().is_some() {
            // A commit failure replaces the fulfill with a T00 reject even
            // though the next hop has already been paid.
            transfer.commit().await?;
            tracing::debug!(
                incoming = %incoming.id,
                outgoing = %outgoing.id,
                source_amount,
                destination_amount,
                "transfer committed"
            );
        } else if let Err(e) = transfer.rollback().await {
            tracing::warn!(incoming = %incoming.id, outgoing = %outgoing.id, error = %e, "transfer rollback failed");
        }
        result
    }

    fn name(&self) -> &'static str {
        "balance"
    }
}
