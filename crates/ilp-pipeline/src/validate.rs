use async_trait::async_trait;

use crate::context::PacketContext;
use crate::error::PipelineError;
use crate::pipeline::{Middleware, Next};

/// Rejects fulfills whose preimage does not hash to the Prepare's condition.
#[derive(Debug, Clone, Default)]
pub struct ValidateFulfillmentMiddleware;

#[async_trait]
impl Middleware for ValidateFulfillmentMiddleware {
    async fn handle(&self, ctx: &mut PacketContext, next: Next<'_>) -> Result<(), PipelineError> {
        next.run(ctx).await?;
        if let Some(fulfill) = ctx.fulfill() {
            if !fulfill.matches(&ctx.prepare().execution_condition) {
                tracing::warn!(
                    outgoing = ?ctx.outgoing().map(|p| p.id.as_str()),
                    destination = %ctx.destination(),
                    "received fulfillment that does not match the condition"
                );
                ctx.take_reply();
                return Err(PipelineError::WrongCondition);
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "validate-fulfillment"
    }
}
