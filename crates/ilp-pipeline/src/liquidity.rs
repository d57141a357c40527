use async_trait::async_trait;
use ilp_core::ErrorCode;

use crate::context::PacketContext;
use crate::error::PipelineError;
use crate::pipeline::{Middleware, Next};

const MAXIMUM_BALANCE_MESSAGE: &str = "exceeded maximum balance";

/// Logs rejects caused by a peer's balance hitting its maximum. Never
/// changes the packet or the reply.
#[derive(Debug, Clone, Default)]
pub struct LiquidityCheckMiddleware;

impl LiquidityCheckMiddleware {
    fn is_maximum_balance(ctx: &PacketContext) -> bool {
        ctx.reject().is_some_and(|reject| {
            reject.code == ErrorCode::T04_INSUFFICIENT_LIQUIDITY
                && reject.message.starts_with(MAXIMUM_BALANCE_MESSAGE)
        })
    }
}

#[async_trait]
impl Middleware for LiquidityCheckMiddleware {
    async fn handle(&self, ctx: &mut PacketContext, next: Next<'_>) -> Result<(), PipelineError> {
        next.run(ctx).await?;
        if Self::is_maximum_balance(ctx) {
            tracing::error!(
                outgoing = ?ctx.outgoing().map(|p| p.id.as_str()),
                destination = %ctx.destination(),
                amount = ctx.amount(),
                "liquidity error: peer rejected packet over maximum balance"
            );
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "liquidity-check"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ilp_core::Reject;

    use super::*;
    use crate::pipeline::tests::{context, fulfill, Respond};

    #[tokio::test]
    async fn test_reply_passes_through_unchanged() {
        let reject = Reject::new(
            ErrorCode::T04_INSUFFICIENT_LIQUIDITY,
            None,
            "exceeded maximum balance",
        );
        let stages: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(LiquidityCheckMiddleware),
            Arc::new(Respond(reject.clone().into())),
        ];
        let mut ctx = context(5, "test.bob");
        Next::new(&stages).run(&mut ctx).await.unwrap();
        assert!(LiquidityCheckMiddleware::is_maximum_balance(&ctx));
        assert_eq!(ctx.reject(), Some(&reject));
        assert_eq!(ctx.amount(), 5);
    }

    #[tokio::test]
    async fn test_other_replies_are_ignored() {
        let stages: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(LiquidityCheckMiddleware),
            Arc::new(Respond(Reject::new(ErrorCode::T04_INSUFFICIENT_LIQUIDITY, None, "busy").into())),
        ];
        let mut ctx = context(5, "test.bob");
        Next::new(&stages).run(&mut ctx).await.unwrap();
        assert!(!LiquidityCheckMiddleware::is_maximum_balance(&ctx));

        let stages: Vec<Arc<dyn Middleware>> =
            vec![Arc::new(LiquidityCheckMiddleware), Arc::new(Respond(fulfill().into()))];
        let mut ctx = context(5, "test.bob");
        Next::new(&stages).run(&mut ctx).await.unwrap();
        assert!(!LiquidityCheckMiddleware::is_maximum_balance(&ctx));
    }
}
