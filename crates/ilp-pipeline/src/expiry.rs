use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::context::PacketContext;
use crate::error::PipelineError;
use crate::pipeline::{Middleware, Next};

/// Expiry for the outgoing packet:
/// `min(source - min_expiration_window, now + max_hold_window)`.
///
/// Fails if the source packet already expired or the result leaves less than
/// `min_expiration_window` before it elapses.
pub fn destination_expiry(
    source_expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
    min_expiration_window: Duration,
    max_hold_window: Duration,
) -> Result<DateTime<Utc>, PipelineError> {
    if source_expires_at < now {
        return Err(PipelineError::InsufficientTimeout(
            "source transfer has already expired.".into(),
        ));
    }
    let min_window = chrono::Duration::from_std(min_expiration_window)
        .map_err(|e| PipelineError::Internal(e.to_string()))?;
    let max_hold = chrono::Duration::from_std(max_hold_window)
        .map_err(|e| PipelineError::Internal(e.to_string()))?;

    let expiry = (source_expires_at - min_window).min(now + max_hold);
    if expiry < now + min_window {
        return Err(PipelineError::InsufficientTimeout(
            "source transfer expires too soon to complete payment.".into(),
        ));
    }
    Ok(expiry)
}

/// Rewrites the packet's expiry before forwarding it.
#[derive(Debug, Clone)]
pub struct ReduceExpiryMiddleware {
    min_expiration_window: Duration,
    max_hold_window: Duration,
}

impl ReduceExpiryMiddleware {
    pub fn new(min_expiration_window: Duration, max_hold_window: Duration) -> Self {
        Self {
            min_expiration_window,
            max_hold_window,
        }
    }
}

#[async_trait]
impl Middleware for ReduceExpiryMiddleware {
    async fn handle(&self, ctx: &mut PacketContext, next: Next<'_>) -> Result<(), PipelineError> {
        let expiry = destination_expiry(
            ctx.expires_at(),
            Utc::now(),
            self.min_expiration_window,
            self.max_hold_window,
        )?;
        ctx.set_expires_at(expiry);
        next.run(ctx).await
    }

    fn name(&self) -> &'static str {
        "reduce-expiry"
    }
}

/// Fails the packet with a timeout once its (reduced) expiry passes, even if
/// the rest of the pipeline is still working on it.
#[derive(Debug, Clone, Default)]
pub struct ExpireMiddleware;

#[async_trait]
impl Middleware for ExpireMiddleware {
    async fn handle(&self, ctx: &mut PacketContext, next: Next<'_>) -> Result<(), PipelineError> {
        let remaining = (ctx.expires_at() - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let outcome = tokio::time::timeout(remaining, next.run(ctx)).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(destination = %ctx.destination(), "packet expired while in flight");
                Err(PipelineError::TransferTimedOut)
            }
        }
    }

    fn name(&self) -> &'static str {
        "expire"
    }
}
