use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use ilp_core::ThroughputLimit;

use crate::context::PacketContext;
use crate::error::PipelineError;
use crate::pipeline::{Middleware, Next};

/// Capped, periodically refilled allowance of amount units.
///
/// A full bucket refills over `refill_period`; tokens never exceed `capacity`.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: u64,
    refill_period: Duration,
    last_refill: Instant,
    available: u64,
}

impl TokenBucket {
    pub fn new(capacity: u64, refill_period: Duration) -> Self {
        Self::new_at(capacity, refill_period, Instant::now())
    }

    pub fn new_at(capacity: u64, refill_period: Duration, now: Instant) -> Self {
        Self {
            capacity,
            refill_period,
            last_refill: now,
            available: capacity,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn available(&self) -> u64 {
        self.available
    }

    pub fn take(&mut self, amount: u64) -> bool {
        self.take_at(amount, Instant::now())
    }

    /// Refill for the time elapsed up to `now`, then debit `amount` if possible.
    pub fn take_at(&mut self, amount: u64, now: Instant) -> bool {
        self.refill(now);
        if amount > self.available {
            return false;
        }
        self.available -= amount;
        true
    }

    /// Credit whole tokens for the time since `last_refill`.
    ///
    /// `last_refill` only advances by the time those tokens account for, so
    /// the fractional remainder carries over to the next refill.
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        if self.available >= self.capacity || self.capacity == 0 {
            self.last_refill = now;
            return;
        }
        let period = self.refill_period.as_nanos().max(1);
        let capacity = u128::from(self.capacity);
        let added = elapsed.as_nanos().saturating_mul(capacity) / period;
        if added == 0 {
            return;
        }
        let missing = u128::from(self.capacity - self.available);
        if added >= missing {
            self.available = self.capacity;
            self.last_refill = now;
            return;
        }
        // `added < missing <= capacity`, so both conversions are lossless.
        let used_nanos = added * period / capacity;
        self.available += added as u64;
        self.last_refill += Duration::from_nanos(u64::try_from(used_nanos).unwrap_or(u64::MAX));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// Rate-limits packet amounts per peer with one token bucket per direction.
///
/// Buckets are created the first time a peer with a configured limit is
/// seen. Peers without a limit pass through and never get a bucket.
pub struct ThroughputMiddleware {
    direction: Direction,
    default_refill_period: Duration,
    buckets: DashMap<String, TokenBucket>,
}

impl ThroughputMiddleware {
    pub fn new(direction: Direction, default_refill_period: Duration) -> Self {
        Self {
            direction,
            default_refill_period,
            buckets: DashMap::new(),
        }
    }

    pub fn incoming(default_refill_period: Duration) -> Self {
        Self::new(Direction::Incoming, default_refill_period)
    }

    pub fn outgoing(default_refill_period: Duration) -> Self {
        Self::new(Direction::Outgoing, default_refill_period)
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn bucket_for(&self, limit: &ThroughputLimit) -> TokenBucket {
        let period = limit
            .refill_period_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_refill_period);
        TokenBucket::new(limit.amount, period)
    }
}

#[async_trait]
impl Middleware for ThroughputMiddleware {
    async fn handle(&self, ctx: &mut PacketContext, next: Next<'_>) -> Result<(), PipelineError> {
        let peer = match self.direction {
            Direction::Incoming => ctx.incoming().clone(),
            Direction::Outgoing => ctx.outgoing_peer()?.clone(),
        };
        let limit = match self.direction {
            Direction::Incoming => peer.incoming_throughput,
            Direction::Outgoing => peer.outgoing_throughput,
        };

        if let Some(limit) = limit {
            let amount = ctx.amount();
            let allowed = self
                .buckets
                .entry(peer.id.clone())
                .or_insert_with(|| self.bucket_for(&limit))
                .take(amount);
            if !allowed {
                tracing::warn!(peer_id = %peer.id, direction = ?self.direction, amount, "throttling packet");
                return Err(PipelineError::InsufficientLiquidity(
                    "exceeded money bandwidth, throttling.".into(),
                ));
            }
        }
        next.run(ctx).await
    }

    fn name(&self) -> &'static str {
        match self.direction {
            Direction::Incoming => "incoming-throughput",
            Direction::Outgoing => "outgoing-throughput",
        }
    }
}
