//! Per-packet processing for the ILP connector.
//!
//! A [`Pipeline`] runs a Prepare through ordered [`Middleware`] stages that
//! share one [`PacketContext`]. Errors raised by any stage are turned into a
//! Reject at the pipeline boundary.

pub mod balance;
pub mod client;
pub mod connector;
pub mod context;
pub mod error;
pub mod expiry;
pub mod liquidity;
pub mod peers;
pub mod pipeline;
pub mod rates;
pub mod route;
pub mod settlement;
pub mod throughput;
pub mod validate;

pub use balance::BalanceMiddleware;
pub use client::{ClientMiddleware, HttpClient, OutgoingService};
pub use connector::{connector_pipeline, ConnectorServices};
pub use context::PacketContext;
pub use error::PipelineError;
pub use expiry::{destination_expiry, ExpireMiddleware, ReduceExpiryMiddleware};
pub use liquidity::LiquidityCheckMiddleware;
pub use peers::PeerRegistry;
pub use pipeline::{Middleware, Next, Pipeline};
pub use rates::{ExchangeRates, FixedRates, RatesError};
pub use route::RouteMiddleware;
pub use settlement::{SettlementMessageMiddleware, SETTLEMENT_ADDRESS};
pub use throughput::{Direction, ThroughputMiddleware, TokenBucket};
pub use validate::ValidateFulfillmentMiddleware;
