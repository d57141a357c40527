use std::sync::Arc;

use ilp_core::{Address, ConnectorConfig};
use ilp_routing::RouteManager;
use ilp_settlement::{AccountingSystem, Ledger};
use parking_lot::RwLock;

use crate::balance::BalanceMiddleware;
use crate::client::{ClientMiddleware, OutgoingService};
use crate::expiry::{ExpireMiddleware, ReduceExpiryMiddleware};
use crate::liquidity::LiquidityCheckMiddleware;
use crate::peers::PeerRegistry;
use crate::pipeline::Pipeline;
use crate::rates::ExchangeRates;
use crate::route::RouteMiddleware;
use crate::settlement::SettlementMessageMiddleware;
use crate::throughput::ThroughputMiddleware;
use crate::validate::ValidateFulfillmentMiddleware;

/// Shared services the connector pipeline is built from.
#[derive(Clone)]
pub struct ConnectorServices {
    pub config: ConnectorConfig,
    pub routes: Arc<RwLock<RouteManager>>,
    pub peers: Arc<PeerRegistry>,
    pub ledger: Arc<dyn Ledger>,
    pub rates: Arc<dyn ExchangeRates>,
    pub accounting: Arc<AccountingSystem>,
    pub client: Arc<dyn OutgoingService>,
}

/// The standard forwarding pipeline:
///
/// incoming throughput, settlement messages, route, outgoing throughput,
/// reduce expiry, balance, expire, liquidity check, validate fulfillment,
/// client.
pub fn connector_pipeline(own_address: Address, services: ConnectorServices) -> Pipeline {
    let refill = services.config.default_refill_period();
    Pipeline::new(own_address)
        .with(ThroughputMiddleware::incoming(refill))
        .with(SettlementMessageMiddleware::new(services.accounting))
        .with(RouteMiddleware::new(services.routes, services.peers))
        .with(ThroughputMiddleware::outgoing(refill))
        .with(ReduceExpiryMiddleware::new(
            services.config.min_expiration_window(),
            services.config.max_hold_window(),
        ))
        .with(BalanceMiddleware::new(services.ledger, services.rates))
        .with(ExpireMiddleware)
        .with(LiquidityCheckMiddleware)
        .with(ValidateFulfillmentMiddleware)
        .with(ClientMiddleware::new(services.client))
}
