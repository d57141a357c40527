//! Fixtures for the connector integration tests.
//!
//! [`Connector`] wires routing, the ledger, a settlement engine and the
//! standard pipeline together in-process. Outgoing packets go to
//! [`ScriptedPeers`], which answers according to the destination suffix.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use ilp_core::{
    condition_for, Address, Asset, ConnectorConfig, ErrorCode, Fulfill, PeerInfo, Prepare, Reject,
    Relation, Reply, SELF_PEER_ID,
};
use ilp_pipeline::{
    connector_pipeline, ConnectorServices, FixedRates, OutgoingService, PeerRegistry, Pipeline,
    PipelineError,
};
use ilp_routing::{IncomingRoute, RouteManager, Router};
use ilp_settlement::{
    AccountSettings, AccountSnapshot, AccountingSystem, InMemoryLedger, InMemorySettlementEngine,
    Ledger, SettlementEngineRegistry,
};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

pub const OWN_ADDRESS: &str = "test.connie";
pub const ENGINE_ID: &str = "se-memory";
pub const FULFILLMENT: [u8; 32] = [7; 32];

/// Outgoing service standing in for every remote peer.
///
/// Destinations ending in `.reject` are rejected with F99, `.liar` gets a
/// fulfill with the wrong preimage, `.down` fails as unreachable. Anything
/// else is fulfilled.
#[derive(Default)]
pub struct ScriptedPeers {
    sent: Mutex<Vec<(String, Prepare)>>,
}

impl ScriptedPeers {
    /// Every (peer id, prepare) delivered so far.
    pub fn sent(&self) -> Vec<(String, Prepare)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl OutgoingService for ScriptedPeers {
    async fn send(&self, peer: &PeerInfo, prepare: &Prepare) -> Result<Reply, PipelineError> {
        self.sent.lock().push((peer.id.clone(), prepare.clone()));
        let destination = prepare.destination.as_str();
        if destination.ends_with(".reject") {
            return Ok(Reject::new(ErrorCode::F99_APPLICATION_ERROR, None, "no thanks").into());
        }
        if destination.ends_with(".down") {
            return Err(PipelineError::PeerUnreachable(format!("{} is down", peer.id)));
        }
        let fulfillment = if destination.ends_with(".liar") {
            [9; 32]
        } else {
            FULFILLMENT
        };
        Ok(Fulfill {
            fulfillment,
            data: bytes::Bytes::from_static(b"thanks"),
        }
        .into())
    }
}

/// A peer plus its account settings and the prefixes routed to it.
#[derive(Debug, Clone)]
pub struct TestPeer {
    pub info: PeerInfo,
    pub account: AccountSettings,
    pub routes: Vec<String>,
}

impl TestPeer {
    pub fn new(id: &str, relation: Relation, asset_code: &str, asset_scale: u8) -> Self {
        let mut info = PeerInfo::new(id, relation);
        info.asset = Asset::new(asset_code, asset_scale);
        let mut account = AccountSettings::new(id, asset_code, asset_scale);
        account.settlement_engine = Some(ENGINE_ID.to_string());
        Self {
            info,
            account,
            routes: vec![format!("test.{id}")],
        }
    }
}

/// An in-process connector at [`OWN_ADDRESS`].
pub struct Connector {
    pub pipeline: Pipeline,
    pub ledger: Arc<InMemoryLedger>,
    pub engine: Arc<InMemorySettlementEngine>,
    pub accounting: Arc<AccountingSystem>,
    pub peers: Arc<PeerRegistry>,
    pub outgoing: Arc<ScriptedPeers>,
    /// Balance updates for the settlement worker, until someone takes them.
    pub updates: Option<mpsc::Receiver<AccountSnapshot>>,
}

impl Connector {
    pub async fn new(peers: Vec<TestPeer>, rates: FixedRates) -> Self {
        let own = Address::parse(OWN_ADDRESS).expect("valid address");

        let mut router = Router::new();
        router.set_global_prefix("test");
        router.set_own_address(OWN_ADDRESS);
        let mut manager = RouteManager::new(router);
        manager.add_peer(SELF_PEER_ID, Relation::Local);
        manager
            .add_route(IncomingRoute::new(SELF_PEER_ID, OWN_ADDRESS, Vec::new()))
            .expect("own route");

        let registry = Arc::new(PeerRegistry::new());
        for peer in &peers {
            registry.insert(peer.info.clone());
            manager.add_peer_with_weight(&peer.info.id, peer.info.relation, peer.info.weight());
            for prefix in &peer.routes {
                manager
                    .add_route(IncomingRoute::new(peer.info.id.clone(), prefix.clone(), Vec::new()))
                    .expect("static route");
            }
        }

        let (ledger, updates) = InMemoryLedger::with_updates(64);
        let ledger = Arc::new(ledger);
        let engine = Arc::new(InMemorySettlementEngine::new(ENGINE_ID));
        let mut engines = SettlementEngineRegistry::new();
        engines.register(engine.clone());
        let accounting = Arc::new(AccountingSystem::new(ledger.clone(), Arc::new(engines)));
        for peer in &peers {
            accounting
                .add_account(peer.account.clone())
                .await
                .expect("account created");
        }

        let outgoing = Arc::new(ScriptedPeers::default());
        let pipeline = connector_pipeline(
            own,
            ConnectorServices {
                config: ConnectorConfig::default(),
                routes: Arc::new(RwLock::new(manager)),
                peers: registry.clone(),
                ledger: ledger.clone(),
                rates: Arc::new(rates),
                accounting: accounting.clone(),
                client: outgoing.clone(),
            },
        );

        Self {
            pipeline,
            ledger,
            engine,
            accounting,
            peers: registry,
            outgoing,
            updates: Some(updates),
        }
    }

    /// Send a packet from peer `from` locked with [`FULFILLMENT`]'s condition.
    pub async fn send(&self, from: &str, amount: u64, destination: &str) -> Reply {
        let incoming = self.peers.get(from).expect("known peer");
        self.pipeline.process(prepare(amount, destination), incoming).await
    }

    /// (payable, receivable) of an account.
    pub async fn balances(&self, account_id: &str) -> (i128, i128) {
        let account = self.ledger.get(account_id).await.expect("account exists");
        (account.balance_payable, account.balance_receivable)
    }
}

pub fn prepare(amount: u64, destination: &str) -> Prepare {
    Prepare {
        amount,
        expires_at: Utc::now() + chrono::Duration::seconds(30),
        execution_condition: condition_for(&FULFILLMENT),
        destination: Address::parse(destination).expect("valid destination"),
        data: bytes::Bytes::new(),
    }
}

/// The reject in a reply, panicking on a fulfill.
pub fn expect_reject(reply: Reply) -> Reject {
    match reply {
        Reply::Reject(reject) => reject,
        Reply::Fulfill(fulfill) => panic!("expected reject, got {fulfill:?}"),
    }
}
