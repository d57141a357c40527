//! Connector node orchestrator.
//!
//! Wires routing, accounting and the packet pipeline together from a
//! [`NodeConfig`], serves the HTTP API and drives route broadcast.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use ilp_core::{Address, SELF_PEER_ID, Relation};
use ilp_pipeline::{connector_pipeline, ConnectorServices, HttpClient, PeerRegistry};
use ilp_routing::{IncomingRoute, RouteManager, Router};
use ilp_settlement::{
    AccountingSystem, InMemoryLedger, InMemorySettlementEngine, Ledger, RemoteSettlementEngine,
    SettlementEngine, SettlementEngineRegistry,
};
use parking_lot::RwLock;
use tokio::task::JoinHandle;

use crate::api;
use crate::ccp::CcpClient;
use crate::config::NodeConfig;
use crate::state::NodeState;

/// The connector node.
pub struct ConnectorNode {
    config: NodeConfig,
    own_address: Address,
    state: Option<Arc<NodeState>>,
    tasks: Vec<JoinHandle<()>>,
}

impl ConnectorNode {
    /// Validate the configuration. Nothing is started until [`ConnectorNode::start`].
    pub fn new(config: NodeConfig) -> anyhow::Result<Self> {
        let own_address = config
            .connector
            .ilp_address
            .clone()
            .context("connector.ilp_address must be set")?;
        Ok(Self {
            config,
            own_address,
            state: None,
            tasks: Vec::new(),
        })
    }

    pub fn state(&self) -> Option<&Arc<NodeState>> {
        self.state.as_ref()
    }

    /// Build all services, start the settlement worker and the API server.
    ///
    /// Returns the address the API server is bound to.
    pub async fn start(&mut self) -> anyhow::Result<SocketAddr> {
        tracing::info!(
            ilp_address = %self.own_address,
            peers = self.config.peers.len(),
            "starting connector node"
        );

        let routes = Arc::new(RwLock::new(self.route_manager()?));

        let peers = Arc::new(PeerRegistry::new());
        let mut ccp_urls = HashMap::new();
        for peer in &self.config.peers {
            peers.insert(peer.info.clone());
            if let Some(url) = &peer.ccp_url {
                ccp_urls.insert(peer.info.id.clone(), url.clone());
            }
        }

        let (ledger, updates) = InMemoryLedger::with_updates(self.config.connector.settlement_queue_capacity);
        let ledger: Arc<dyn Ledger> = Arc::new(ledger);
        let accounting = Arc::new(AccountingSystem::new(ledger.clone(), Arc::new(self.engine_registry()?)));
        for peer in &self.config.peers {
            accounting
                .add_account(peer.account_settings())
                .await
                .with_context(|| format!("failed to create account for peer {}", peer.info.id))?;
        }

        let client = HttpClient::new(self.config.connector.max_hold_window())?;
        let pipeline = connector_pipeline(
            self.own_address.clone(),
            ConnectorServices {
                config: self.config.connector.clone(),
                routes: routes.clone(),
                peers: peers.clone(),
                ledger,
                rates: Arc::new(self.config.rates.clone()),
                accounting: accounting.clone(),
                client: Arc::new(client),
            },
        );
        tracing::info!(stages = ?pipeline.stage_names(), "packet pipeline ready");

        let state = Arc::new(NodeState::new(
            self.own_address.clone(),
            pipeline,
            peers,
            routes,
            accounting.clone(),
            CcpClient::new(self.config.connector.ccp_broadcast_interval())?,
            ccp_urls,
        ));

        self.tasks.push(accounting.spawn_settlement_worker(updates));

        let bind_address = &self.config.http.bind_address;
        let listener = tokio::net::TcpListener::bind(bind_address)
            .await
            .with_context(|| format!("failed to bind HTTP server to {bind_address}"))?;
        let local_addr = listener.local_addr()?;
        tracing::info!(listen_addr = %local_addr, "HTTP server started");
        let api_state = state.clone();
        self.tasks.push(tokio::spawn(async move {
            if let Err(e) = api::serve(listener, api_state).await {
                tracing::error!(error = %e, "HTTP server error");
            }
        }));

        for (peer_id, _) in state.route_control_requests() {
            let state = state.clone();
            self.tasks.push(tokio::spawn(async move {
                if let Err(e) = request_routes(&state, &peer_id).await {
                    tracing::warn!(peer_id = %peer_id, error = %e, "initial route control request failed");
                }
            }));
        }

        self.state = Some(state);
        Ok(local_addr)
    }

    /// Broadcast routes to peers on every CCP interval until cancelled.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let state = self.state.clone().context("node not started")?;
        let mut interval = tokio::time::interval(self.config.connector.ccp_broadcast_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            broadcast_routes(&state).await;
        }
    }

    /// Stop background tasks.
    pub async fn shutdown(&mut self) -> anyhow::Result<()> {
        tracing::info!("shutting down connector node");
        for task in self.tasks.drain(..) {
            task.abort();
            let _ = task.await;
        }
        self.state = None;
        tracing::info!("connector node shut down");
        Ok(())
    }

    fn route_manager(&self) -> anyhow::Result<RouteManager> {
        let mut router = Router::new();
        router.set_global_prefix(self.config.connector.global_prefix.clone());
        router.set_own_address(self.own_address.as_str());
        let mut manager = RouteManager::new(router);

        manager.add_peer(SELF_PEER_ID, Relation::Local);
        manager.add_route(IncomingRoute::new(SELF_PEER_ID, self.own_address.as_str(), Vec::new()))?;

        for peer in &self.config.peers {
            let info = &peer.info;
            let weight = info.weight();
            manager.add_peer_with_weight(&info.id, info.relation, weight);
            if info.relation == Relation::Child {
                let child = self.own_address.with_suffix(&info.id)?;
                manager.add_route(IncomingRoute::new(info.id.clone(), child.as_str(), Vec::new()).with_weight(weight))?;
            }
            for prefix in &peer.routes {
                manager.add_route(IncomingRoute::new(info.id.clone(), prefix.clone(), Vec::new()).with_weight(weight))?;
            }
        }
        Ok(manager)
    }

    fn engine_registry(&self) -> anyhow::Result<SettlementEngineRegistry> {
        let mut registry = SettlementEngineRegistry::new();
        for engine in &self.config.settlement_engines {
            let adapter: Arc<dyn SettlementEngine> = match &engine.url {
                Some(url) => Arc::new(RemoteSettlementEngine::new(engine.id.clone(), url.clone())?),
                None => Arc::new(InMemorySettlementEngine::new(engine.id.clone())),
            };
            registry.register(adapter);
        }
        Ok(registry)
    }
}

/// Send one round of route updates to every peer in sync mode.
///
/// A peer that cannot be reached gets the same epochs again next round.
pub async fn broadcast_routes(state: &NodeState) {
    for (peer_id, update) in state.pending_updates() {
        let Some(url) = state.ccp_url(&peer_id).map(str::to_string) else {
            tracing::debug!(peer_id = %peer_id, "no ccp url for peer, skipping route update");
            state.restore_epoch(&peer_id, update.from_epoch);
            continue;
        };
        let token = state.peers.get(&peer_id).and_then(|p| p.auth_token.clone());
        match state.ccp_client.send_update(&url, token.as_deref(), &update).await {
            Ok(outcome) => {
                tracing::debug!(peer_id = %peer_id, to_epoch = update.to_epoch, outcome = ?outcome, "route update sent");
            }
            Err(e) => {
                tracing::warn!(peer_id = %peer_id, error = %e, "failed to send route update");
                state.restore_epoch(&peer_id, update.from_epoch);
            }
        }
    }
}

/// Ask a peer to (re)start streaming its routes to us.
pub async fn request_routes(state: &NodeState, peer_id: &str) -> anyhow::Result<()> {
    let control = state
        .route_control_request(peer_id)
        .with_context(|| format!("routes are not accepted from peer {peer_id}"))?;
    let url = state
        .ccp_url(peer_id)
        .with_context(|| format!("no ccp url for peer {peer_id}"))?
        .to_string();
    let token = state.peers.get(peer_id).and_then(|p| p.auth_token.clone());
    state.ccp_client.send_control(&url, token.as_deref(), &control).await?;
    tracing::debug!(peer_id = %peer_id, epoch = control.last_known_epoch, "route control request sent");
    Ok(())
}
