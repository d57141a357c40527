//! Shared node state for the HTTP handlers and background tasks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use ilp_core::{Address, PeerInfo};
use ilp_pipeline::{PeerRegistry, Pipeline};
use ilp_routing::{
    CcpReceiver, CcpSender, RouteControlRequest, RouteManager, RouteUpdateRequest, RoutingError,
    UpdateOutcome,
};
use ilp_settlement::AccountingSystem;
use parking_lot::{Mutex, RwLock};

use crate::ccp::CcpClient;

/// State shared by the HTTP handlers and the node's background tasks.
pub struct NodeState {
    pub own_address: Address,
    /// When the node started.
    pub start_time: Instant,
    pub pipeline: Pipeline,
    pub peers: Arc<PeerRegistry>,
    pub routes: Arc<RwLock<RouteManager>>,
    pub accounting: Arc<AccountingSystem>,
    pub ccp_client: CcpClient,
    /// Base URLs of the peers' CCP endpoints.
    ccp_urls: HashMap<String, String>,
    /// One per peer that receives our routes.
    senders: Mutex<HashMap<String, CcpSender>>,
    /// One per peer that sends us routes.
    receivers: Mutex<HashMap<String, CcpReceiver>>,
}

impl NodeState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        own_address: Address,
        pipeline: Pipeline,
        peers: Arc<PeerRegistry>,
        routes: Arc<RwLock<RouteManager>>,
        accounting: Arc<AccountingSystem>,
        ccp_client: CcpClient,
        ccp_urls: HashMap<String, String>,
    ) -> Self {
        let mut senders = HashMap::new();
        let mut receivers = HashMap::new();
        for id in peers.ids() {
            if let Some(peer) = peers.get(&id) {
                if peer.is_ccp_receiver {
                    senders.insert(id.clone(), CcpSender::new(id.clone()));
                }
                if peer.is_ccp_sender {
                    receivers.insert(id.clone(), CcpReceiver::new(id.clone()));
                }
            }
        }
        Self {
            own_address,
            start_time: Instant::now(),
            pipeline,
            peers,
            routes,
            accounting,
            ccp_client,
            ccp_urls,
            senders: Mutex::new(senders),
            receivers: Mutex::new(receivers),
        }
    }

    /// The peer presenting this bearer token, if any.
    pub fn authenticate(&self, token: &str) -> Option<Arc<PeerInfo>> {
        self.peers.by_token(token)
    }

    pub fn ccp_url(&self, peer_id: &str) -> Option<&str> {
        self.ccp_urls.get(peer_id).map(String::as_str)
    }

    /// Apply a route control request from a peer we broadcast to.
    ///
    /// Returns false when we do not send routes to that peer.
    pub fn handle_route_control(&self, peer_id: &str, request: &RouteControlRequest) -> bool {
        let mut senders = self.senders.lock();
        let Some(sender) = senders.get_mut(peer_id) else {
            return false;
        };
        let routes = self.routes.read();
        sender.handle_route_control(request, &routes);
        true
    }

    /// Apply a route update from a peer that broadcasts to us.
    ///
    /// `None` when we do not accept routes from that peer.
    pub fn handle_route_update(
        &self,
        peer_id: &str,
        request: &RouteUpdateRequest,
    ) -> Option<Result<UpdateOutcome, RoutingError>> {
        let mut receivers = self.receivers.lock();
        let receiver = receivers.get_mut(peer_id)?;
        let mut routes = self.routes.write();
        Some(receiver.handle_route_update(request, &mut routes))
    }

    /// Route control requests for every peer we accept routes from.
    pub fn route_control_requests(&self) -> Vec<(String, RouteControlRequest)> {
        let receivers = self.receivers.lock();
        let mut requests: Vec<_> = receivers
            .iter()
            .map(|(id, receiver)| (id.clone(), receiver.route_control_request()))
            .collect();
        requests.sort_by(|a, b| a.0.cmp(&b.0));
        requests
    }

    pub fn route_control_request(&self, peer_id: &str) -> Option<RouteControlRequest> {
        self.receivers
            .lock()
            .get(peer_id)
            .map(CcpReceiver::route_control_request)
    }

    /// Next update for every peer in sync mode. Each sender's epoch advances
    /// optimistically; call [`NodeState::restore_epoch`] when delivery fails.
    pub fn pending_updates(&self) -> Vec<(String, RouteUpdateRequest)> {
        let mut senders = self.senders.lock();
        let routes = self.routes.read();
        let mut updates = Vec::new();
        for (id, sender) in senders.iter_mut() {
            if sender.mode() != ilp_routing::ccp::Mode::Sync {
                continue;
            }
            match sender.next_update(&routes) {
                Ok(update) => updates.push((id.clone(), update)),
                Err(e) => tracing::warn!(peer_id = %id, error = %e, "failed to build route update"),
            }
        }
        updates.sort_by(|a, b| a.0.cmp(&b.0));
        updates
    }

    pub fn restore_epoch(&self, peer_id: &str, epoch: u64) {
        if let Some(sender) = self.senders.lock().get_mut(peer_id) {
            sender.restore_epoch(epoch);
        }
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}
