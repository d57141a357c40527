//! Connector-to-connector route broadcast (CCP) state.
//!
//! A [`CcpSender`] streams slices of this connector's forwarding log to one
//! peer; a [`CcpReceiver`] applies the slices a peer streams to us. Transport
//! is left to the caller: both sides exchange the serde message types below.

use ilp_core::Relation;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RoutingError;
use crate::manager::RouteManager;
use crate::route::{hex_bytes, IncomingRoute, RouteUpdate};

/// Largest number of log epochs carried by one route update.
pub const MAX_EPOCHS_PER_UPDATE: usize = 50;

/// Hold-down time advertised with every update.
pub const DEFAULT_ROUTE_EXPIRY_MS: u64 = 45_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Idle,
    Sync,
}

/// Sent by a receiver to ask a sender to start (or stop) streaming updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteControlRequest {
    pub mode: Mode,
    pub last_known_routing_table_id: Uuid,
    pub last_known_epoch: u64,
    #[serde(default)]
    pub features: Vec<String>,
}

/// A route as carried on the wire; the receiver fills in the next hop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastRoute {
    pub prefix: String,
    pub path: Vec<String>,
    #[serde(with = "hex_bytes", default)]
    pub auth: Vec<u8>,
}

/// A contiguous slice `[from_epoch, to_epoch)` of the sender's forwarding log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteUpdateRequest {
    pub speaker: String,
    pub routing_table_id: Uuid,
    pub current_epoch: u64,
    pub from_epoch: u64,
    pub to_epoch: u64,
    pub hold_down_time_ms: u64,
    pub new_routes: Vec<BroadcastRoute>,
    pub withdrawn_routes: Vec<String>,
}

/// What a receiver did with a route update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// Routes were applied and the epoch advanced.
    Applied { added: usize, withdrawn: usize },
    /// Nothing changed; the epoch advanced.
    Heartbeat,
    /// The update ends before our epoch and was ignored.
    Stale,
    /// The update starts past our epoch; a route control request must be sent.
    Gap,
}

impl UpdateOutcome {
    pub fn needs_route_control(&self) -> bool {
        matches!(self, UpdateOutcome::Gap)
    }
}

/// Per-peer outgoing broadcast state.
#[derive(Debug, Clone)]
pub struct CcpSender {
    peer_id: String,
    mode: Mode,
    /// Next epoch the peer expects from us.
    last_known_epoch: u64,
}

impl CcpSender {
    pub fn new(peer_id: impl Into<String>) -> Self {
        Self {
            peer_id: peer_id.into(),
            mode: Mode::Idle,
            last_known_epoch: 0,
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn last_known_epoch(&self) -> u64 {
        self.last_known_epoch
    }

    pub fn handle_route_control(&mut self, request: &RouteControlRequest, manager: &RouteManager) {
        if self.mode != request.mode {
            tracing::debug!(peer_id = %self.peer_id, old_mode = ?self.mode, new_mode = ?request.mode, "peer changed routing mode");
        }
        self.mode = request.mode;

        let table = manager.router().forwarding_table();
        if request.last_known_routing_table_id != table.routing_table_id() {
            tracing::debug!(
                peer_id = %self.peer_id,
                theirs = %request.last_known_routing_table_id,
                ours = %table.routing_table_id(),
                "peer has old routing table id, resetting epoch"
            );
            self.last_known_epoch = 0;
        } else {
            self.last_known_epoch = request.last_known_epoch;
        }
    }

    /// True when the forwarding log has epochs the peer has not been sent.
    pub fn has_pending(&self, manager: &RouteManager) -> bool {
        self.last_known_epoch < manager.router().forwarding_table().current_epoch()
    }

    /// Build the next update for this peer and optimistically advance its epoch.
    ///
    /// Callers that fail to deliver the update should call [`CcpSender::restore_epoch`]
    /// with the returned request's `from_epoch`.
    pub fn next_update(&mut self, manager: &RouteManager) -> Result<RouteUpdateRequest, RoutingError> {
        let router = manager.router();
        let table = router.forwarding_table();
        let from_epoch = self.last_known_epoch;
        let slots = table.updates_since(from_epoch, MAX_EPOCHS_PER_UPDATE);
        let to_epoch = from_epoch + slots.len() as u64;
        let relation_of = |peer_id: &str| {
            manager
                .get_peer(peer_id)
                .map(|p| p.relation())
                .unwrap_or(Relation::Local)
        };
        let to_parent = relation_of(&self.peer_id) == Relation::Parent;

        let mut new_routes = Vec::new();
        let mut withdrawn_routes = Vec::new();
        for update in slots.iter().flatten() {
            match self.visible_route(update, to_parent, &relation_of) {
                Some(route) => new_routes.push(route),
                None => withdrawn_routes.push(update.prefix.clone()),
            }
        }

        tracing::debug!(
            peer_id = %self.peer_id,
            from_epoch,
            to_epoch,
            routes = new_routes.len(),
            withdrawn = withdrawn_routes.len(),
            "broadcasting routes to peer"
        );

        let request = RouteUpdateRequest {
            speaker: router.own_address()?.to_string(),
            routing_table_id: table.routing_table_id(),
            current_epoch: table.current_epoch(),
            from_epoch,
            to_epoch,
            hold_down_time_ms: DEFAULT_ROUTE_EXPIRY_MS,
            new_routes,
            withdrawn_routes,
        };
        self.last_known_epoch = to_epoch;
        Ok(request)
    }

    /// Roll back an optimistic advance after a failed delivery.
    pub fn restore_epoch(&mut self, epoch: u64) {
        self.last_known_epoch = epoch;
    }

    fn visible_route(
        &self,
        update: &RouteUpdate,
        to_parent: bool,
        relation_of: &impl Fn(&str) -> Relation,
    ) -> Option<BroadcastRoute> {
        let route = update.route.as_ref()?;
        // Peers never get their own routes back, and parents never get routes
        // learned from peers or other parents.
        if route.next_hop == self.peer_id
            || (to_parent && matches!(relation_of(&route.next_hop), Relation::Peer | Relation::Parent))
        {
            return None;
        }
        Some(BroadcastRoute {
            prefix: update.prefix.clone(),
            path: route.path.clone(),
            auth: route.auth.clone(),
        })
    }
}

/// Per-peer incoming broadcast state.
#[derive(Debug, Clone)]
pub struct CcpReceiver {
    peer_id: String,
    routing_table_id: Uuid,
    epoch: u64,
}

impl CcpReceiver {
    pub fn new(peer_id: impl Into<String>) -> Self {
        Self {
            peer_id: peer_id.into(),
            routing_table_id: Uuid::nil(),
            epoch: 0,
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn routing_table_id(&self) -> Uuid {
        self.routing_table_id
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The request asking our peer to stream updates from where we left off.
    pub fn route_control_request(&self) -> RouteControlRequest {
        RouteControlRequest {
            mode: Mode::Sync,
            last_known_routing_table_id: self.routing_table_id,
            last_known_epoch: self.epoch,
            features: Vec::new(),
        }
    }

    pub fn handle_route_update(
        &mut self,
        request: &RouteUpdateRequest,
        manager: &mut RouteManager,
    ) -> Result<UpdateOutcome, RoutingError> {
        if self.routing_table_id != request.routing_table_id {
            tracing::debug!(
                peer_id = %self.peer_id,
                old = %self.routing_table_id,
                new = %request.routing_table_id,
                "saw new routing table"
            );
            self.routing_table_id = request.routing_table_id;
            self.epoch = 0;
        }

        if request.from_epoch > self.epoch {
            tracing::debug!(peer_id = %self.peer_id, expected = self.epoch, from = request.from_epoch, "gap in routing updates");
            return Ok(UpdateOutcome::Gap);
        }
        if self.epoch > request.to_epoch {
            tracing::debug!(peer_id = %self.peer_id, expected = self.epoch, to = request.to_epoch, "old routing update, ignoring");
            return Ok(UpdateOutcome::Stale);
        }
        if request.new_routes.is_empty() && request.withdrawn_routes.is_empty() {
            self.epoch = request.to_epoch;
            return Ok(UpdateOutcome::Heartbeat);
        }

        for prefix in &request.withdrawn_routes {
            manager.remove_route(&self.peer_id, prefix);
        }

        let weight = manager
            .get_peer(&self.peer_id)
            .map(|p| p.relation_weight())
            .ok_or_else(|| RoutingError::PeerNotFound(self.peer_id.clone()))?;
        for route in &request.new_routes {
            manager.add_route(
                IncomingRoute::new(self.peer_id.clone(), route.prefix.clone(), route.path.clone())
                    .with_auth(route.auth.clone())
                    .with_weight(weight),
            )?;
        }

        self.epoch = request.to_epoch;
        tracing::debug!(
            peer_id = %self.peer_id,
            added = request.new_routes.len(),
            withdrawn = request.withdrawn_routes.len(),
            epoch = self.epoch,
            "applied route update"
        );
        Ok(UpdateOutcome::Applied {
            added: request.new_routes.len(),
            withdrawn: request.withdrawn_routes.len(),
        })
    }
}
