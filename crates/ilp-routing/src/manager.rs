use std::cmp::Ordering;
use std::collections::BTreeMap;

use ilp_core::Relation;

use crate::error::RoutingError;
use crate::peer::Peer;
use crate::route::IncomingRoute;
use crate::router::Router;

/// Tracks what each peer announced and feeds the best announcement per prefix to the [`Router`].
#[derive(Debug, Default)]
pub struct RouteManager {
    router: Router,
    peers: BTreeMap<String, Peer>,
}

impl RouteManager {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            peers: BTreeMap::new(),
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Register a peer with its relation's default weight.
    pub fn add_peer(&mut self, id: &str, relation: Relation) {
        self.add_peer_with_weight(id, relation, relation.default_weight());
    }

    /// Register a peer. Re-adding an existing peer updates its relation and keeps its routes.
    pub fn add_peer_with_weight(&mut self, id: &str, relation: Relation, weight: u32) {
        let peer = match self.peers.remove(id) {
            Some(existing) => {
                let mut peer = Peer::new(id, relation).with_relation_weight(weight);
                for prefix in existing.prefixes() {
                    if let Some(route) = existing.get_prefix(prefix) {
                        peer.insert_route(route.clone());
                    }
                }
                peer
            }
            None => Peer::new(id, relation).with_relation_weight(weight),
        };
        tracing::info!(peer_id = %id, %relation, weight, "peer added to route manager");
        self.peers.insert(id.to_string(), peer);
    }

    /// Remove a peer and withdraw every route it contributed.
    pub fn remove_peer(&mut self, id: &str) -> bool {
        let Some(peer) = self.peers.remove(id) else {
            return false;
        };
        for prefix in peer.prefixes() {
            self.withdraw_if_best(id, prefix);
        }
        tracing::info!(peer_id = %id, routes = peer.prefixes().len(), "peer removed from route manager");
        true
    }

    pub fn get_peer(&self, id: &str) -> Option<&Peer> {
        self.peers.get(id)
    }

    pub fn peer_ids(&self) -> Vec<String> {
        self.peers.keys().cloned().collect()
    }

    /// Record a peer's announcement and re-run best-route selection for its prefix.
    ///
    /// Announcements from unknown peers are ignored, as are routes whose path
    /// already contains this connector.
    pub fn add_route(&mut self, route: IncomingRoute) -> Result<(), RoutingError> {
        let own_address = self.router.own_address()?;
        if route.path.iter().any(|hop| hop == own_address) {
            tracing::debug!(peer_id = %route.peer, prefix = %route.prefix, "ignoring route that loops through us");
            return Ok(());
        }
        let prefix = route.prefix.clone();
        let Some(peer) = self.peers.get_mut(&route.peer) else {
            tracing::debug!(peer_id = %route.peer, prefix = %prefix, "ignoring route from unknown peer");
            return Ok(());
        };
        peer.insert_route(route);

        if let Some(best) = self.best_route(&prefix) {
            let best = best.to_route();
            self.router.add_route(&prefix, best)?;
        }
        Ok(())
    }

    /// Forget a peer's announcement. The prefix is withdrawn if that peer held the best route.
    pub fn remove_route(&mut self, peer_id: &str, prefix: &str) {
        let Some(peer) = self.peers.get_mut(peer_id) else {
            return;
        };
        if peer.delete_route(prefix).is_some() {
            self.withdraw_if_best(peer_id, prefix);
        }
    }

    fn withdraw_if_best(&mut self, peer_id: &str, prefix: &str) {
        let holds_best = self
            .router
            .routing_table()
            .get(prefix)
            .is_some_and(|r| r.next_hop == peer_id);
        if holds_best {
            self.router.remove_route(prefix);
        }
    }

    /// Highest weight, then shortest path, then smallest peer id.
    fn best_route(&self, prefix: &str) -> Option<&IncomingRoute> {
        self.peers
            .values()
            .filter_map(|peer| peer.get_prefix(prefix))
            .min_by(|a, b| compare_routes(a, b))
    }
}

fn compare_routes(a: &IncomingRoute, b: &IncomingRoute) -> Ordering {
    let weight = |r: &IncomingRoute| r.weight.unwrap_or(0);
    weight(b)
        .cmp(&weight(a))
        .then_with(|| a.path.len().cmp(&b.path.len()))
        .then_with(|| a.peer.cmp(&b.peer))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> RouteManager {
        let mut router = Router::new();
        router.set_own_address("test.connie");
        let mut manager = RouteManager::new(router);
        manager.add_peer("harry", Relation::Peer);
        manager
    }

    #[test]
    fn test_add_and_remove_peer() {
        let mut manager = manager();
        assert!(manager.get_peer("harry").is_some());
        assert_eq!(manager.peer_ids(), vec!["harry".to_string()]);
        assert!(manager.remove_peer("harry"));
        assert!(manager.get_peer("harry").is_none());
        assert!(!manager.remove_peer("harry"));
    }

    #[test]
    fn test_adding_route_stores_it_on_peer() {
        let mut manager = manager();
        let route = IncomingRoute::new("harry", "g.harry", vec![]);
        manager.add_route(route.clone()).unwrap();
        assert_eq!(manager.get_peer("harry").unwrap().get_prefix("g.harry"), Some(&route));
    }

    #[test]
    fn test_route_without_own_address_leaves_peer_untouched() {
        let mut manager = RouteManager::new(Router::new());
        manager.add_peer("harry", Relation::Peer);
        let result = manager.add_route(IncomingRoute::new("harry", "test.harry", vec![]));
        assert!(matches!(result, Err(RoutingError::OwnAddressNotSet)));
        assert!(manager.get_peer("harry").unwrap().get_prefix("test.harry").is_none());
        assert!(manager.router().next_hop("test.harry.x").is_err());
    }

    #[test]
    fn test_shorter_path_wins() {
        let mut manager = manager();
        manager.add_peer("mary", Relation::Child);
        manager
            .add_route(IncomingRoute::new("harry", "g.nick", vec!["g.potter".into()]))
            .unwrap();
        manager.add_route(IncomingRoute::new("mary", "g.nick", vec![])).unwrap();
        assert_eq!(manager.router().next_hop("g.nick").unwrap(), "mary");
    }

    #[test]
    fn test_worse_route_does_not_replace() {
        let mut manager = manager();
        manager.add_peer("mary", Relation::Child);
        manager.add_route(IncomingRoute::new("harry", "g.harry", vec![])).unwrap();
        manager
            .add_route(IncomingRoute::new("mary", "g.harry", vec!["g.turtle".into()]))
            .unwrap();
        assert_eq!(manager.router().next_hop("g.harry").unwrap(), "harry");
    }

    #[test]
    fn test_weight_beats_path_length() {
        let mut manager = manager();
        manager.add_peer("mary", Relation::Child);
        manager.add_route(IncomingRoute::new("mary", "g.x", vec![])).unwrap();
        manager
            .add_route(IncomingRoute::new("harry", "g.x", vec!["g.a".into(), "g.b".into()]).with_weight(300))
            .unwrap();
        assert_eq!(manager.router().next_hop("g.x").unwrap(), "harry");
    }

    #[test]
    fn test_peer_id_breaks_ties() {
        let mut manager = manager();
        manager.add_peer("alice", Relation::Peer);
        manager.add_route(IncomingRoute::new("harry", "g.x", vec![])).unwrap();
        manager.add_route(IncomingRoute::new("alice", "g.x", vec![])).unwrap();
        assert_eq!(manager.router().next_hop("g.x").unwrap(), "alice");
    }

    #[test]
    fn test_removing_route_removes_from_peer() {
        let mut manager = manager();
        manager.add_route(IncomingRoute::new("harry", "g.harry", vec![])).unwrap();
        manager.remove_route("harry", "g.harry");
        assert!(manager.get_peer("harry").unwrap().get_prefix("g.harry").is_none());
        assert!(manager.router().routing_table().get("g.harry").is_none());
    }

    #[test]
    fn test_route_from_unknown_peer_is_ignored() {
        let mut manager = manager();
        manager.add_route(IncomingRoute::new("mary", "g.harry", vec![])).unwrap();
        assert!(manager.router().routing_table().get("g.harry").is_none());
    }

    #[test]
    fn test_removing_peer_cascades() {
        let mut manager = manager();
        manager.add_route(IncomingRoute::new("harry", "g.harry", vec![])).unwrap();
        assert!(manager.router().routing_table().get("g.harry").is_some());
        manager.remove_peer("harry");
        assert!(manager.router().routing_table().get("g.harry").is_none());
    }

    #[test]
    fn test_removing_non_best_route_keeps_best() {
        let mut manager = manager();
        manager.add_peer("mary", Relation::Child);
        manager.add_route(IncomingRoute::new("harry", "g.x", vec![])).unwrap();
        manager.add_route(IncomingRoute::new("mary", "g.x", vec!["g.y".into()])).unwrap();
        manager.remove_route("mary", "g.x");
        assert_eq!(manager.router().next_hop("g.x").unwrap(), "harry");
    }

    #[test]
    fn test_no_failover_until_reannounced() {
        let mut manager = manager();
        manager.add_peer("mary", Relation::Child);
        manager.add_route(IncomingRoute::new("harry", "g.x", vec![])).unwrap();
        manager.add_route(IncomingRoute::new("mary", "g.x", vec!["g.y".into()])).unwrap();

        manager.remove_route("harry", "g.x");
        assert!(manager.router().next_hop("g.x").is_err());

        manager.add_route(IncomingRoute::new("mary", "g.x", vec!["g.y".into()])).unwrap();
        assert_eq!(manager.router().next_hop("g.x").unwrap(), "mary");
    }

    #[test]
    fn test_looping_route_is_ignored() {
        let mut manager = manager();
        manager
            .add_route(IncomingRoute::new("harry", "g.loop", vec!["test.connie".into()]))
            .unwrap();
        assert!(manager.get_peer("harry").unwrap().get_prefix("g.loop").is_none());
        assert!(manager.router().next_hop("g.loop").is_err());
    }

    #[test]
    fn test_readding_peer_keeps_routes() {
        let mut manager = manager();
        manager.add_route(IncomingRoute::new("harry", "g.harry", vec![])).unwrap();
        manager.add_peer_with_weight("harry", Relation::Parent, 999);
        let peer = manager.get_peer("harry").unwrap();
        assert_eq!(peer.relation(), Relation::Parent);
        assert_eq!(peer.relation_weight(), 999);
        assert!(peer.get_prefix("g.harry").is_some());
    }
}
