//! Integration test: route broadcast between connectors.
//!
//! Two or three in-process connectors exchange CCP messages through
//! ilp-routing's sender/receiver state, the way ilp-node does over HTTP.

use ilp_core::{Relation, SELF_PEER_ID};
use ilp_routing::{CcpReceiver, CcpSender, IncomingRoute, RouteManager, Router, RoutingError, UpdateOutcome};

/// A connector under `test.<name>` with a route to itself.
fn connector(name: &str) -> RouteManager {
    let own = format!("test.{name}");
    let mut router = Router::new();
    router.set_global_prefix("test");
    router.set_own_address(own.clone());
    let mut manager = RouteManager::new(router);
    manager.add_peer(SELF_PEER_ID, Relation::Local);
    manager
        .add_route(IncomingRoute::new(SELF_PEER_ID, own, Vec::new()))
        .expect("own route");
    manager
}

/// Link: `from` broadcasts to `to`, where `to` knows `from` as `from_id`.
struct Link {
    sender: CcpSender,
    receiver: CcpReceiver,
}

impl Link {
    fn new(to_id: &str, from_id: &str) -> Self {
        Self {
            sender: CcpSender::new(to_id),
            receiver: CcpReceiver::new(from_id),
        }
    }

    /// Route control then one update, as a freshly connected pair would.
    fn sync(&mut self, from: &RouteManager, to: &mut RouteManager) -> UpdateOutcome {
        let control = self.receiver.route_control_request();
        self.sender.handle_route_control(&control, from);
        self.push(from, to)
    }

    fn push(&mut self, from: &RouteManager, to: &mut RouteManager) -> UpdateOutcome {
        let update = self.sender.next_update(from).expect("build update");
        self.receiver
            .handle_route_update(&update, to)
            .expect("apply update")
    }
}

// =========================================================================
// Propagation
// =========================================================================

#[test]
fn test_routes_propagate_with_path() {
    let mut alpha = connector("alpha");
    alpha.add_peer("alice", Relation::Child);
    alpha
        .add_route(IncomingRoute::new("alice", "test.alice", Vec::new()))
        .unwrap();

    let mut beta = connector("beta");
    beta.add_peer("alpha", Relation::Peer);

    let mut link = Link::new("beta", "alpha");
    let outcome = link.sync(&alpha, &mut beta);
    assert_eq!(outcome, UpdateOutcome::Applied { added: 2, withdrawn: 0 });

    let router = beta.router();
    assert_eq!(router.next_hop("test.alice.wallet").unwrap(), "alpha");
    assert_eq!(router.next_hop("test.alpha").unwrap(), "alpha");
    let route = router.routing_table().get("test.alice").unwrap();
    assert_eq!(route.path, vec!["test.alpha".to_string()]);
    assert_eq!(route.weight, Some(Relation::Peer.default_weight()));
}

#[test]
fn test_routes_travel_two_hops() {
    let mut alpha = connector("alpha");
    alpha.add_peer("alice", Relation::Child);
    alpha
        .add_route(IncomingRoute::new("alice", "test.alice", Vec::new()))
        .unwrap();
    let mut beta = connector("beta");
    beta.add_peer("alpha", Relation::Child);
    beta.add_peer("gamma", Relation::Parent);
    let mut gamma = connector("gamma");
    gamma.add_peer("beta", Relation::Child);

    let mut alpha_to_beta = Link::new("beta", "alpha");
    let mut beta_to_gamma = Link::new("gamma", "beta");
    alpha_to_beta.sync(&alpha, &mut beta);
    beta_to_gamma.sync(&beta, &mut gamma);

    let route = gamma.router().routing_table().get("test.alice").unwrap();
    assert_eq!(route.next_hop, "beta");
    assert_eq!(route.path, vec!["test.beta".to_string(), "test.alpha".to_string()]);
}

#[test]
fn test_routes_are_not_echoed_back() {
    let mut alpha = connector("alpha");
    let mut beta = connector("beta");
    alpha.add_peer("beta", Relation::Peer);
    beta.add_peer("alpha", Relation::Peer);

    let mut alpha_to_beta = Link::new("beta", "alpha");
    let mut beta_to_alpha = Link::new("alpha", "beta");
    alpha_to_beta.sync(&alpha, &mut beta);
    beta_to_alpha.sync(&beta, &mut alpha);

    // Alpha learned beta's own prefix but not its own prefix back.
    assert_eq!(alpha.router().next_hop("test.beta").unwrap(), "beta");
    assert_eq!(alpha.router().next_hop("test.alpha").unwrap(), SELF_PEER_ID);
}

#[test]
fn test_looping_announcement_is_ignored() {
    let mut alpha = connector("alpha");
    alpha.add_peer("beta", Relation::Peer);
    alpha
        .add_route(IncomingRoute::new(
            "beta",
            "test.carol",
            vec!["test.beta".into(), "test.alpha".into()],
        ))
        .unwrap();
    assert!(matches!(
        alpha.router().next_hop("test.carol"),
        Err(RoutingError::NoRoute { .. })
    ));
}

// =========================================================================
// Withdrawal and resync
// =========================================================================

#[test]
fn test_withdrawal_propagates() {
    let mut alpha = connector("alpha");
    alpha.add_peer("alice", Relation::Child);
    alpha
        .add_route(IncomingRoute::new("alice", "test.alice", Vec::new()))
        .unwrap();
    let mut beta = connector("beta");
    beta.add_peer("alpha", Relation::Peer);

    let mut link = Link::new("beta", "alpha");
    link.sync(&alpha, &mut beta);
    assert!(beta.router().next_hop("test.alice").is_ok());

    assert!(alpha.remove_peer("alice"));
    let outcome = link.push(&alpha, &mut beta);
    assert_eq!(outcome, UpdateOutcome::Applied { added: 0, withdrawn: 1 });
    assert!(beta.router().next_hop("test.alice").is_err());
}

#[test]
fn test_no_changes_is_heartbeat() {
    let alpha = connector("alpha");
    let mut beta = connector("beta");
    beta.add_peer("alpha", Relation::Peer);

    let mut link = Link::new("beta", "alpha");
    link.sync(&alpha, &mut beta);
    assert_eq!(link.push(&alpha, &mut beta), UpdateOutcome::Heartbeat);
    assert_eq!(link.receiver.epoch(), alpha.router().forwarding_table().current_epoch());
}

#[test]
fn test_gap_is_repaired_by_route_control() {
    let mut alpha = connector("alpha");
    let mut beta = connector("beta");
    beta.add_peer("alpha", Relation::Peer);
    let mut link = Link::new("beta", "alpha");

    // The first update is lost in transit.
    let control = link.receiver.route_control_request();
    link.sender.handle_route_control(&control, &alpha);
    let _lost = link.sender.next_update(&alpha).unwrap();

    alpha.add_peer("alice", Relation::Child);
    alpha
        .add_route(IncomingRoute::new("alice", "test.alice", Vec::new()))
        .unwrap();
    let update = link.sender.next_update(&alpha).unwrap();
    let outcome = link.receiver.handle_route_update(&update, &mut beta).unwrap();
    assert!(outcome.needs_route_control());
    assert!(beta.router().next_hop("test.alice").is_err());

    let outcome = link.sync(&alpha, &mut beta);
    assert_eq!(outcome, UpdateOutcome::Applied { added: 2, withdrawn: 0 });
    assert_eq!(beta.router().next_hop("test.alice").unwrap(), "alpha");
}

#[test]
fn test_failed_delivery_is_resent() {
    let alpha = connector("alpha");
    let mut beta = connector("beta");
    beta.add_peer("alpha", Relation::Peer);
    let mut link = Link::new("beta", "alpha");

    let control = link.receiver.route_control_request();
    link.sender.handle_route_control(&control, &alpha);
    let undelivered = link.sender.next_update(&alpha).unwrap();
    link.sender.restore_epoch(undelivered.from_epoch);

    let outcome = link.push(&alpha, &mut beta);
    assert_eq!(outcome, UpdateOutcome::Applied { added: 1, withdrawn: 0 });
    assert_eq!(beta.router().next_hop("test.alpha").unwrap(), "alpha");
}
