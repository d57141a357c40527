//! Integration test: packets through the full connector pipeline.
//!
//! Routing, throughput limits, expiry, exchange rates and the ledger all take
//! part; only the remote peers are scripted.

use chrono::Utc;
use ilp_core::{ErrorCode, Relation, Reply, ThroughputLimit};
use ilp_integration_tests::{expect_reject, prepare, Connector, TestPeer, OWN_ADDRESS};
use ilp_pipeline::FixedRates;

fn rates() -> FixedRates {
    FixedRates::new().with_price("USD", 1.0).with_price("EUR", 2.0)
}

fn peers() -> Vec<TestPeer> {
    let alice = TestPeer::new("alice", Relation::Child, "USD", 2);
    let mut bob = TestPeer::new("bob", Relation::Peer, "USD", 2);
    bob.account.maximum_payable = Some(500);
    let carol = TestPeer::new("carol", Relation::Peer, "EUR", 2);
    vec![alice, bob, carol]
}

async fn connector() -> Connector {
    Connector::new(peers(), rates()).await
}

// =========================================================================
// Forwarded packets
// =========================================================================

#[tokio::test]
async fn test_fulfilled_packet_moves_balances() {
    let connie = connector().await;
    let original = prepare(100, "test.bob.shop");

    let incoming = connie.peers.get("alice").unwrap();
    let reply = connie.pipeline.process(original.clone(), incoming).await;
    match reply {
        Reply::Fulfill(fulfill) => assert_eq!(&fulfill.data[..], b"thanks"),
        Reply::Reject(reject) => panic!("unexpected reject: {reject:?}"),
    }

    assert_eq!(connie.balances("alice").await, (0, 100));
    assert_eq!(connie.balances("bob").await, (100, 0));

    let sent = connie.outgoing.sent();
    assert_eq!(sent.len(), 1);
    let (peer_id, forwarded) = &sent[0];
    assert_eq!(peer_id, "bob");
    assert_eq!(forwarded.amount, 100);
    assert_eq!(forwarded.execution_condition, original.execution_condition);
    // One second of margin is kept for the fulfill to travel back.
    assert!(forwarded.expires_at <= original.expires_at - chrono::Duration::seconds(1));
}

#[tokio::test]
async fn test_reject_from_peer_is_relayed_and_nothing_is_booked() {
    let connie = connector().await;
    let reject = expect_reject(connie.send("alice", 100, "test.bob.reject").await);
    assert_eq!(reject.code, ErrorCode::F99_APPLICATION_ERROR);
    assert_eq!(reject.message, "no thanks");

    assert_eq!(connie.balances("alice").await, (0, 0));
    assert_eq!(connie.balances("bob").await, (0, 0));
}

#[tokio::test]
async fn test_wrong_fulfillment_is_rejected() {
    let connie = connector().await;
    let reject = expect_reject(connie.send("alice", 100, "test.bob.liar").await);
    assert_eq!(reject.code, ErrorCode::F05_WRONG_CONDITION);
    assert_eq!(reject.triggered_by.unwrap().as_str(), OWN_ADDRESS);
    assert_eq!(connie.balances("bob").await, (0, 0));
}

#[tokio::test]
async fn test_unreachable_peer_is_t01() {
    let connie = connector().await;
    let reject = expect_reject(connie.send("alice", 100, "test.bob.down").await);
    assert_eq!(reject.code, ErrorCode::T01_PEER_UNREACHABLE);
    assert_eq!(reject.message, "peer unreachable");
    assert_eq!(connie.balances("alice").await, (0, 0));
}

#[tokio::test]
async fn test_cross_currency_packet_is_converted() {
    let connie = connector().await;
    let reply = connie.send("alice", 100, "test.carol.shop").await;
    assert!(reply.is_fulfill());

    let sent = connie.outgoing.sent();
    assert_eq!(sent[0].0, "carol");
    assert_eq!(sent[0].1.amount, 50);
    assert_eq!(connie.balances("alice").await, (0, 100));
    assert_eq!(connie.balances("carol").await, (50, 0));
}

#[tokio::test]
async fn test_zero_amount_packet_is_forwarded_without_booking() {
    let connie = connector().await;
    let reply = connie.send("alice", 0, "test.bob.shop").await;
    assert!(reply.is_fulfill());
    assert_eq!(connie.balances("bob").await, (0, 0));
}

// =========================================================================
// Packets rejected by this connector
// =========================================================================

#[tokio::test]
async fn test_unknown_destination_is_f02() {
    let connie = connector().await;
    let reject = expect_reject(connie.send("alice", 100, "test.nobody").await);
    assert_eq!(reject.code, ErrorCode::F02_UNREACHABLE);
    assert_eq!(reject.triggered_by.unwrap().as_str(), OWN_ADDRESS);
    assert!(connie.outgoing.sent().is_empty());
}

#[tokio::test]
async fn test_packet_for_own_address_is_f02() {
    let connie = connector().await;
    let reject = expect_reject(connie.send("alice", 100, "test.connie.inbox").await);
    assert_eq!(reject.code, ErrorCode::F02_UNREACHABLE);
    assert!(connie.outgoing.sent().is_empty());
}

#[tokio::test]
async fn test_maximum_balance_is_t04() {
    let connie = connector().await;
    let reject = expect_reject(connie.send("alice", 600, "test.bob.shop").await);
    assert_eq!(reject.code, ErrorCode::T04_INSUFFICIENT_LIQUIDITY);
    assert_eq!(reject.message, "exceeded maximum balance");
    assert!(connie.outgoing.sent().is_empty());
    assert_eq!(connie.balances("bob").await, (0, 0));

    // Still room for a smaller packet.
    assert!(connie.send("alice", 400, "test.bob.shop").await.is_fulfill());
}

#[tokio::test]
async fn test_incoming_throughput_limit() {
    let mut peers = peers();
    peers[0].info.incoming_throughput = Some(ThroughputLimit {
        amount: 150,
        refill_period_ms: Some(60_000),
    });
    let connie = Connector::new(peers, rates()).await;

    assert!(connie.send("alice", 100, "test.bob.shop").await.is_fulfill());
    let reject = expect_reject(connie.send("alice", 100, "test.bob.shop").await);
    assert_eq!(reject.code, ErrorCode::T04_INSUFFICIENT_LIQUIDITY);
    assert_eq!(reject.message, "exceeded money bandwidth, throttling.");
    assert_eq!(connie.balances("alice").await, (0, 100));
}

#[tokio::test]
async fn test_expired_packet_is_r02() {
    let connie = connector().await;
    let mut expired = prepare(100, "test.bob.shop");
    expired.expires_at = Utc::now() - chrono::Duration::seconds(1);
    let reply = connie
        .pipeline
        .process(expired, connie.peers.get("alice").unwrap())
        .await;
    let reject = expect_reject(reply);
    assert_eq!(reject.code, ErrorCode::R02_INSUFFICIENT_TIMEOUT);
    assert!(connie.outgoing.sent().is_empty());
}

#[tokio::test]
async fn test_unpriced_asset_is_internal_error() {
    let mut peers = peers();
    peers.push(TestPeer::new("dave", Relation::Peer, "JPY", 0));
    let connie = Connector::new(peers, rates()).await;

    let reject = expect_reject(connie.send("alice", 100, "test.dave.shop").await);
    assert_eq!(reject.code, ErrorCode::T00_INTERNAL_ERROR);
    assert_eq!(reject.message, "unexpected internal error");
    assert_eq!(connie.balances("alice").await, (0, 0));
}
