//! Integration test: balances crossing the settlement threshold.
//!
//! Packets are forwarded through the pipeline; committed balance changes feed
//! the settlement worker, which settles with the in-memory engine.

use std::time::Duration;

use ilp_core::{Relation, Reply};
use ilp_integration_tests::{prepare, Connector, TestPeer};
use ilp_pipeline::{FixedRates, SETTLEMENT_ADDRESS};

async fn connector(threshold: u64, settle_to: Option<u64>) -> Connector {
    let alice = TestPeer::new("alice", Relation::Child, "USD", 2);
    let mut bob = TestPeer::new("bob", Relation::Peer, "USD", 2);
    bob.account.settlement_threshold = Some(threshold);
    bob.account.settle_to = settle_to;
    let mut connie = Connector::new(vec![alice, bob], FixedRates::new()).await;

    let updates = connie.updates.take().unwrap();
    connie.accounting.clone().spawn_settlement_worker(updates);
    connie
}

/// Poll until bob's payable balance reaches `expected` or give up.
async fn wait_for_payable(connie: &Connector, expected: i128) -> i128 {
    let mut payable = connie.balances("bob").await.0;
    for _ in 0..100 {
        if payable == expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        payable = connie.balances("bob").await.0;
    }
    payable
}

#[tokio::test]
async fn test_crossing_threshold_settles_full_balance() {
    let connie = connector(100, None).await;
    assert!(connie.send("alice", 150, "test.bob.shop").await.is_fulfill());

    assert_eq!(wait_for_payable(&connie, 0).await, 0);
    let settlements = connie.engine.settlements("bob");
    assert_eq!(settlements.len(), 1);
    assert_eq!(settlements[0].amount, 150);
    assert_eq!(settlements[0].scale, 2);
    // The incoming side is untouched by settlement.
    assert_eq!(connie.balances("alice").await, (0, 150));
}

#[tokio::test]
async fn test_settles_down_to_settle_to() {
    let connie = connector(100, Some(20)).await;
    assert!(connie.send("alice", 150, "test.bob.shop").await.is_fulfill());

    assert_eq!(wait_for_payable(&connie, 20).await, 20);
    assert_eq!(connie.engine.settlements("bob")[0].amount, 130);
}

#[tokio::test]
async fn test_below_threshold_does_not_settle() {
    let connie = connector(100, None).await;
    assert!(connie.send("alice", 60, "test.bob.shop").await.is_fulfill());
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(connie.engine.settlements("bob").is_empty());
    assert_eq!(connie.balances("bob").await, (60, 0));

    // The second packet pushes the balance over.
    assert!(connie.send("alice", 60, "test.bob.shop").await.is_fulfill());
    assert_eq!(wait_for_payable(&connie, 0).await, 0);
    assert_eq!(connie.engine.settlements("bob")[0].amount, 120);
}

#[tokio::test]
async fn test_rejected_packet_never_settles() {
    let connie = connector(100, None).await;
    assert!(!connie.send("alice", 150, "test.bob.reject").await.is_fulfill());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(connie.engine.settlements("bob").is_empty());
}

#[tokio::test]
async fn test_failed_settlement_keeps_balance() {
    let connie = connector(100, None).await;
    connie.engine.set_failing(true);
    assert!(connie.send("alice", 150, "test.bob.shop").await.is_fulfill());
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(connie.engine.settlements("bob").is_empty());
    assert_eq!(connie.balances("bob").await, (150, 0));

    // The next balance change retries.
    connie.engine.set_failing(false);
    assert!(connie.send("alice", 10, "test.bob.shop").await.is_fulfill());
    assert_eq!(wait_for_payable(&connie, 0).await, 0);
    assert_eq!(connie.engine.settlements("bob")[0].amount, 160);
}

#[tokio::test]
async fn test_settlement_message_reaches_engine() {
    let connie = connector(100, None).await;
    let mut message = prepare(0, SETTLEMENT_ADDRESS);
    message.data = bytes::Bytes::from_static(b"paychan-claim");

    let reply = connie
        .pipeline
        .process(message, connie.peers.get("bob").unwrap())
        .await;
    match reply {
        Reply::Fulfill(fulfill) => assert_eq!(&fulfill.data[..], b"paychan-claim"),
        Reply::Reject(reject) => panic!("unexpected reject: {reject:?}"),
    }
    assert_eq!(connie.engine.messages("bob").len(), 1);
    assert!(connie.outgoing.sent().is_empty());
}
