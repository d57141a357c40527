use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::error::LedgerError;
use crate::types::{AccountSettings, AccountSnapshot, Transfer};

/// The second phase of a ledger mutation. Exactly one of `commit` or
/// `rollback` runs; dropping an unresolved transaction rolls it back.
#[async_trait]
pub trait Transaction: Send {
    async fn commit(self: Box<Self>) -> Result<(), LedgerError>;

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError>;
}

/// Ledger collaborator: the only place account balances change.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn create(&self, settings: AccountSettings) -> Result<AccountSnapshot, LedgerError>;

    async fn get(&self, account_id: &str) -> Result<AccountSnapshot, LedgerError>;

    async fn remove(&self, account_id: &str) -> Result<AccountSnapshot, LedgerError>;

    async fn adjust_balance_payable(
        &self,
        account_id: &str,
        delta: i128,
    ) -> Result<Box<dyn Transaction>, LedgerError>;

    async fn adjust_balance_receivable(
        &self,
        account_id: &str,
        delta: i128,
    ) -> Result<Box<dyn Transaction>, LedgerError>;

    /// Reserve `source_amount` on the source's receivable balance and
    /// `destination_amount` on the destination's payable balance.
    async fn create_transfer(&self, transfer: Transfer) -> Result<Box<dyn Transaction>, LedgerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Payable,
    Receivable,
}

#[derive(Debug, Clone)]
struct Leg {
    account_id: String,
    side: Side,
    delta: i128,
}

/// Committed balances plus outstanding reservations.
#[derive(Debug, Clone)]
struct AccountState {
    settings: AccountSettings,
    balance_payable: i128,
    balance_receivable: i128,
    pending_payable: i128,
    pending_receivable: i128,
}

impl AccountState {
    fn new(settings: AccountSettings) -> Self {
        Self {
            settings,
            balance_payable: 0,
            balance_receivable: 0,
            pending_payable: 0,
            pending_receivable: 0,
        }
    }

    fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            settings: self.settings.clone(),
            balance_payable: self.balance_payable,
            balance_receivable: self.balance_receivable,
        }
    }

    fn reserve(&mut self, side: Side, delta: i128) -> Result<(), LedgerError> {
        let (balance, pending, maximum) = match side {
            Side::Payable => (
                self.balance_payable,
                &mut self.pending_payable,
                self.settings.maximum_payable,
            ),
            Side::Receivable => (
                self.balance_receivable,
                &mut self.pending_receivable,
                self.settings.maximum_receivable,
            ),
        };
        let projected = balance
            .checked_add(*pending)
            .and_then(|v| v.checked_add(delta))
            .ok_or_else(|| LedgerError::Overflow(self.settings.id.clone()))?;
        if delta > 0 {
            if let Some(maximum) = maximum {
                if projected > i128::from(maximum) {
                    return Err(LedgerError::ExceedsMaximumBalance(self.settings.id.clone()));
                }
            }
        }
        *pending += delta;
        Ok(())
    }

    fn release(&mut self, side: Side, delta: i128) {
        match side {
            Side::Payable => self.pending_payable -= delta,
            Side::Receivable => self.pending_receivable -= delta,
        }
    }

    fn apply(&mut self, side: Side, delta: i128) {
        self.release(side, delta);
        match side {
            Side::Payable => self.balance_payable += delta,
            Side::Receivable => self.balance_receivable += delta,
        }
    }
}

type Accounts = Arc<DashMap<String, AccountState>>;

/// In-memory ledger backed by DashMap.
///
/// Mutations reserve against the account's maximum balance immediately and
/// only touch committed balances on commit. Every commit publishes the
/// updated snapshots on the optional balance-update channel.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    accounts: Accounts,
    updates: Option<mpsc::Sender<AccountSnapshot>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger that publishes committed snapshots to a bounded channel of `capacity`.
    pub fn with_updates(capacity: usize) -> (Self, mpsc::Receiver<AccountSnapshot>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let ledger = Self {
            accounts: Arc::new(DashMap::new()),
            updates: Some(tx),
        };
        (ledger, rx)
    }

    pub fn account_ids(&self) -> Vec<String> {
        self.accounts.iter().map(|e| e.key().clone()).collect()
    }

    fn prepare(&self, legs: Vec<Leg>) -> Result<Box<dyn Transaction>, LedgerError> {
        let mut reserved: Vec<&Leg> = Vec::with_capacity(legs.len());
        for leg in &legs {
            let result = match self.accounts.get_mut(&leg.account_id) {
                Some(mut account) => account.reserve(leg.side, leg.delta),
                None => Err(LedgerError::AccountNotFound(leg.account_id.clone())),
            };
            if let Err(e) = result {
                for done in reserved {
                    if let Some(mut account) = self.accounts.get_mut(&done.account_id) {
                        account.release(done.side, done.delta);
                    }
                }
                return Err(e);
            }
            reserved.push(leg);
        }
        Ok(Box::new(InMemoryTransaction {
            accounts: Arc::clone(&self.accounts),
            updates: self.updates.clone(),
            legs,
            resolved: false,
        }))
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn create(&self, settings: AccountSettings) -> Result<AccountSnapshot, LedgerError> {
        let id = settings.id.clone();
        match self.accounts.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(LedgerError::AccountExists(id)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let state = AccountState::new(settings);
                let snapshot = state.snapshot();
                slot.insert(state);
                tracing::info!(account_id = %id, "ledger account created");
                Ok(snapshot)
            }
        }
    }

    async fn get(&self, account_id: &str) -> Result<AccountSnapshot, LedgerError> {
        self.accounts
            .get(account_id)
            .map(|a| a.snapshot())
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))
    }

    async fn remove(&self, account_id: &str) -> Result<AccountSnapshot, LedgerError> {
        self.accounts
            .remove(account_id)
            .map(|(_, state)| state.snapshot())
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))
    }

    async fn adjust_balance_payable(
        &self,
        account_id: &str,
        delta: i128,
    ) -> Result<Box<dyn Transaction>, LedgerError> {
        self.prepare(vec![Leg {
            account_id: account_id.to_string(),
            side: Side::Payable,
            delta,
        }])
    }

    async fn adjust_balance_receivable(
        &self,
        account_id: &str,
        delta: i128,
    ) -> Result<Box<dyn Transaction>, LedgerError> {
        self.prepare(vec![Leg {
            account_id: account_id.to_string(),
            side: Side::Receivable,
            delta,
        }])
    }

    async fn create_transfer(&self, transfer: Transfer) -> Result<Box<dyn Transaction>, LedgerError> {
        self.prepare(vec![
            Leg {
                account_id: transfer.source_account_id,
                side: Side::Receivable,
                delta: i128::from(transfer.source_amount),
            },
            Leg {
                account_id: transfer.destination_account_id,
                side: Side::Payable,
                delta: i128::from(transfer.destination_amount),
            },
        ])
    }
}

struct InMemoryTransaction {
    accounts: Accounts,
    updates: Option<mpsc::Sender<AccountSnapshot>>,
    legs: Vec<Leg>,
    resolved: bool,
}

impl InMemoryTransaction {
    fn release_all(&mut self) {
        for leg in &self.legs {
            if let Some(mut account) = self.accounts.get_mut(&leg.account_id) {
                account.release(leg.side, leg.delta);
            }
        }
        self.resolved = true;
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(mut self: Box<Self>) -> Result<(), LedgerError> {
        let mut snapshots = Vec::with_capacity(self.legs.len());
        for leg in &self.legs {
            match self.accounts.get_mut(&leg.account_id) {
                Some(mut account) => {
                    account.apply(leg.side, leg.delta);
                    snapshots.push(account.snapshot());
                }
                None => {
                    tracing::warn!(account_id = %leg.account_id, "account removed before commit");
                }
            }
        }
        self.resolved = true;

        if let Some(updates) = &self.updates {
            for snapshot in snapshots {
                match updates.try_send(snapshot) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(snapshot)) => {
                        tracing::warn!(account_id = %snapshot.id(), "balance update queue full, dropping update");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {}
                }
            }
        }
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), LedgerError> {
        self.release_all();
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.resolved {
            self.release_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ledger_with(accounts: &[AccountSettings]) -> InMemoryLedger {
        let ledger = InMemoryLedger::new();
        for settings in accounts {
            ledger.create(settings.clone()).await.unwrap();
        }
        ledger
    }

    fn alice() -> AccountSettings {
        AccountSettings::new("alice", "XRP", 9)
    }

    fn bob() -> AccountSettings {
        let mut settings = AccountSettings::new("bob", "XRP", 9);
        settings.maximum_payable = Some(1000);
        settings
    }

    fn transfer(amount: u64) -> Transfer {
        Transfer {
            source_account_id: "alice".into(),
            destination_account_id: "bob".into(),
            source_amount: amount,
            destination_amount: amount,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let ledger = ledger_with(&[alice()]).await;
        let snapshot = ledger.get("alice").await.unwrap();
        assert_eq!(snapshot.balance_payable, 0);
        assert!(matches!(ledger.create(alice()).await, Err(LedgerError::AccountExists(_))));
        assert!(matches!(ledger.get("nobody").await, Err(LedgerError::AccountNotFound(_))));
        ledger.remove("alice").await.unwrap();
        assert!(ledger.account_ids().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_commit() {
        let ledger = ledger_with(&[alice(), bob()]).await;
        let tx = ledger.create_transfer(transfer(100)).await.unwrap();
        // Nothing visible before commit.
        assert_eq!(ledger.get("alice").await.unwrap().balance_receivable, 0);
        tx.commit().await.unwrap();

        let alice = ledger.get("alice").await.unwrap();
        let bob = ledger.get("bob").await.unwrap();
        assert_eq!((alice.balance_receivable, alice.balance_payable), (100, 0));
        assert_eq!((bob.balance_receivable, bob.balance_payable), (0, 100));
    }

    #[tokio::test]
    async fn test_transfer_rollback_releases_reservation() {
        let ledger = ledger_with(&[alice(), bob()]).await;
        let tx = ledger.create_transfer(transfer(800)).await.unwrap();
        assert!(matches!(
            ledger.create_transfer(transfer(300)).await,
            Err(LedgerError::ExceedsMaximumBalance(id)) if id == "bob"
        ));
        tx.rollback().await.unwrap();
        ledger.create_transfer(transfer(300)).await.unwrap().commit().await.unwrap();
        assert_eq!(ledger.get("bob").await.unwrap().balance_payable, 300);
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let ledger = ledger_with(&[alice(), bob()]).await;
        drop(ledger.create_transfer(transfer(1000)).await.unwrap());
        ledger.create_transfer(transfer(1000)).await.unwrap().commit().await.unwrap();
        assert_eq!(ledger.get("bob").await.unwrap().balance_payable, 1000);
    }

    #[tokio::test]
    async fn test_failed_leg_releases_earlier_legs() {
        let mut alice = alice();
        alice.maximum_receivable = Some(10_000);
        let ledger = ledger_with(&[alice, bob()]).await;
        assert!(ledger.create_transfer(transfer(5_000)).await.is_err());
        // alice's receivable reservation from the failed transfer was released.
        let mut t = transfer(10_000);
        t.destination_amount = 1;
        ledger.create_transfer(t).await.unwrap().commit().await.unwrap();
        assert_eq!(ledger.get("alice").await.unwrap().balance_receivable, 10_000);
    }

    #[tokio::test]
    async fn test_negative_adjustment_ignores_maximum() {
        let ledger = ledger_with(&[bob()]).await;
        ledger.adjust_balance_payable("bob", 1000).await.unwrap().commit().await.unwrap();
        ledger.adjust_balance_payable("bob", -400).await.unwrap().commit().await.unwrap();
        assert_eq!(ledger.get("bob").await.unwrap().balance_payable, 600);
    }

    #[tokio::test]
    async fn test_commit_publishes_snapshots() {
        let (ledger, mut rx) = InMemoryLedger::with_updates(8);
        ledger.create(alice()).await.unwrap();
        ledger.create(bob()).await.unwrap();
        ledger.create_transfer(transfer(5)).await.unwrap().commit().await.unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.id(), "alice");
        assert_eq!(second.id(), "bob");
        assert_eq!(second.balance_payable, 5);
    }

    #[tokio::test]
    async fn test_full_queue_does_not_fail_commit() {
        let (ledger, _rx) = InMemoryLedger::with_updates(1);
        ledger.create(alice()).await.unwrap();
        for _ in 0..3 {
            ledger.adjust_balance_receivable("alice", 1).await.unwrap().commit().await.unwrap();
        }
        assert_eq!(ledger.get("alice").await.unwrap().balance_receivable, 3);
    }

    #[tokio::test]
    async fn test_rollback_without_updates() {
        let (ledger, mut rx) = InMemoryLedger::with_updates(4);
        ledger.create(alice()).await.unwrap();
        ledger.adjust_balance_receivable("alice", 7).await.unwrap().rollback().await.unwrap();
        assert!(rx.try_recv().is_err());
    }
}
