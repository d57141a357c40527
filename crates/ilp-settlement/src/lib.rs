//! Connector accounting: a two-phase ledger, pluggable settlement engines and
//! threshold-triggered settlement of payable balances.

pub mod accounting;
pub mod adapters;
pub mod error;
pub mod ledger;
pub mod manager;
pub mod traits;
pub mod types;

pub use accounting::AccountingSystem;
pub use adapters::{InMemorySettlementEngine, RemoteSettlementEngine};
pub use error::{LedgerError, SettlementError};
pub use ledger::{InMemoryLedger, Ledger, Transaction};
pub use manager::SettlementEngineRegistry;
pub use traits::SettlementEngine;
pub use types::{AccountSettings, AccountSnapshot, SettlementResponse, Transfer};
