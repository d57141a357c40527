//! Settlement engine implementations.

pub mod http;
pub mod internal;

pub use http::RemoteSettlementEngine;
pub use internal::{InMemorySettlementEngine, SettlementRecord};
