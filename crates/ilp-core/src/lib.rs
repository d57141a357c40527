//! Protocol primitives for the ILP connector: addresses, packets and their
//! binary encoding, wire error codes, peer descriptions and connector policy.

pub mod address;
pub mod config;
pub mod error;
pub mod error_code;
pub mod packet;
pub mod types;

pub use address::Address;
pub use config::{ConnectorConfig, DEFAULT_GLOBAL_PREFIX};
pub use error::CoreError;
pub use error_code::{ErrorClass, ErrorCode};
pub use packet::{condition_for, Fulfill, Prepare, Reject, Reply};
pub use types::{Asset, PeerInfo, Relation, ThroughputLimit, SELF_PEER_ID};
