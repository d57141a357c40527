//! Routing for the ILP connector.
//!
//! This crate provides:
//! - [`PrefixMap`]: a longest-prefix-match container with deterministic key order.
//! - [`RoutingTable`] and [`ForwardingRoutingTable`]: the local best routes and
//!   the epoch-logged routes advertised to peers.
//! - [`Router`]: route installation, re-advertisement rules and the
//!   [`ForwardingFilter`] hook.
//! - [`RouteManager`] and [`Peer`]: per-peer announcements and best-route selection.
//! - [`ccp`]: sender/receiver state for route broadcast between connectors.

pub mod ccp;
pub mod error;
pub mod manager;
pub mod peer;
pub mod prefix_map;
pub mod route;
pub mod router;
pub mod table;

// Re-exports for convenience.
pub use ccp::{CcpReceiver, CcpSender, RouteControlRequest, RouteUpdateRequest, UpdateOutcome};
pub use error::RoutingError;
pub use manager::RouteManager;
pub use peer::Peer;
pub use prefix_map::PrefixMap;
pub use route::{IncomingRoute, Route, RouteUpdate};
pub use router::{ForwardingFilter, NoForwardingFilter, Router};
pub use table::{ForwardingRoutingTable, RoutingTable};
