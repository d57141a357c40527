use serde::Serialize;
use uuid::Uuid;

use crate::prefix_map::PrefixMap;
use crate::route::{Route, RouteUpdate};

/// The best local route per prefix. Packet forwarding resolves against this table.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct RoutingTable {
    routes: PrefixMap<Route>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, prefix: &str, route: Route) -> Option<Route> {
        self.routes.insert(prefix, route)
    }

    pub fn delete(&mut self, prefix: &str) -> Option<Route> {
        self.routes.delete(prefix)
    }

    pub fn get(&self, prefix: &str) -> Option<&Route> {
        self.routes.get(prefix)
    }

    /// Longest-prefix match for a destination address.
    pub fn resolve(&self, destination: &str) -> Option<&Route> {
        self.routes.resolve(destination)
    }

    pub fn keys(&self) -> &[String] {
        self.routes.keys()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Route)> {
        self.routes.iter()
    }
}

/// The routes this connector advertises, plus an epoch-indexed change log.
///
/// `log[e]` holds the update that currently owns epoch `e`, or `None` once a
/// later update for the same prefix superseded it. The log therefore always
/// has exactly `current_epoch` slots.
#[derive(Debug, Clone)]
pub struct ForwardingRoutingTable {
    routing_table_id: Uuid,
    current_epoch: u64,
    updates: PrefixMap<RouteUpdate>,
    log: Vec<Option<RouteUpdate>>,
}

impl Default for ForwardingRoutingTable {
    fn default() -> Self {
        Self {
            routing_table_id: Uuid::now_v7(),
            current_epoch: 0,
            updates: PrefixMap::new(),
            log: Vec::new(),
        }
    }
}

impl ForwardingRoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifies this log instance. Peers holding a different id must resync from epoch 0.
    pub fn routing_table_id(&self) -> Uuid {
        self.routing_table_id
    }

    /// The next epoch to be assigned.
    pub fn current_epoch(&self) -> u64 {
        self.current_epoch
    }

    pub fn get(&self, prefix: &str) -> Option<&RouteUpdate> {
        self.updates.get(prefix)
    }

    pub fn keys(&self) -> &[String] {
        self.updates.keys()
    }

    pub fn keys_starting_with(&self, prefix: &str) -> Vec<String> {
        self.updates.keys_starting_with(prefix)
    }

    pub fn prefix_map(&self) -> &PrefixMap<RouteUpdate> {
        &self.updates
    }

    /// Assign the next epoch to a change for `prefix`, supersede the previous
    /// entry's log slot and record the new one. Returns the assigned epoch.
    pub(crate) fn record(&mut self, prefix: &str, route: Option<Route>) -> u64 {
        let epoch = self.current_epoch;
        self.current_epoch += 1;

        let update = RouteUpdate {
            prefix: prefix.to_string(),
            route,
            epoch,
        };
        if let Some(previous) = self.updates.insert(prefix, update.clone()) {
            if let Some(slot) = self.log.get_mut(previous.epoch as usize) {
                *slot = None;
            }
        }
        self.log.push(Some(update));
        epoch
    }

    pub fn log_entry(&self, epoch: u64) -> Option<&RouteUpdate> {
        self.log.get(epoch as usize).and_then(Option::as_ref)
    }

    /// Log slots `[from, min(from + max, current_epoch))`, superseded slots included as `None`.
    pub fn updates_since(&self, from: u64, max: usize) -> &[Option<RouteUpdate>] {
        let start = (from as usize).min(self.log.len());
        let end = start.saturating_add(max).min(self.log.len());
        &self.log[start..end]
    }
}
