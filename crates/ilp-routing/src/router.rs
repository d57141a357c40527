use ilp_core::address::matches_prefix;
use ilp_core::DEFAULT_GLOBAL_PREFIX;
use sha2::{Digest, Sha256};

use crate::error::RoutingError;
use crate::route::Route;
use crate::table::{ForwardingRoutingTable, RoutingTable};

/// Extra predicate consulted before a route is advertised to peers.
///
/// Returning `true` turns the advertisement into a withdrawal. This is the
/// hook for redundant-route suppression; the default never filters.
pub trait ForwardingFilter: Send + Sync {
    fn filter(&self, table: &ForwardingRoutingTable, prefix: &str, route: &Route) -> bool;
}

/// A [`ForwardingFilter`] that lets every route through.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoForwardingFilter;

impl ForwardingFilter for NoForwardingFilter {
    fn filter(&self, _table: &ForwardingRoutingTable, _prefix: &str, _route: &Route) -> bool {
        false
    }
}

/// Owns the local routing table and the forwarding table derived from it.
pub struct Router {
    global_prefix: String,
    own_address: Option<String>,
    routing_table: RoutingTable,
    forwarding_table: ForwardingRoutingTable,
    filter: Box<dyn ForwardingFilter>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("global_prefix", &self.global_prefix)
            .field("own_address", &self.own_address)
            .field("routes", &self.routing_table.len())
            .field("current_epoch", &self.forwarding_table.current_epoch())
            .finish()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            global_prefix: DEFAULT_GLOBAL_PREFIX.to_string(),
            own_address: None,
            routing_table: RoutingTable::new(),
            forwarding_table: ForwardingRoutingTable::new(),
            filter: Box::new(NoForwardingFilter),
        }
    }

    pub fn with_forwarding_filter(mut self, filter: impl ForwardingFilter + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }

    pub fn set_global_prefix(&mut self, prefix: impl Into<String>) {
        self.global_prefix = prefix.into();
    }

    pub fn global_prefix(&self) -> &str {
        &self.global_prefix
    }

    pub fn set_own_address(&mut self, address: impl Into<String>) {
        self.own_address = Some(address.into());
    }

    pub fn own_address(&self) -> Result<&str, RoutingError> {
        self.own_address.as_deref().ok_or(RoutingError::OwnAddressNotSet)
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.routing_table
    }

    pub fn forwarding_table(&self) -> &ForwardingRoutingTable {
        &self.forwarding_table
    }

    /// Offer `route` as the best route for `prefix`. Returns whether the local table changed.
    pub fn add_route(&mut self, prefix: &str, route: Route) -> Result<bool, RoutingError> {
        self.own_address()?;
        Ok(self.update_local_route(prefix, Some(route)))
    }

    /// Drop the route for `prefix`. Returns whether the local table changed.
    pub fn remove_route(&mut self, prefix: &str) -> bool {
        self.update_local_route(prefix, None)
    }

    /// Peer id packets for `destination` should be sent to.
    pub fn next_hop(&self, destination: &str) -> Result<&str, RoutingError> {
        self.routing_table
            .resolve(destination)
            .map(|route| route.next_hop.as_str())
            .ok_or_else(|| RoutingError::NoRoute {
                destination: destination.to_string(),
            })
    }

    fn update_local_route(&mut self, prefix: &str, route: Option<Route>) -> bool {
        let current_next_hop = self.routing_table.get(prefix).map(|r| r.next_hop.as_str());
        let new_next_hop = route.as_ref().map(|r| r.next_hop.as_str());
        if current_next_hop == new_next_hop {
            return false;
        }

        match &route {
            Some(route) => {
                tracing::debug!(
                    prefix,
                    old_next_hop = ?current_next_hop,
                    new_next_hop = %route.next_hop,
                    "new best route for prefix"
                );
                self.routing_table.insert(prefix, route.clone());
            }
            None => {
                tracing::debug!(prefix, "no more route available for prefix");
                self.routing_table.delete(prefix);
            }
        }

        self.update_forwarding_route(prefix, route);
        true
    }

    /// Rewrite a local route into the form advertised to peers, or `None`
    /// when it must not be advertised.
    fn forwarded_form(&self, prefix: &str, route: Route) -> Option<Route> {
        let own_address = self.own_address.as_deref()?;

        let mut path = Vec::with_capacity(route.path.len() + 1);
        path.push(own_address.to_string());
        path.extend(route.path);
        let auth = if route.auth.is_empty() {
            Vec::new()
        } else {
            Sha256::digest(&route.auth).to_vec()
        };
        let route = Route { path, auth, ..route };

        let outside_global = !matches_prefix(prefix, &self.global_prefix);
        let is_default_route = prefix == self.global_prefix;
        // Customers under our own address are covered by our own prefix.
        let own_customer = matches_prefix(prefix, own_address)
            && prefix != own_address
            && route.path.len() == 1;

        if outside_global
            || is_default_route
            || own_customer
            || self.filter.filter(&self.forwarding_table, prefix, &route)
        {
            None
        } else {
            Some(route)
        }
    }

    fn update_forwarding_route(&mut self, prefix: &str, route: Option<Route>) {
        let route = route.and_then(|r| self.forwarded_form(prefix, r));

        let current_next_hop = self
            .forwarding_table
            .get(prefix)
            .and_then(|u| u.next_hop())
            .map(str::to_string);
        let new_next_hop = route.as_ref().map(|r| r.next_hop.clone());
        if current_next_hop == new_next_hop {
            return;
        }

        let installed = route.is_some();
        let epoch = self.forwarding_table.record(prefix, route);
        tracing::trace!(prefix, epoch, withdrawn = !installed, "logged route update");

        if installed {
            // Filtering of more specific prefixes may depend on this one.
            for sub_prefix in self.forwarding_table.keys_starting_with(prefix) {
                if sub_prefix == prefix {
                    continue;
                }
                let advertised = self
                    .forwarding_table
                    .get(&sub_prefix)
                    .is_some_and(|u| u.route.is_some());
                if !advertised {
                    continue;
                }
                if let Some(local) = self.routing_table.get(&sub_prefix).cloned() {
                    self.update_forwarding_route(&sub_prefix, Some(local));
                }
            }
        }
    }
}
