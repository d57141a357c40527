use std::sync::Arc;

use async_trait::async_trait;
use ilp_core::SELF_PEER_ID;
use ilp_routing::{RouteManager, RoutingError};
use parking_lot::RwLock;

use crate::context::PacketContext;
use crate::error::PipelineError;
use crate::peers::PeerRegistry;
use crate::pipeline::{Middleware, Next};

/// Chooses the outgoing peer from the routing table.
pub struct RouteMiddleware {
    routes: Arc<RwLock<RouteManager>>,
    peers: Arc<PeerRegistry>,
}

impl RouteMiddleware {
    pub fn new(routes: Arc<RwLock<RouteManager>>, peers: Arc<PeerRegistry>) -> Self {
        Self { routes, peers }
    }
}

#[async_trait]
impl Middleware for RouteMiddleware {
    async fn handle(&self, ctx: &mut PacketContext, next: Next<'_>) -> Result<(), PipelineError> {
        let destination = ctx.destination().as_str().to_string();
        let next_hop = {
            let routes = self.routes.read();
            match routes.router().next_hop(&destination) {
                Ok(hop) => hop.to_string(),
                Err(RoutingError::NoRoute { .. }) => return Err(PipelineError::NoRoute(destination)),
                Err(e) => return Err(e.into()),
            }
        };
        // Nothing terminates packets locally.
        if next_hop == SELF_PEER_ID {
            return Err(PipelineError::NoRoute(destination));
        }
        let outgoing = self
            .peers
            .get(&next_hop)
            .ok_or_else(|| PipelineError::PeerNotFound(next_hop.clone()))?;
        tracing::debug!(destination = %destination, next_hop = %outgoing.id, "routing packet");
        ctx.set_outgoing(outgoing);
        next.run(ctx).await
    }

    fn name(&self) -> &'static str {
        "route"
    }
}
