use std::sync::Arc;

use async_trait::async_trait;
use ilp_core::{Address, ErrorCode, PeerInfo, Prepare, Reject, Reply};

use crate::context::PacketContext;
use crate::error::{PipelineError, INTERNAL_ERROR_MESSAGE};

/// One pipeline stage.
///
/// A stage may act before and after calling `next`, and must propagate
/// errors from `next` unless it handles them itself.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ctx: &mut PacketContext, next: Next<'_>) -> Result<(), PipelineError>;

    fn name(&self) -> &'static str;
}

/// The remainder of the pipeline after the current stage.
pub struct Next<'a> {
    stages: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    pub fn new(stages: &'a [Arc<dyn Middleware>]) -> Self {
        Self { stages }
    }

    /// An empty continuation. Useful for driving a single stage.
    pub fn end() -> Next<'static> {
        Next { stages: &[] }
    }

    pub async fn run(self, ctx: &mut PacketContext) -> Result<(), PipelineError> {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.handle(ctx, Next { stages: rest }).await,
            None => Ok(()),
        }
    }
}

/// An ordered list of stages with an error boundary.
pub struct Pipeline {
    own_address: Address,
    stages: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub fn new(own_address: Address) -> Self {
        Self {
            own_address,
            stages: Vec::new(),
        }
    }

    pub fn with(mut self, stage: impl Middleware + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn own_address(&self) -> &Address {
        &self.own_address
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run the stages and leave exactly one reply in the context.
    ///
    /// Errors become rejects triggered by this connector. A pipeline that
    /// finishes without a reply is rejected as an internal error.
    pub async fn handle(&self, ctx: &mut PacketContext) {
        match Next::new(&self.stages).run(ctx).await {
            Ok(()) if ctx.reply().is_some() => {}
            Ok(()) => {
                tracing::error!(destination = %ctx.destination(), "pipeline completed without a reply");
                ctx.set_reply(Reject::new(
                    ErrorCode::T00_INTERNAL_ERROR,
                    Some(self.own_address.clone()),
                    INTERNAL_ERROR_MESSAGE,
                ));
            }
            Err(e) => {
                tracing::info!(
                    error = %e,
                    incoming = %ctx.incoming().id,
                    destination = %ctx.destination(),
                    "error thrown in incoming pipeline"
                );
                ctx.set_reply(e.to_reject(&self.own_address));
            }
        }
    }

    /// Process one Prepare from `incoming` and return its reply.
    pub async fn process(&self, prepare: Prepare, incoming: Arc<PeerInfo>) -> Reply {
        let mut ctx = PacketContext::new(prepare, incoming);
        self.handle(&mut ctx).await;
        ctx.take_reply().unwrap_or_else(|| {
            Reject::new(
                ErrorCode::T00_INTERNAL_ERROR,
                Some(self.own_address.clone()),
                INTERNAL_ERROR_MESSAGE,
            )
            .into()
        })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("own_address", &self.own_address)
            .field("stages", &self.stage_names())
            .finish()
    }
}
