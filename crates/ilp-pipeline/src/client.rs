use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ilp_core::{PeerInfo, Prepare, Reply};

use crate::context::PacketContext;
use crate::error::PipelineError;
use crate::pipeline::{Middleware, Next};

/// Delivers a Prepare to a peer and returns its reply.
#[async_trait]
pub trait OutgoingService: Send + Sync {
    async fn send(&self, peer: &PeerInfo, prepare: &Prepare) -> Result<Reply, PipelineError>;
}

/// ILP-over-HTTP: POSTs the encoded Prepare to the peer's URL and decodes
/// the reply from the response body.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PipelineError::Internal(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl OutgoingService for HttpClient {
    async fn send(&self, peer: &PeerInfo, prepare: &Prepare) -> Result<Reply, PipelineError> {
        let url = peer
            .url
            .as_deref()
            .ok_or_else(|| PipelineError::PeerUnreachable(format!("no url configured for peer {}", peer.id)))?;

        let body = prepare
            .to_bytes()
            .map_err(|e| PipelineError::InvalidPacket(e.to_string()))?;
        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body);
        if let Some(token) = &peer.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::PeerUnreachable(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::PeerUnreachable(format!(
                "peer {} returned {status}: {body}",
                peer.id
            )));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| PipelineError::PeerUnreachable(e.to_string()))?;
        Reply::from_bytes(&body).map_err(|e| PipelineError::Internal(format!("invalid reply from {}: {e}", peer.id)))
    }
}

/// Terminal stage: sends the packet to the outgoing peer.
pub struct ClientMiddleware {
    client: Arc<dyn OutgoingService>,
}

impl ClientMiddleware {
    pub fn new(client: Arc<dyn OutgoingService>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Middleware for ClientMiddleware {
    async fn handle(&self, ctx: &mut PacketContext, _next: Next<'_>) -> Result<(), PipelineError> {
        let peer = ctx.outgoing_peer()?.clone();
        let reply = self.client.send(&peer, ctx.prepare()).await?;
        ctx.set_reply(reply);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "client"
    }
}
