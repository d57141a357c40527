use std::sync::Arc;

use chrono::{DateTime, Utc};
use ilp_core::{Address, Fulfill, PeerInfo, Prepare, Reject, Reply};

use crate::error::PipelineError;

/// Per-packet state shared by every pipeline stage.
///
/// Holds the Prepare as received alongside its current (possibly rewritten)
/// amount and expiry. The reply slot holds at most one of fulfill or reject.
#[derive(Debug, Clone)]
pub struct PacketContext {
    prepare: Prepare,
    original_amount: u64,
    original_expires_at: DateTime<Utc>,
    amount_changed: bool,
    expiry_changed: bool,
    reply: Option<Reply>,
    incoming: Arc<PeerInfo>,
    outgoing: Option<Arc<PeerInfo>>,
    /// Set when the packet is known not to be fulfillable downstream.
    pub unfulfillable: bool,
    /// Set when the packet terminates at a local STREAM receiver.
    pub stream_destination: Option<String>,
}

impl PacketContext {
    pub fn new(prepare: Prepare, incoming: Arc<PeerInfo>) -> Self {
        Self {
            original_amount: prepare.amount,
            original_expires_at: prepare.expires_at,
            prepare,
            amount_changed: false,
            expiry_changed: false,
            reply: None,
            incoming,
            outgoing: None,
            unfulfillable: false,
            stream_destination: None,
        }
    }

    /// The Prepare to forward, with any rewrites applied.
    pub fn prepare(&self) -> &Prepare {
        &self.prepare
    }

    pub fn destination(&self) -> &Address {
        &self.prepare.destination
    }

    pub fn amount(&self) -> u64 {
        self.prepare.amount
    }

    pub fn original_amount(&self) -> u64 {
        self.original_amount
    }

    pub fn set_amount(&mut self, amount: u64) {
        if amount != self.prepare.amount {
            self.prepare.amount = amount;
            self.amount_changed = true;
        }
    }

    pub fn amount_changed(&self) -> bool {
        self.amount_changed
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.prepare.expires_at
    }

    pub fn original_expires_at(&self) -> DateTime<Utc> {
        self.original_expires_at
    }

    pub fn set_expires_at(&mut self, expires_at: DateTime<Utc>) {
        if expires_at != self.prepare.expires_at {
            self.prepare.expires_at = expires_at;
            self.expiry_changed = true;
        }
    }

    pub fn expiry_changed(&self) -> bool {
        self.expiry_changed
    }

    pub fn incoming(&self) -> &Arc<PeerInfo> {
        &self.incoming
    }

    pub fn outgoing(&self) -> Option<&Arc<PeerInfo>> {
        self.outgoing.as_ref()
    }

    /// The outgoing peer, which must have been chosen by the route stage.
    pub fn outgoing_peer(&self) -> Result<&Arc<PeerInfo>, PipelineError> {
        self.outgoing
            .as_ref()
            .ok_or_else(|| PipelineError::Internal("outgoing peer not resolved".into()))
    }

    pub fn set_outgoing(&mut self, peer: Arc<PeerInfo>) {
        self.outgoing = Some(peer);
    }

    pub fn reply(&self) -> Option<&Reply> {
        self.reply.as_ref()
    }

    /// Set the reply, replacing any previous one.
    pub fn set_reply(&mut self, reply: impl Into<Reply>) {
        self.reply = Some(reply.into());
    }

    pub fn take_reply(&mut self) -> Option<Reply> {
        self.reply.take()
    }

    pub fn fulfill(&self) -> Option<&Fulfill> {
        match &self.reply {
            Some(Reply::Fulfill(fulfill)) => Some(fulfill),
            _ => None,
        }
    }

    pub fn reject(&self) -> Option<&Reject> {
        match &self.reply {
            Some(Reply::Reject(reject)) => Some(reject),
            _ => None,
        }
    }
}
