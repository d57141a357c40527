use serde::{Deserialize, Serialize};
use std::fmt;

/// Peer id used for routes that terminate at this connector.
pub const SELF_PEER_ID: &str = "self";

/// Business relationship with a peer. Drives route preference and CCP filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    Parent,
    Peer,
    Child,
    Local,
}

impl Relation {
    /// Default route weight for routes learned from a peer with this relation.
    pub fn default_weight(self) -> u32 {
        match self {
            Relation::Parent => 400,
            Relation::Peer => 300,
            Relation::Child => 200,
            Relation::Local => 100,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Relation::Parent => "parent",
            Relation::Peer => "peer",
            Relation::Child => "child",
            Relation::Local => "local",
        };
        f.write_str(s)
    }
}

/// An asset denomination: code plus number of decimal places of the smallest unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    pub code: String,
    pub scale: u8,
}

impl Asset {
    pub fn new(code: impl Into<String>, scale: u8) -> Self {
        Self {
            code: code.into(),
            scale,
        }
    }
}

impl Default for Asset {
    fn default() -> Self {
        Self::new("XRP", 9)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.code, self.scale)
    }
}

/// Token-bucket rate limit for one direction of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThroughputLimit {
    /// Bucket capacity, in units of the peer's asset.
    pub amount: u64,
    /// Time to refill a full bucket. Falls back to the connector default when unset.
    #[serde(default)]
    pub refill_period_ms: Option<u64>,
}

/// Everything the connector knows about a directly connected peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub id: String,
    pub relation: Relation,
    /// Overrides the relation's default weight when set.
    #[serde(default)]
    pub relation_weight: Option<u32>,
    #[serde(default)]
    pub asset: Asset,
    /// ILP-over-HTTP endpoint of the peer.
    #[serde(default)]
    pub url: Option<String>,
    /// Bearer token the peer presents to us, and we present to it.
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub incoming_throughput: Option<ThroughputLimit>,
    #[serde(default)]
    pub outgoing_throughput: Option<ThroughputLimit>,
    #[serde(default)]
    pub is_ccp_sender: bool,
    #[serde(default)]
    pub is_ccp_receiver: bool,
}

impl PeerInfo {
    pub fn new(id: impl Into<String>, relation: Relation) -> Self {
        Self {
            id: id.into(),
            relation,
            relation_weight: None,
            asset: Asset::default(),
            url: None,
            auth_token: None,
            incoming_throughput: None,
            outgoing_throughput: None,
            is_ccp_sender: false,
            is_ccp_receiver: false,
        }
    }

    pub fn weight(&self) -> u32 {
        self.relation_weight
            .unwrap_or_else(|| self.relation.default_weight())
    }
}
