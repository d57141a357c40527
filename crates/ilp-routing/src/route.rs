use serde::{Deserialize, Serialize};

/// Serde helper to carry opaque bytes as a hex string.
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

/// The best known way to reach a prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub prefix: String,
    /// Id of the directly connected peer packets for this prefix are sent to.
    pub next_hop: String,
    /// Connector addresses the announcement already traversed, nearest first.
    pub path: Vec<String>,
    /// Opaque credential; hashed once per hop when relayed.
    #[serde(with = "hex_bytes", default)]
    pub auth: Vec<u8>,
    #[serde(default)]
    pub weight: Option<u32>,
}

/// A route as announced by a peer, before route selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingRoute {
    pub peer: String,
    pub prefix: String,
    pub path: Vec<String>,
    #[serde(with = "hex_bytes", default)]
    pub auth: Vec<u8>,
    #[serde(default)]
    pub weight: Option<u32>,
}

impl IncomingRoute {
    pub fn new(peer: impl Into<String>, prefix: impl Into<String>, path: Vec<String>) -> Self {
        Self {
            peer: peer.into(),
            prefix: prefix.into(),
            path,
            auth: Vec::new(),
            weight: None,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_auth(mut self, auth: Vec<u8>) -> Self {
        self.auth = auth;
        self
    }

    /// The route this announcement installs, with the announcing peer as next hop.
    pub fn to_route(&self) -> Route {
        Route {
            prefix: self.prefix.clone(),
            next_hop: self.peer.clone(),
            path: self.path.clone(),
            auth: self.auth.clone(),
            weight: self.weight,
        }
    }
}

/// One entry of the forwarding log. `route == None` is a withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteUpdate {
    pub prefix: String,
    pub route: Option<Route>,
    pub epoch: u64,
}

impl RouteUpdate {
    pub fn is_withdrawal(&self) -> bool {
        self.route.is_none()
    }

    pub fn next_hop(&self) -> Option<&str> {
        self.route.as_ref().map(|r| r.next_hop.as_str())
    }
}
