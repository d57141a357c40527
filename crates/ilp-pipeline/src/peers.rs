use std::sync::Arc;

use dashmap::DashMap;
use ilp_core::PeerInfo;

/// Directly connected peers, indexed by id and by the auth token they present.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: DashMap<String, Arc<PeerInfo>>,
    tokens: DashMap<String, String>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a peer. Returns the previous entry.
    pub fn insert(&self, peer: PeerInfo) -> Option<Arc<PeerInfo>> {
        let peer = Arc::new(peer);
        let previous = self.peers.insert(peer.id.clone(), peer.clone());
        if let Some(token) = previous.as_ref().and_then(|p| p.auth_token.as_ref()) {
            self.tokens.remove(token);
        }
        if let Some(token) = &peer.auth_token {
            self.tokens.insert(token.clone(), peer.id.clone());
        }
        previous
    }

    pub fn remove(&self, id: &str) -> Option<Arc<PeerInfo>> {
        let (_, peer) = self.peers.remove(id)?;
        if let Some(token) = &peer.auth_token {
            self.tokens.remove(token);
        }
        Some(peer)
    }

    pub fn get(&self, id: &str) -> Option<Arc<PeerInfo>> {
        self.peers.get(id).map(|p| p.clone())
    }

    /// The peer presenting `token`.
    pub fn by_token(&self, token: &str) -> Option<Arc<PeerInfo>> {
        let id = self.tokens.get(token).map(|id| id.clone())?;
        self.get(&id)
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.peers.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
