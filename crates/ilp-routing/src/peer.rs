use ilp_core::Relation;

use crate::prefix_map::PrefixMap;
use crate::route::IncomingRoute;

/// A directly connected peer and the routes it has announced to us.
#[derive(Debug, Clone)]
pub struct Peer {
    id: String,
    relation: Relation,
    relation_weight: u32,
    routes: PrefixMap<IncomingRoute>,
}

impl Peer {
    pub fn new(id: impl Into<String>, relation: Relation) -> Self {
        Self {
            id: id.into(),
            relation,
            relation_weight: relation.default_weight(),
            routes: PrefixMap::new(),
        }
    }

    pub fn with_relation_weight(mut self, weight: u32) -> Self {
        self.relation_weight = weight;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }

    pub fn relation_weight(&self) -> u32 {
        self.relation_weight
    }

    pub fn insert_route(&mut self, route: IncomingRoute) -> Option<IncomingRoute> {
        let prefix = route.prefix.clone();
        self.routes.insert(prefix, route)
    }

    pub fn delete_route(&mut self, prefix: &str) -> Option<IncomingRoute> {
        self.routes.delete(prefix)
    }

    pub fn get_prefix(&self, prefix: &str) -> Option<&IncomingRoute> {
        self.routes.get(prefix)
    }

    pub fn prefixes(&self) -> &[String] {
        self.routes.keys()
    }
}
