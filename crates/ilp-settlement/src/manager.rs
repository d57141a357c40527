use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SettlementError;
use crate::traits::SettlementEngine;

/// Settlement engines known to this connector, keyed by `engine_id()`.
#[derive(Default)]
pub struct SettlementEngineRegistry {
    engines: HashMap<String, Arc<dyn SettlementEngine>>,
}

impl SettlementEngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an engine. An engine with the same id is replaced.
    pub fn register(&mut self, engine: Arc<dyn SettlementEngine>) {
        let id = engine.engine_id().to_string();
        tracing::info!(engine_id = %id, "registering settlement engine");
        self.engines.insert(id, engine);
    }

    pub fn unregister(&mut self, engine_id: &str) -> Option<Arc<dyn SettlementEngine>> {
        self.engines.remove(engine_id)
    }

    pub fn get(&self, engine_id: &str) -> Result<Arc<dyn SettlementEngine>, SettlementError> {
        self.engines
            .get(engine_id)
            .cloned()
            .ok_or_else(|| SettlementError::EngineNotFound(engine_id.to_string()))
    }

    pub fn engine_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.engines.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

impl std::fmt::Debug for SettlementEngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementEngineRegistry")
            .field("engines", &self.engine_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::internal::InMemorySettlementEngine;

    #[test]
    fn test_register_and_list_engines() {
        let mut registry = SettlementEngineRegistry::new();
        registry.register(Arc::new(InMemorySettlementEngine::new("se-a")));
        registry.register(Arc::new(InMemorySettlementEngine::new("se-b")));
        assert_eq!(registry.engine_ids(), vec!["se-a".to_string(), "se-b".to_string()]);
    }

    #[test]
    fn test_unregister_engine() {
        let mut registry = SettlementEngineRegistry::new();
        registry.register(Arc::new(InMemorySettlementEngine::new("se-a")));
        assert_eq!(registry.len(), 1);
        assert!(registry.unregister("se-a").is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_get_engine_not_found() {
        let registry = SettlementEngineRegistry::new();
        assert!(matches!(registry.get("nope"), Err(SettlementError::EngineNotFound(_))));
    }

    #[test]
    fn test_register_replaces_same_id() {
        let mut registry = SettlementEngineRegistry::new();
        registry.register(Arc::new(InMemorySettlementEngine::new("se-a")));
        registry.register(Arc::new(InMemorySettlementEngine::new("se-a").with_response_scale(2)));
        assert_eq!(registry.len(), 1);
    }
}
