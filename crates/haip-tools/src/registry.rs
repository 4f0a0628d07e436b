//! Process-wide tool registry (§4.5, §5 shared-resource policy: written only
//! at startup/registration, read-only on the hot path).

use std::sync::Arc;

use dashmap::DashMap;

use haip_session::{ToolCatalog, ToolSchema};

use crate::handler::ToolHandler;

#[derive(Default, Clone)]
pub struct ToolRegistry {
    handlers: Arc<DashMap<String, Arc<dyn ToolHandler>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handler: Arc<dyn ToolHandler>) {
        let name = handler.schema().name;
        self.handlers.insert(name, handler);
    }

    pub fn handler(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).map(|h| h.clone())
    }
}

impl ToolCatalog for ToolRegistry {
    fn list(&self) -> Vec<ToolSchema> {
        self.handlers.iter().map(|entry| entry.value().schema()).collect()
    }

    fn get(&self, name: &str) -> Option<ToolSchema> {
        self.handlers.get(name).map(|h| h.schema())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ToolContext;
    use crate::error::ToolError;
    use async_trait::async_trait;

    struct Noop;
    #[async_trait]
    impl ToolHandler for Noop {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "noop".to_string(),
                description: "does nothing".to_string(),
                input_schema: serde_json::Value::Null,
            }
        }
        async fn start(&self, _ctx: &ToolContext, _input: serde_json::Value) -> Result<(), ToolError> {
            Ok(())
        }
    }

    #[test]
    fn registered_tool_is_visible_in_list_and_get() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(Noop));
        assert_eq!(registry.list().len(), 1);
        assert!(registry.get("noop").is_some());
        assert!(registry.get("missing").is_none());
    }
}
