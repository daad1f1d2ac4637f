//! The adapter trait and the registry the gate's broker dispatches through.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use warden_core::ToolArgs;

use crate::output::ToolOutput;

/// A side-effecting tool the agent may propose.
///
/// `call` never panics across the boundary and never returns an error:
/// every failure is a [`ToolOutput`] with `success == false`.
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    /// Tool name as proposed by the agent.
    fn name(&self) -> &'static str;

    /// Description offered to the engine.
    fn description(&self) -> &'static str;

    /// JSON schema of the accepted arguments.
    fn input_schema(&self) -> Value;

    /// Run the tool.
    async fn call(&self, args: &ToolArgs) -> ToolOutput;
}

/// Name, description and schema of one adapter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Argument schema.
    pub input_schema: Value,
}

/// Adapters by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn ToolAdapter>>,
}

impl ToolRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any with the same name.
    pub fn register(&mut self, tool: Arc<dyn ToolAdapter>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, tool: Arc<dyn ToolAdapter>) -> Self {
        self.register(tool);
        self
    }

    /// Look up an adapter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolAdapter>> {
        self.tools.get(name).cloned()
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    /// Definitions for every registered adapter.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl ToolAdapter for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Echo arguments"
        }

        fn input_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }

        async fn call(&self, args: &ToolArgs) -> ToolOutput {
            ToolOutput::success(args.clone())
        }
    }

    #[tokio::test]
    async fn test_registry_lookup() {
        let registry = ToolRegistry::new().with(Arc::new(Echo));
        assert!(registry.contains("echo"));
        assert!(registry.get("nmap_tool").is_none());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["echo"]);
        assert_eq!(registry.definitions()[0].description, "Echo arguments");

        let mut args = ToolArgs::new();
        args.insert("k".into(), "v".into());
        let out = registry.get("echo").unwrap().call(&args).await;
        assert_eq!(out.fields["k"], "v");
    }
}
