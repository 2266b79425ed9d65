//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give an agent the ability to act: evaluate an expression,
//! search the web, or delegate to another agent. Sub-agents implement this
//! same trait, so the engine never needs to know which kind it is calling.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use crate::context::RunContext;
use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as raw JSON text
    pub arguments: String,
}

/// Description of a single tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// JSON type name ("string", "number", "object", ...)
    #[serde(rename = "type")]
    pub kind: String,

    /// What the parameter means
    pub description: String,

    /// Whether the tool requires it
    #[serde(default)]
    pub required: bool,

    /// Allowed values, if restricted
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
}

impl ParameterSpec {
    /// A required parameter.
    pub fn required(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
            required: true,
            allowed: None,
        }
    }

    /// An optional parameter.
    pub fn optional(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(kind, description)
        }
    }
}

/// The core Tool trait.
///
/// Tools are registered in a [`ToolRegistry`] and made available to the
/// tool-calling loop and the plan executor.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool. Used for deduplication and lookup.
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// The tool's parameters, keyed by name.
    fn parameters(&self) -> BTreeMap<String, ParameterSpec>;

    /// Execute the tool with JSON-encoded arguments.
    ///
    /// The context carries the run's usage tracker, stream forwarder and
    /// delegation chain; most tools ignore it.
    async fn execute(&self, ctx: &RunContext, arguments: &str) -> std::result::Result<String, ToolError>;

    /// JSON Schema built from [`Tool::parameters`].
    fn parameters_schema(&self) -> serde_json::Value {
        let params = self.parameters();
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for (name, spec) in &params {
            let mut prop = serde_json::json!({
                "type": spec.kind,
                "description": spec.description,
            });
            if let Some(allowed) = &spec.allowed {
                prop["enum"] = serde_json::json!(allowed);
            }
            properties.insert(name.clone(), prop);
            if spec.required {
                required.push(serde_json::Value::String(name.clone()));
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// An ordered, name-deduplicated collection of tools.
///
/// Registration keeps the first tool seen for a given name; later
/// duplicates are ignored.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Build a registry from a list, keeping the first occurrence of each name.
    pub fn from_tools(tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    /// Register a tool. Returns `false` if the name was already taken.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> bool {
        if self.contains(tool.name()) {
            debug!(tool = tool.name(), "Duplicate tool ignored");
            return false;
        }
        self.tools.push(tool);
        true
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// Whether a tool with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name() == name)
    }

    /// Get all tool definitions (for sending to the LLM), in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// Iterate over the tools in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.iter()
    }

    /// Execute a tool call.
    pub async fn execute(&self, ctx: &RunContext, call: &ToolCall) -> std::result::Result<String, ToolError> {
        let tool = self.get(&call.name).ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        tool.execute(ctx, &call.arguments).await
    }

    /// List all registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool {
        name: &'static str,
        prefix: &'static str,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { self.name }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters(&self) -> BTreeMap<String, ParameterSpec> {
            BTreeMap::from([
                ("text".to_string(), ParameterSpec::required("string", "Text to echo")),
                ("loud".to_string(), ParameterSpec::optional("boolean", "Uppercase output")),
            ])
        }
        async fn execute(&self, _ctx: &RunContext, arguments: &str) -> std::result::Result<String, ToolError> {
            Ok(format!("{}{}", self.prefix, arguments))
        }
    }

    fn echo(name: &'static str, prefix: &'static str) -> Arc<dyn Tool> {
        Arc::new(EchoTool { name, prefix })
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        assert!(registry.register(echo("echo", "")));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[tokio::test]
    async fn first_registration_wins() {
        let registry = ToolRegistry::from_tools([echo("echo", "first:"), echo("echo", "second:"), echo("other", "")]);
        assert_eq!(registry.names(), vec!["echo", "other"]);

        let ctx = RunContext::new();
        let call = ToolCall { id: "c1".into(), name: "echo".into(), arguments: "hi".into() };
        assert_eq!(registry.execute(&ctx, &call).await.unwrap(), "first:hi");
    }

    #[test]
    fn schema_marks_required_parameters() {
        let registry = ToolRegistry::from_tools([echo("echo", "")]);
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        let schema = &defs[0].parameters;
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["text"]["type"], "string");
        assert_eq!(schema["required"], serde_json::json!(["text"]));
    }

    #[tokio::test]
    async fn registry_execute_missing_tool() {
        let registry = ToolRegistry::new();
        let call = ToolCall {
            id: "call_1".into(),
            name: "nonexistent".into(),
            arguments: "{}".into(),
        };
        let err = registry.execute(&RunContext::new(), &call).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }
}
