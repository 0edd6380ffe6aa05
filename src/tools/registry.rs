//! Capability registry.
//!
//! A fixed mapping from capability name to its implementation, built once
//! at startup and read-only afterwards. Registration problems (duplicate
//! names, empty metadata, a schema that is not an object) are fatal.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::llm::ToolDefinition;
use crate::tools::tool::{Tool, ToolSchema};

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Build a registry from a fixed set of tools, validating each entry.
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Result<Self, ConfigError> {
        let mut map: HashMap<String, Arc<dyn Tool>> = HashMap::with_capacity(tools.len());

        for tool in tools {
            let name = tool.name().to_string();
            if name.is_empty() {
                return Err(ConfigError::ToolRegistration(
                    "tool with empty name".to_string(),
                ));
            }
            if tool.description().is_empty() {
                return Err(ConfigError::ToolRegistration(format!(
                    "tool '{}' has no description",
                    name
                )));
            }
            if !tool.parameters_schema().is_object() {
                return Err(ConfigError::ToolRegistration(format!(
                    "tool '{}' parameter schema is not a JSON object",
                    name
                )));
            }
            if map.insert(name.clone(), tool).is_some() {
                return Err(ConfigError::ToolRegistration(format!(
                    "duplicate tool name '{}'",
                    name
                )));
            }
        }

        Ok(Self { tools: map })
    }

    /// Look up one capability.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Schemas of every registered capability.
    pub fn describe_all(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// The tool menu in the shape the LLM provider advertises.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.describe_all()
            .into_iter()
            .map(|s| ToolDefinition {
                name: s.name,
                description: s.description,
                parameters: s.parameters,
            })
            .collect()
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
    use crate::tools::tool::EchoTool;

    #[test]
    fn test_registry_lookup_and_describe() {
        let registry = ToolRegistry::new(vec![Arc::new(EchoTool)]).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());

        let schemas = registry.describe_all();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "echo");
    }

    #[test]
    fn test_duplicate_names_are_fatal() {
        let err = ToolRegistry::new(vec![Arc::new(EchoTool), Arc::new(EchoTool)])
            .err()
            .expect("duplicate registration must fail");
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_definitions_are_sorted() {
        let registry = ToolRegistry::new(vec![Arc::new(EchoTool)]).unwrap();
        let defs = registry.definitions();
        assert_eq!(defs[0].name, "echo");
        assert!(defs[0].parameters.is_object());
    }
}
