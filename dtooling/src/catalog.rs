//! Tool set discovered once per session.

use std::collections::HashSet;
use std::sync::Arc;

use dbackend::ToolDescriptor;

use crate::{ToolError, ToolProvider};

/// Immutable, discovery-ordered tool descriptors.
///
/// Built once before the first backend invocation and shared via `Arc`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
}

impl ToolCatalog {
    /// Rejects blank and duplicate names.
    pub fn new(tools: Vec<ToolDescriptor>) -> Result<Self, ToolError> {
        let mut seen = HashSet::new();
        for tool in &tools {
            if tool.name.trim().is_empty() {
                return Err(ToolError::schema("tool definition has a blank name"));
            }

            if !seen.insert(tool.name.as_str()) {
                return Err(ToolError::schema(format!(
                    "tool '{}' is defined more than once",
                    tool.name
                ))
                .with_tool_name(tool.name.clone()));
            }
        }

        Ok(Self { tools })
    }

    pub async fn discover(provider: &dyn ToolProvider) -> Result<Arc<Self>, ToolError> {
        let tools = provider.discover().await?;
        Self::new(tools).map(Arc::new)
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|tool| tool.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
