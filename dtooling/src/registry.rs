//! In-process tool registry keyed by tool name.

use std::future::Future;
use std::sync::Arc;

use dbackend::{ToolCall, ToolDescriptor, ToolPayload};
use dcommon::Registry;
use serde_json::{Map, Value};

use crate::{FunctionTool, Tool, ToolError, ToolExecutionContext, ToolFuture, ToolProvider};

#[derive(Default)]
pub struct ToolRegistry {
    tools: Registry<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        let name = tool.descriptor().name;
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn register_fn<F, Fut>(&mut self, descriptor: ToolDescriptor, handler: F)
    where
        F: Fn(Map<String, Value>, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolPayload, ToolError>> + Send + 'static,
    {
        self.register(FunctionTool::new(descriptor, handler));
    }

    pub fn register_sync_fn<F>(&mut self, descriptor: ToolDescriptor, handler: F)
    where
        F: Fn(Map<String, Value>, ToolExecutionContext) -> Result<ToolPayload, ToolError>
            + Send
            + Sync
            + 'static,
    {
        self.register_fn(descriptor, move |arguments, context| {
            let output = handler(arguments, context);
            async move { output }
        });
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.remove(name)
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|tool| tool.descriptor()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl ToolProvider for ToolRegistry {
    fn discover<'a>(&'a self) -> ToolFuture<'a, Result<Vec<ToolDescriptor>, ToolError>> {
        Box::pin(async move { Ok(self.descriptors()) })
    }

    fn dispatch<'a>(
        &'a self,
        call: &'a ToolCall,
        context: &'a ToolExecutionContext,
    ) -> ToolFuture<'a, Result<ToolPayload, ToolError>> {
        Box::pin(async move {
            let tool = self.get(&call.name).ok_or_else(|| {
                ToolError::not_found(format!("tool '{}' is not registered", call.name))
            })?;

            tool.invoke(&call.arguments, context).await
        })
    }
}
