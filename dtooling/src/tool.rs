//! In-process tool contract and closure-backed implementation.
//!
//! ```rust
//! use dbackend::{ToolDescriptor, ToolPayload, ToolSchema};
//! use dtooling::{FunctionTool, Tool};
//!
//! let tool = FunctionTool::new(
//!     ToolDescriptor::new("echo", "Echoes its arguments", ToolSchema::default()),
//!     |args, _ctx| async move { Ok(ToolPayload::Structured(args.into())) },
//! );
//!
//! assert_eq!(tool.descriptor().name, "echo");
//! ```

use std::future::Future;
use std::sync::Arc;

use dbackend::{ToolDescriptor, ToolPayload};
use dcommon::BoxFuture;
use serde_json::{Map, Value};

use crate::{ToolError, ToolExecutionContext};

pub type ToolFuture<'a, T> = BoxFuture<'a, T>;

pub trait Tool: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;

    fn invoke<'a>(
        &'a self,
        arguments: &'a Map<String, Value>,
        context: &'a ToolExecutionContext,
    ) -> ToolFuture<'a, Result<ToolPayload, ToolError>>;
}

type ToolHandler = dyn Fn(Map<String, Value>, ToolExecutionContext) -> ToolFuture<'static, Result<ToolPayload, ToolError>>
    + Send
    + Sync;

pub struct FunctionTool {
    descriptor: ToolDescriptor,
    handler: Arc<ToolHandler>,
}

impl FunctionTool {
    pub fn new<F, Fut>(descriptor: ToolDescriptor, handler: F) -> Self
    where
        F: Fn(Map<String, Value>, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolPayload, ToolError>> + Send + 'static,
    {
        let handler: Arc<ToolHandler> =
            Arc::new(move |arguments, context| Box::pin(handler(arguments, context)));

        Self {
            descriptor,
            handler,
        }
    }
}

impl Tool for FunctionTool {
    fn descriptor(&self) -> ToolDescriptor {
        self.descriptor.clone()
    }

    fn invoke<'a>(
        &'a self,
        arguments: &'a Map<String, Value>,
        context: &'a ToolExecutionContext,
    ) -> ToolFuture<'a, Result<ToolPayload, ToolError>> {
        (self.handler)(arguments.clone(), context.clone())
    }
}
