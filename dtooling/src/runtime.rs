//! Catalog-checked tool dispatch with a per-call deadline.
//!
//! `ToolRuntime::dispatch` never fails: every problem becomes a failed
//! `ToolResult` the model can read and react to.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dbackend::{ToolCall, ToolPayload, ToolResult};
use futures_timer::Delay;
use futures_util::future::{Either, select};

use crate::{
    NoopToolRuntimeHooks, ToolCatalog, ToolError, ToolExecutionContext, ToolProvider,
    ToolRuntimeHooks,
};

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct ToolRuntime {
    provider: Arc<dyn ToolProvider>,
    catalog: Arc<ToolCatalog>,
    timeout: Duration,
    hooks: Arc<dyn ToolRuntimeHooks>,
}

impl ToolRuntime {
    pub fn new(provider: Arc<dyn ToolProvider>, catalog: Arc<ToolCatalog>) -> Self {
        Self {
            provider,
            catalog,
            timeout: DEFAULT_TOOL_TIMEOUT,
            hooks: Arc::new(NoopToolRuntimeHooks),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ToolRuntimeHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn catalog(&self) -> &Arc<ToolCatalog> {
        &self.catalog
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Checks the call against the catalog: known tool, required arguments
    /// present, declared argument types respected.
    pub fn check_call(&self, call: &ToolCall) -> Result<(), ToolError> {
        let descriptor = self.catalog.get(&call.name).ok_or_else(|| {
            ToolError::not_found(format!("tool '{}' is not in the catalog", call.name))
        })?;

        for name in descriptor.schema.required() {
            if call.arguments.get(name).is_none_or(|value| value.is_null()) {
                return Err(ToolError::invalid_arguments(format!(
                    "missing required argument '{name}'"
                )));
            }
        }

        for (name, value) in &call.arguments {
            let Some(spec) = descriptor.schema.argument(name) else {
                continue;
            };

            if value.is_null() && !spec.required {
                continue;
            }

            if !spec.kind.matches(value) {
                return Err(ToolError::invalid_arguments(format!(
                    "argument '{name}' must be {}",
                    kind_label(spec.kind)
                )));
            }
        }

        Ok(())
    }

    /// Checked dispatch raced against the runtime timeout.
    pub async fn try_dispatch(
        &self,
        call: &ToolCall,
        context: &ToolExecutionContext,
    ) -> Result<ToolPayload, ToolError> {
        self.check_call(call)?;

        let work = self.provider.dispatch(call, context);
        match select(work, Delay::new(self.timeout)).await {
            Either::Left((result, _)) => result,
            Either::Right(((), _)) => Err(ToolError::timeout(format!(
                "no result within {}s",
                self.timeout.as_secs_f64()
            ))),
        }
    }

    pub async fn dispatch(&self, call: &ToolCall, context: &ToolExecutionContext) -> ToolResult {
        self.hooks.on_dispatch_start(call, context);
        let started = Instant::now();

        match self.try_dispatch(call, context).await {
            Ok(payload) => {
                self.hooks
                    .on_dispatch_success(call, context, &payload, started.elapsed());
                ToolResult::success(call.id.clone(), payload)
            }
            Err(error) => {
                let error = error
                    .with_tool_name(call.name.clone())
                    .with_tool_call_id(call.id.clone());
                self.hooks
                    .on_dispatch_failure(call, context, &error, started.elapsed());
                ToolResult::failure(call.id.clone(), error.message)
            }
        }
    }
}

fn kind_label(kind: dbackend::ArgumentKind) -> &'static str {
    use dbackend::ArgumentKind;

    match kind {
        ArgumentKind::String => "a string",
        ArgumentKind::Number => "a number",
        ArgumentKind::Integer => "an integer",
        ArgumentKind::Boolean => "a boolean",
        ArgumentKind::Object => "an object",
        ArgumentKind::Array => "an array",
        ArgumentKind::Any => "any value",
    }
}
