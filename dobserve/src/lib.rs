//! Observability hooks for backend operations, tool dispatch and the chat loop.
//!
//! ```rust
//! use dobserve::{MetricsObservabilityHooks, SafeBackendHooks, TracingObservabilityHooks};
//!
//! let _backend_hooks = SafeBackendHooks::new(TracingObservabilityHooks);
//! let _metrics = MetricsObservabilityHooks;
//! ```

mod metrics_hooks;
mod safe_hooks;
mod tracing_hooks;

pub use metrics_hooks::MetricsObservabilityHooks;
pub use safe_hooks::{SafeBackendHooks, SafeChatHooks, SafeToolHooks};
pub use tracing_hooks::TracingObservabilityHooks;

pub mod prelude {
    pub use crate::{
        MetricsObservabilityHooks, SafeBackendHooks, SafeChatHooks, SafeToolHooks,
        TracingObservabilityHooks,
    };
}

#[cfg(test)]
mod tests;
