//! Active-backend selection with rate-limit backoff and ordered fallback.
//!
//! The selector owns an ordered list of [`BackendHandle`]s. Rate-limited calls
//! are retried on the same handle under the [`RetryPolicy`]; any other failure,
//! or running out of retries, advances to the next handle, wrapping around so
//! each handle is tried once per model turn. When none remain the caller
//! receives [`BackendsExhausted`] listing every failure.
//!
//! ```rust
//! use dbackend::{FallbackScope, RetryPolicy};
//!
//! let policy = RetryPolicy::new(2);
//! assert_eq!(policy.max_attempts, 2);
//! assert_eq!(FallbackScope::default(), FallbackScope::Turn);
//! ```

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    BackendError, BackendHandle, BackendId, BackendOperationHooks, BackendReply, Conversation,
    NoopOperationHooks, RetryPolicy, ToolDescriptor, execute_with_retry,
};

/// How long a fallback stays in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackScope {
    /// Every user turn starts again from the preferred backend.
    #[default]
    Turn,
    /// Once switched, the session keeps the fallback backend.
    Session,
}

impl FallbackScope {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "turn" => Some(Self::Turn),
            "session" | "sticky" => Some(Self::Session),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorDecision {
    SwitchTo(BackendId),
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendFailure {
    pub backend: BackendId,
    pub error: BackendError,
}

/// Every backend that was tried for one model turn failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendsExhausted {
    pub failures: Vec<BackendFailure>,
}

impl Display for BackendsExhausted {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("all backends failed")?;
        for (index, failure) in self.failures.iter().enumerate() {
            let separator = if index == 0 { ": " } else { "; " };
            write!(f, "{separator}{} ({})", failure.backend, failure.error)?;
        }

        Ok(())
    }
}

impl Error for BackendsExhausted {}

pub struct BackendSelector {
    handles: Vec<BackendHandle>,
    active: usize,
    policy: RetryPolicy,
    scope: FallbackScope,
    hooks: Arc<dyn BackendOperationHooks>,
}

impl BackendSelector {
    pub fn new(handles: Vec<BackendHandle>) -> Result<Self, BackendError> {
        if handles.is_empty() {
            return Err(BackendError::unavailable("no backend is configured"));
        }

        Ok(Self {
            handles,
            active: 0,
            policy: RetryPolicy::default(),
            scope: FallbackScope::default(),
            hooks: Arc::new(NoopOperationHooks),
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_scope(mut self, scope: FallbackScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn BackendOperationHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Moves `id` to the front of the fallback order, if configured.
    pub fn prefer(mut self, id: BackendId) -> Self {
        if let Some(position) = self.handles.iter().position(|handle| handle.id() == id) {
            let handle = self.handles.remove(position);
            self.handles.insert(0, handle);
            self.active = 0;
        }
        self
    }

    pub fn active(&self) -> &BackendHandle {
        &self.handles[self.active]
    }

    pub fn order(&self) -> Vec<BackendId> {
        self.handles.iter().map(BackendHandle::id).collect()
    }

    pub fn scope(&self) -> FallbackScope {
        self.scope
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Called between user turns.
    pub fn begin_turn(&mut self) {
        if self.scope == FallbackScope::Turn {
            self.active = 0;
        }
    }

    /// Reacts to a failure of the active handle once its retries are spent.
    ///
    /// `tried` counts the handles that have failed in the current invocation,
    /// the active one included. The order wraps around, so a session-scoped
    /// fallback can still return to earlier handles before giving up.
    pub fn on_error(&mut self, error: &BackendError, tried: usize) -> SelectorDecision {
        if tried >= self.handles.len() {
            self.active = 0;
            return SelectorDecision::Exhausted;
        }

        let from = self.active().id();
        self.active = (self.active + 1) % self.handles.len();
        let to = self.active().id();
        self.hooks.on_fallback(from, to, error);
        SelectorDecision::SwitchTo(to)
    }

    /// Runs one model turn against the active handle.
    ///
    /// With `allow_fallback` unset only the active handle is tried, which
    /// keeps a turn that already dispatched tools on the backend that asked
    /// for them.
    pub async fn invoke<Sleep, SleepFuture>(
        &mut self,
        conversation: &Conversation,
        tools: &[ToolDescriptor],
        allow_fallback: bool,
        mut sleep: Sleep,
    ) -> Result<BackendReply, BackendsExhausted>
    where
        Sleep: FnMut(Duration) -> SleepFuture,
        SleepFuture: Future<Output = ()>,
    {
        let mut failures = Vec::new();

        loop {
            let handle = self.active().clone();
            let handle_ref = &handle;
            let result = execute_with_retry(
                handle.id(),
                "invoke",
                &self.policy,
                self.hooks.as_ref(),
                move |_| handle_ref.invoke(conversation, tools),
                &mut sleep,
            )
            .await;

            let error = match result {
                Ok(reply) => return Ok(reply),
                Err(error) => error,
            };

            failures.push(BackendFailure {
                backend: handle.id(),
                error: error.clone(),
            });

            if !allow_fallback {
                return Err(BackendsExhausted { failures });
            }

            if self.on_error(&error, failures.len()) == SelectorDecision::Exhausted {
                return Err(BackendsExhausted { failures });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        Backend, BackendErrorKind, BackendFuture, BackendProfile, BackendRequest, BackendResponse,
        TokenUsage,
    };

    struct ScriptedBackend {
        id: BackendId,
        script: Mutex<Vec<Result<(), BackendError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedBackend {
        fn new(id: BackendId, script: Vec<Result<(), BackendError>>) -> Arc<Self> {
            Arc::new(Self {
                id,
                script: Mutex::new(script),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().expect("calls lock")
        }
    }

    impl Backend for ScriptedBackend {
        fn id(&self) -> BackendId {
            self.id
        }

        fn invoke<'a>(
            &'a self,
            request: BackendRequest<'a>,
        ) -> BackendFuture<'a, Result<BackendReply, BackendError>> {
            Box::pin(async move {
                *self.calls.lock().expect("calls lock") += 1;
                let next = {
                    let mut script = self.script.lock().expect("script lock");
                    if script.is_empty() {
                        Ok(())
                    } else {
                        script.remove(0)
                    }
                };

                next.map(|_| BackendReply {
                    backend: self.id,
                    model: request.model.to_string(),
                    response: BackendResponse::final_answer(format!("from {}", self.id)),
                    usage: TokenUsage::default(),
                })
            })
        }
    }

    fn handle(backend: Arc<ScriptedBackend>) -> BackendHandle {
        BackendHandle::new(BackendProfile::new(backend.id, "model"), backend)
    }

    fn always(error: BackendError) -> Vec<Result<(), BackendError>> {
        vec![Err(error); 16]
    }

    async fn no_sleep(_delay: Duration) {}

    #[test]
    fn empty_selector_is_rejected() {
        let error = BackendSelector::new(Vec::new())
            .err()
            .expect("empty selector must fail");
        assert_eq!(error.kind, BackendErrorKind::Unavailable);
    }

    #[test]
    fn prefer_moves_requested_backend_first() {
        let a = ScriptedBackend::new(BackendId::CloudflareWorkersAi, Vec::new());
        let b = ScriptedBackend::new(BackendId::Ollama, Vec::new());
        let selector = BackendSelector::new(vec![handle(a), handle(b)])
            .expect("selector")
            .prefer(BackendId::Ollama);

        assert_eq!(
            selector.order(),
            vec![BackendId::Ollama, BackendId::CloudflareWorkersAi]
        );
        assert_eq!(selector.active().id(), BackendId::Ollama);
    }

    #[test]
    fn on_error_walks_the_order_then_reports_exhaustion() {
        let a = ScriptedBackend::new(BackendId::CloudflareWorkersAi, Vec::new());
        let b = ScriptedBackend::new(BackendId::Ollama, Vec::new());
        let mut selector = BackendSelector::new(vec![handle(a), handle(b)]).expect("selector");
        let error = BackendError::unavailable("down");

        assert_eq!(
            selector.on_error(&error, 1),
            SelectorDecision::SwitchTo(BackendId::Ollama)
        );
        assert_eq!(selector.on_error(&error, 2), SelectorDecision::Exhausted);
        assert_eq!(selector.active().id(), BackendId::CloudflareWorkersAi);
    }

    #[test]
    fn on_error_wraps_around_to_earlier_handles() {
        let a = ScriptedBackend::new(BackendId::CloudflareWorkersAi, Vec::new());
        let b = ScriptedBackend::new(BackendId::Ollama, Vec::new());
        let mut selector = BackendSelector::new(vec![handle(a), handle(b)]).expect("selector");
        let error = BackendError::unavailable("down");

        selector.on_error(&error, 1);
        assert_eq!(selector.active().id(), BackendId::Ollama);

        // A later invocation that starts on the fallback may still go back.
        assert_eq!(
            selector.on_error(&error, 1),
            SelectorDecision::SwitchTo(BackendId::CloudflareWorkersAi)
        );
    }

    #[tokio::test]
    async fn unavailable_primary_falls_back_after_one_attempt() {
        let a = ScriptedBackend::new(
            BackendId::CloudflareWorkersAi,
            always(BackendError::unavailable("account suspended")),
        );
        let b = ScriptedBackend::new(BackendId::Ollama, Vec::new());
        let mut selector =
            BackendSelector::new(vec![handle(a.clone()), handle(b.clone())]).expect("selector");
        let conversation = Conversation::new("");

        for round in 1..=3 {
            selector.begin_turn();
            let reply = selector
                .invoke(&conversation, &[], true, no_sleep)
                .await
                .expect("fallback should answer");
            assert_eq!(reply.backend, BackendId::Ollama);
            assert_eq!(a.calls(), round);
            assert_eq!(b.calls(), round);
        }
    }

    #[tokio::test]
    async fn session_scope_keeps_the_fallback_backend() {
        let a = ScriptedBackend::new(
            BackendId::CloudflareWorkersAi,
            always(BackendError::protocol("bad envelope")),
        );
        let b = ScriptedBackend::new(BackendId::Ollama, Vec::new());
        let mut selector = BackendSelector::new(vec![handle(a.clone()), handle(b.clone())])
            .expect("selector")
            .with_scope(FallbackScope::Session);
        let conversation = Conversation::new("");

        for _ in 0..3 {
            selector.begin_turn();
            selector
                .invoke(&conversation, &[], true, no_sleep)
                .await
                .expect("fallback should answer");
        }

        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 3);
    }

    #[tokio::test]
    async fn session_scope_returns_to_a_recovered_primary() {
        let a = ScriptedBackend::new(
            BackendId::CloudflareWorkersAi,
            vec![Err(BackendError::unavailable("cold start"))],
        );
        let mut b_script = vec![Ok(())];
        b_script.extend(always(BackendError::unavailable("ollama stopped")));
        let b = ScriptedBackend::new(BackendId::Ollama, b_script);
        let mut selector = BackendSelector::new(vec![handle(a.clone()), handle(b.clone())])
            .expect("selector")
            .with_scope(FallbackScope::Session);
        let conversation = Conversation::new("");

        selector.begin_turn();
        let first = selector
            .invoke(&conversation, &[], true, no_sleep)
            .await
            .expect("fallback should answer");
        assert_eq!(first.backend, BackendId::Ollama);

        selector.begin_turn();
        let second = selector
            .invoke(&conversation, &[], true, no_sleep)
            .await
            .expect("recovered primary should answer");
        assert_eq!(second.backend, BackendId::CloudflareWorkersAi);
        assert_eq!(a.calls(), 2);
        assert_eq!(b.calls(), 2);
        assert_eq!(selector.active().id(), BackendId::CloudflareWorkersAi);
    }

    #[tokio::test]
    async fn session_scope_exhaustion_lists_every_backend() {
        let a = ScriptedBackend::new(
            BackendId::CloudflareWorkersAi,
            always(BackendError::unavailable("down")),
        );
        let mut b_script = vec![Ok(())];
        b_script.extend(always(BackendError::unavailable("ollama stopped")));
        let b = ScriptedBackend::new(BackendId::Ollama, b_script);
        let mut selector = BackendSelector::new(vec![handle(a), handle(b)])
            .expect("selector")
            .with_scope(FallbackScope::Session);
        let conversation = Conversation::new("");

        selector
            .invoke(&conversation, &[], true, no_sleep)
            .await
            .expect("fallback should answer");
        let exhausted = selector
            .invoke(&conversation, &[], true, no_sleep)
            .await
            .expect_err("both backends fail");

        let failed = exhausted
            .failures
            .iter()
            .map(|failure| failure.backend)
            .collect::<Vec<_>>();
        assert_eq!(failed, vec![BackendId::Ollama, BackendId::CloudflareWorkersAi]);
    }

    #[tokio::test]
    async fn exhaustion_requires_every_backend_to_fail() {
        let a = ScriptedBackend::new(
            BackendId::CloudflareWorkersAi,
            always(BackendError::unavailable("down")),
        );
        let b = ScriptedBackend::new(
            BackendId::Ollama,
            always(BackendError::unavailable("not installed")),
        );
        let mut selector = BackendSelector::new(vec![handle(a), handle(b)]).expect("selector");

        let exhausted = selector
            .invoke(&Conversation::new(""), &[], true, no_sleep)
            .await
            .expect_err("both backends fail");

        let failed = exhausted
            .failures
            .iter()
            .map(|failure| failure.backend)
            .collect::<Vec<_>>();
        assert_eq!(failed, vec![BackendId::CloudflareWorkersAi, BackendId::Ollama]);
        assert!(exhausted.to_string().contains("not installed"));
    }

    #[tokio::test]
    async fn rate_limits_retry_same_backend_before_falling_back() {
        let a = ScriptedBackend::new(
            BackendId::CloudflareWorkersAi,
            always(BackendError::rate_limited("429")),
        );
        let b = ScriptedBackend::new(BackendId::Ollama, Vec::new());
        let mut selector = BackendSelector::new(vec![handle(a.clone()), handle(b.clone())])
            .expect("selector")
            .with_retry_policy(RetryPolicy::new(3));
        let slept = Arc::new(Mutex::new(Vec::new()));

        let reply = selector
            .invoke(&Conversation::new(""), &[], true, {
                let slept = Arc::clone(&slept);
                move |delay| {
                    slept.lock().expect("sleep lock").push(delay);
                    async {}
                }
            })
            .await
            .expect("fallback should answer");

        assert_eq!(reply.backend, BackendId::Ollama);
        assert_eq!(a.calls(), 3);
        assert_eq!(slept.lock().expect("sleep lock").len(), 2);
    }

    #[tokio::test]
    async fn rate_limit_recovery_stays_on_primary() {
        let a = ScriptedBackend::new(
            BackendId::CloudflareWorkersAi,
            vec![Err(BackendError::rate_limited("429"))],
        );
        let b = ScriptedBackend::new(BackendId::Ollama, Vec::new());
        let mut selector =
            BackendSelector::new(vec![handle(a.clone()), handle(b.clone())]).expect("selector");

        let reply = selector
            .invoke(&Conversation::new(""), &[], true, no_sleep)
            .await
            .expect("retry should answer");

        assert_eq!(reply.backend, BackendId::CloudflareWorkersAi);
        assert_eq!(a.calls(), 2);
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn pinned_invocation_never_falls_back() {
        let a = ScriptedBackend::new(
            BackendId::CloudflareWorkersAi,
            always(BackendError::unavailable("down")),
        );
        let b = ScriptedBackend::new(BackendId::Ollama, Vec::new());
        let mut selector =
            BackendSelector::new(vec![handle(a), handle(b.clone())]).expect("selector");

        let exhausted = selector
            .invoke(&Conversation::new(""), &[], false, no_sleep)
            .await
            .expect_err("pinned call must not switch");

        assert_eq!(exhausted.failures.len(), 1);
        assert_eq!(b.calls(), 0);
        assert_eq!(selector.active().id(), BackendId::CloudflareWorkersAi);
    }
}
