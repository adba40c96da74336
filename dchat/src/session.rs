//! The orchestration loop: one session, one conversation, one backend selector.

use std::sync::Arc;
use std::time::Instant;

use dbackend::{BackendId, BackendResponse, BackendSelector, Conversation};
use dcommon::{SessionId, TraceId};
use dtooling::{
    NoopToolRuntimeHooks, ToolCatalog, ToolExecutionContext, ToolProvider, ToolRuntime,
    ToolRuntimeHooks,
};
use futures_timer::Delay;

use crate::{ChatError, ChatLoopHooks, ChatPolicy, LoopState, NoopChatLoopHooks};

pub struct ChatSessionBuilder {
    id: SessionId,
    context: String,
    selector: BackendSelector,
    provider: Arc<dyn ToolProvider>,
    catalog: Option<Arc<ToolCatalog>>,
    policy: ChatPolicy,
    hooks: Arc<dyn ChatLoopHooks>,
    tool_hooks: Arc<dyn ToolRuntimeHooks>,
    trace_id: Option<TraceId>,
}

impl ChatSessionBuilder {
    pub fn id(mut self, id: impl Into<SessionId>) -> Self {
        self.id = id.into();
        self
    }

    /// Text of the leading context turn.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Reuses an already discovered catalog instead of asking the provider again.
    pub fn catalog(mut self, catalog: Arc<ToolCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn policy(mut self, policy: ChatPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn ChatLoopHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn tool_hooks(mut self, tool_hooks: Arc<dyn ToolRuntimeHooks>) -> Self {
        self.tool_hooks = tool_hooks;
        self
    }

    pub fn trace_id(mut self, trace_id: impl Into<TraceId>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Discovers the tool catalog (unless one was supplied) and opens the session.
    pub async fn start(self) -> Result<ChatSession, ChatError> {
        let catalog = match self.catalog {
            Some(catalog) => catalog,
            None => ToolCatalog::discover(self.provider.as_ref()).await?,
        };

        let tools = ToolRuntime::new(self.provider, catalog)
            .with_timeout(self.policy.tool_timeout)
            .with_hooks(self.tool_hooks);

        Ok(ChatSession {
            id: self.id,
            conversation: Conversation::new(self.context),
            selector: self.selector,
            tools,
            policy: self.policy,
            hooks: self.hooks,
            trace_id: self.trace_id,
            state: LoopState::AwaitingUserInput,
            last_backend: None,
        })
    }
}

/// A single conversation driven through model turns and tool dispatch.
///
/// A model turn is appended only once complete: its commentary and every tool
/// call with its result land together after the batch has run, so dropping a
/// `run_turn` future never leaves half a pair behind.
pub struct ChatSession {
    id: SessionId,
    conversation: Conversation,
    selector: BackendSelector,
    tools: ToolRuntime,
    policy: ChatPolicy,
    hooks: Arc<dyn ChatLoopHooks>,
    trace_id: Option<TraceId>,
    state: LoopState,
    last_backend: Option<BackendId>,
}

impl ChatSession {
    pub fn builder(selector: BackendSelector, provider: Arc<dyn ToolProvider>) -> ChatSessionBuilder {
        ChatSessionBuilder {
            id: SessionId::new("session"),
            context: String::new(),
            selector,
            provider,
            catalog: None,
            policy: ChatPolicy::default(),
            hooks: Arc::new(NoopChatLoopHooks),
            tool_hooks: Arc::new(NoopToolRuntimeHooks),
            trace_id: None,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn policy(&self) -> &ChatPolicy {
        &self.policy
    }

    pub fn catalog(&self) -> &Arc<ToolCatalog> {
        self.tools.catalog()
    }

    pub fn active_backend(&self) -> BackendId {
        self.selector.active().id()
    }

    /// Backend that produced the most recent reply.
    pub fn last_backend(&self) -> Option<BackendId> {
        self.last_backend
    }

    /// True when the latest user turn has no final answer yet.
    pub fn has_pending_turn(&self) -> bool {
        self.conversation.pending_user_turn()
    }

    pub async fn run_turn(&mut self, user_text: &str) -> Result<String, ChatError> {
        if user_text.trim().is_empty() {
            return Err(ChatError::invalid_request("user input must not be empty"));
        }

        self.conversation.push_user(user_text);
        self.selector.begin_turn();
        self.drive_turn().await
    }

    /// Runs the pending user turn again without appending a new one.
    pub async fn retry_turn(&mut self) -> Result<String, ChatError> {
        if !self.conversation.pending_user_turn() {
            return Err(ChatError::invalid_request("there is no pending user turn to retry"));
        }

        self.selector.begin_turn();
        self.drive_turn().await
    }

    async fn drive_turn(&mut self) -> Result<String, ChatError> {
        let started = Instant::now();
        let mut model_turns = 0_u32;
        let mut pinned = false;

        loop {
            model_turns += 1;
            self.state = LoopState::ModelTurn;
            self.hooks
                .on_model_turn_start(&self.id, model_turns, self.selector.active().id());

            let turn_started = Instant::now();
            let invoked = self
                .selector
                .invoke(
                    &self.conversation,
                    self.tools.catalog().descriptors(),
                    !pinned,
                    Delay::new,
                )
                .await;

            let reply = match invoked {
                Ok(reply) => reply,
                Err(exhausted) => {
                    self.state = LoopState::Failed;
                    return Err(self.fail(model_turns, ChatError::from(exhausted), started));
                }
            };

            self.hooks
                .on_model_turn_finish(&self.id, model_turns, &reply, turn_started.elapsed());
            self.last_backend = Some(reply.backend);

            let (calls, commentary) = match reply.response {
                BackendResponse::FinalAnswer(text) => {
                    self.conversation.push_assistant(text.clone());
                    self.state = LoopState::Answered;
                    self.hooks
                        .on_turn_complete(&self.id, model_turns, &text, started.elapsed());
                    return Ok(text);
                }
                BackendResponse::ToolCalls { calls, commentary } => (calls, commentary),
            };

            // The backend that asked for tools sees their results.
            pinned = true;

            if model_turns >= self.policy.max_model_turns {
                if let Some(commentary) = commentary {
                    self.conversation.push_commentary(commentary);
                }
                self.state = LoopState::Exhausted;
                let partial = self
                    .conversation
                    .assistant_text_since_user()
                    .map(ToString::to_string);
                let error = ChatError::max_turns_exceeded(self.policy.max_model_turns, partial)
                    .with_dropped_tool_calls(calls.len());
                return Err(self.fail(model_turns, error, started));
            }

            self.state = LoopState::ToolDispatch;
            let mut context = ToolExecutionContext::new(self.id.clone())
                .with_model_turn(model_turns)
                .with_metadata("backend", reply.backend.to_string());
            if let Some(trace_id) = &self.trace_id {
                context = context.with_trace_id(trace_id.clone());
            }

            let mut exchanges = Vec::with_capacity(calls.len());
            for call in calls {
                let result = self.tools.dispatch(&call, &context).await;
                self.hooks
                    .on_tool_dispatch(&self.id, model_turns, &call, &result);
                exchanges.push((call, result));
            }

            // Nothing from this model turn is recorded until the whole batch has run.
            if let Some(commentary) = commentary {
                self.conversation.push_commentary(commentary);
            }
            for (call, result) in exchanges {
                if let Err(error) = self.conversation.record_tool_exchange(call, result) {
                    self.state = LoopState::Failed;
                    return Err(self.fail(model_turns, error.into(), started));
                }
            }
        }
    }

    fn fail(&self, model_turns: u32, error: ChatError, started: Instant) -> ChatError {
        self.hooks
            .on_turn_failed(&self.id, model_turns, &error, started.elapsed());
        error
    }
}
