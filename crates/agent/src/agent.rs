//! The agent: configuration, request routing and plan actions.
//!
//! Every request goes through the same gate. Input guardrails run first,
//! then the request is dispatched to a remote agent, a plan action, a role
//! answer, plan mode or the tool loop, and the response passes the output
//! guardrails on the way out.

use std::sync::Arc;
use agentflow_config::EngineConfig;
use agentflow_core::context::RunContext;
use agentflow_core::guardrail::{GuardStage, Guardrail};
use agentflow_core::memory::ConversationMemory;
use agentflow_core::message::Message;
use agentflow_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
use agentflow_core::stream::{StreamEvent, StreamForwarder};
use agentflow_core::tool::{Tool, ToolRegistry};
use agentflow_memory::InMemoryConversation;
use agentflow_telemetry::{TokenCounts, UsageSnapshot, UsageTracker};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use crate::commands::{PlanCommand, is_role_question};
use crate::error::{AgentError, PlanError};
use crate::executor;
use crate::plan::{ExecutionPlan, PlanStatus, PlanStore};
use crate::planner;
use crate::remote::RemoteAgent;
use crate::streaming::{self, emit};
use crate::subagent::{self, SubAgentTool};
use crate::tool_loop::ToolLoop;

pub const DEFAULT_MODEL: &str = "default";
pub const DEFAULT_MAX_ITERATIONS: usize = 2;
pub const DEFAULT_STREAM_BUFFER: usize = 100;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Where an agent's requests are served.
pub(crate) enum Backend {
    Local(Arc<dyn Provider>),
    Remote(Arc<dyn RemoteAgent>),
}

pub(crate) struct AgentInner {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) system_prompt: String,
    pub(crate) backend: Backend,
    pub(crate) model: String,
    pub(crate) temperature: f32,
    pub(crate) max_tokens: Option<u32>,
    pub(crate) max_iterations: usize,
    pub(crate) require_plan_approval: bool,
    /// Local tools followed by one tool per sub-agent.
    pub(crate) tools: ToolRegistry,
    pub(crate) sub_agents: Vec<Agent>,
    pub(crate) memory: Arc<dyn ConversationMemory>,
    pub(crate) plans: PlanStore,
    pub(crate) guardrails: Vec<Arc<dyn Guardrail>>,
    pub(crate) response_schema: Option<serde_json::Value>,
    pub(crate) detailed_usage: bool,
    pub(crate) stream_buffer: usize,
}

/// A configured agent. Cheap to clone; clones share memory and plans.
#[derive(Clone)]
pub struct Agent {
    pub(crate) inner: Arc<AgentInner>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.inner.name)
            .field("model", &self.inner.model)
            .field("tools", &self.inner.tools.names())
            .field("remote", &self.is_remote())
            .finish()
    }
}

/// Result of [`Agent::run_detailed`].
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub response: String,
    pub usage: UsageSnapshot,
}

enum Route {
    Command(PlanCommand),
    Role,
    Plan,
    Loop,
}

impl AgentInner {
    pub(crate) fn provider(&self) -> Result<&Arc<dyn Provider>, AgentError> {
        match &self.backend {
            Backend::Local(provider) => Ok(provider),
            Backend::Remote(remote) => Err(AgentError::Config(format!(
                "Agent '{}' is served remotely by {} and has no local provider",
                self.name,
                remote.endpoint()
            ))),
        }
    }

    /// A provider request carrying the system prompt, `history` and `tools`.
    pub(crate) fn request(&self, history: &[Message], tools: Vec<ToolDefinition>) -> ProviderRequest {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if !self.system_prompt.is_empty() {
            messages.push(Message::system(&self.system_prompt));
        }
        messages.extend(history.iter().cloned());
        self.bare_request(messages, tools)
    }

    fn bare_request(&self, messages: Vec<Message>, tools: Vec<ToolDefinition>) -> ProviderRequest {
        let mut request = ProviderRequest::new(&self.model, messages);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        request.tools = tools;
        request.response_format = self.response_schema.clone();
        request
    }

    /// One blocking provider call, abandoned on cancellation.
    pub(crate) async fn complete(
        &self,
        ctx: &RunContext,
        request: ProviderRequest,
    ) -> Result<ProviderResponse, AgentError> {
        let provider = self.provider()?;
        if ctx.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        debug!(
            agent = %self.name,
            provider = provider.name(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Calling provider"
        );
        let response = tokio::select! {
            biased;
            _ = ctx.cancellation().cancelled() => return Err(AgentError::Cancelled),
            response = provider.complete(request) => response?,
        };
        let tokens = response.usage.as_ref().map(TokenCounts::from).unwrap_or_default();
        ctx.usage().record_llm_call(&response.model, tokens);
        Ok(response)
    }

    async fn guard(&self, stage: GuardStage, text: &str) -> Result<(), AgentError> {
        for guardrail in &self.guardrails {
            if let Err(e) = guardrail.check(stage, text).await {
                warn!(agent = %self.name, guardrail = guardrail.name(), %stage, "Guardrail rejected text");
                return Err(e.into());
            }
        }
        Ok(())
    }

    async fn remember(&self, user: &str, assistant: &str) -> Result<(), AgentError> {
        self.memory
            .add_messages(vec![Message::user(user), Message::assistant(assistant)])
            .await?;
        Ok(())
    }

    fn role_prompt(&self) -> String {
        let mut prompt = String::new();
        if !self.system_prompt.is_empty() {
            prompt.push_str(&self.system_prompt);
            prompt.push_str("\n\n");
        }
        prompt.push_str(&format!("You are the agent named '{}'.", self.name));
        if !self.description.is_empty() {
            prompt.push(' ');
            prompt.push_str(&self.description);
        }
        let tools = self.tools.names();
        if !tools.is_empty() {
            prompt.push_str(&format!("\nYou can use these tools: {}.", tools.join(", ")));
        }
        prompt.push_str(
            "\nAnswer the user's question about who you are and what you can do, \
             based only on the instructions above. Do not call any tools.",
        );
        prompt
    }
}

impl Agent {
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn description(&self) -> &str {
        &self.inner.description
    }

    pub fn system_prompt(&self) -> &str {
        &self.inner.system_prompt
    }

    pub fn model(&self) -> &str {
        &self.inner.model
    }

    pub fn max_iterations(&self) -> usize {
        self.inner.max_iterations
    }

    pub fn requires_plan_approval(&self) -> bool {
        self.inner.require_plan_approval
    }

    /// Every tool the model can call, sub-agent tools included.
    pub fn tools(&self) -> &ToolRegistry {
        &self.inner.tools
    }

    pub fn sub_agents(&self) -> &[Agent] {
        &self.inner.sub_agents
    }

    pub fn memory(&self) -> &Arc<dyn ConversationMemory> {
        &self.inner.memory
    }

    pub fn plans(&self) -> &PlanStore {
        &self.inner.plans
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.inner.backend, Backend::Remote(_))
    }

    /// Whether `run_stream` can be used.
    pub fn supports_streaming(&self) -> bool {
        match &self.inner.backend {
            Backend::Local(provider) => provider.supports_streaming(),
            Backend::Remote(remote) => remote.supports_streaming(),
        }
    }

    fn backend_name(&self) -> String {
        match &self.inner.backend {
            Backend::Local(provider) => provider.name().to_string(),
            Backend::Remote(remote) => remote.endpoint().to_string(),
        }
    }

    /// A top-level context with this agent's usage settings.
    pub fn new_context(&self) -> RunContext {
        RunContext::new().with_usage(Arc::new(UsageTracker::with_enabled(self.inner.detailed_usage)))
    }

    // ── Blocking runs ───────────────────────────────────────────────────

    /// Handle one request and return the response text.
    pub async fn run(&self, input: &str) -> Result<String, AgentError> {
        self.run_detailed(input).await.map(|outcome| outcome.response)
    }

    /// Like [`run`](Self::run), also returning the run's usage.
    pub async fn run_detailed(&self, input: &str) -> Result<RunOutcome, AgentError> {
        self.run_detailed_with_cancel(input, CancellationToken::new()).await
    }

    pub async fn run_detailed_with_cancel(
        &self,
        input: &str,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, AgentError> {
        let ctx = self.new_context().with_cancellation(cancel);
        info!(agent = %self.name(), run_id = ctx.usage().run_id(), "Starting run");
        let result = self.run_with_context(&ctx, input).await;
        ctx.usage().finish();
        let response = result?;
        Ok(RunOutcome {
            response,
            usage: ctx.usage().snapshot(),
        })
    }

    /// Handle a request inside an existing run. Nothing is streamed, even
    /// when `ctx` carries a forwarder.
    pub async fn run_with_context(&self, ctx: &RunContext, input: &str) -> Result<String, AgentError> {
        self.handle(ctx, input, None).await
    }

    /// Handle a request, writing events into `forwarder` and finishing with
    /// a `complete` or `error` event. A cancelled run ends without one.
    pub async fn stream_with_context(
        &self,
        ctx: &RunContext,
        forwarder: &StreamForwarder,
        input: &str,
    ) -> Result<String, AgentError> {
        let result = self.handle(ctx, input, Some(forwarder)).await;
        match &result {
            Ok(content) => {
                // Only the outermost agent reports the run's totals.
                let usage = (ctx.depth() == 0 && ctx.usage().is_enabled()).then(|| ctx.usage().tokens());
                forwarder.send(StreamEvent::complete(self.name(), content, usage)).await;
            }
            Err(AgentError::Cancelled) => {
                debug!(agent = %self.name(), "Stream cancelled");
            }
            Err(e) => {
                forwarder.send(StreamEvent::error(self.name(), e.to_string())).await;
            }
        }
        result
    }

    pub(crate) async fn handle(
        &self,
        ctx: &RunContext,
        input: &str,
        forwarder: Option<&StreamForwarder>,
    ) -> Result<String, AgentError> {
        let inner = &self.inner;
        inner.guard(GuardStage::Input, input).await?;

        let response = match &inner.backend {
            Backend::Remote(remote) => {
                debug!(agent = %inner.name, endpoint = remote.endpoint(), "Dispatching to remote agent");
                match forwarder {
                    Some(fwd) if remote.supports_streaming() => remote.run_stream(ctx, input, fwd).await?,
                    Some(fwd) => {
                        let text = remote.run(ctx, input).await?;
                        emit(fwd, StreamEvent::content(&inner.name, &text)).await?;
                        text
                    }
                    None => remote.run(ctx, input).await?,
                }
            }
            Backend::Local(_) => self.dispatch(ctx, input, forwarder).await?,
        };

        inner.guard(GuardStage::Output, &response).await?;
        Ok(response)
    }

    fn route(&self, input: &str) -> Route {
        if let Some(command) = PlanCommand::parse(input) {
            return Route::Command(command);
        }
        if is_role_question(input) {
            return Route::Role;
        }
        if !self.inner.tools.is_empty() && self.inner.require_plan_approval {
            return Route::Plan;
        }
        Route::Loop
    }

    async fn dispatch(
        &self,
        ctx: &RunContext,
        input: &str,
        forwarder: Option<&StreamForwarder>,
    ) -> Result<String, AgentError> {
        let (route_name, text) = match self.route(input) {
            Route::Command(command) => ("command", self.run_command(ctx, input, command).await?),
            Route::Plan => ("plan", self.propose(ctx, input).await?),
            Route::Role => return self.answer_role(ctx, input, forwarder).await,
            Route::Loop => return self.run_loop(ctx, input, forwarder).await,
        };
        debug!(agent = %self.name(), route = route_name, "Request handled");
        if let Some(fwd) = forwarder {
            emit(fwd, StreamEvent::content(self.name(), &text)).await?;
        }
        Ok(text)
    }

    async fn run_command(
        &self,
        ctx: &RunContext,
        input: &str,
        command: PlanCommand,
    ) -> Result<String, AgentError> {
        let text = match command {
            PlanCommand::Approve { task_id } => self.approve_plan_with_context(ctx, &task_id).await?,
            PlanCommand::Modify { task_id, feedback } => {
                self.modify_plan_with_context(ctx, &task_id, &feedback).await?
            }
            PlanCommand::Cancel { task_id } => self.cancel_plan(&task_id)?,
            PlanCommand::Status { task_id } => self.plan_status(&task_id)?,
        };
        self.inner.remember(input, &text).await?;
        Ok(text)
    }

    async fn answer_role(
        &self,
        ctx: &RunContext,
        input: &str,
        forwarder: Option<&StreamForwarder>,
    ) -> Result<String, AgentError> {
        let inner = &self.inner;
        let mut request = inner.bare_request(
            vec![Message::system(inner.role_prompt()), Message::user(input)],
            Vec::new(),
        );
        request.response_format = None;
        let response = match forwarder {
            Some(fwd) => {
                let mut streamed = String::new();
                match streaming::stream_turn(inner, ctx, fwd, request, &mut streamed).await {
                    Ok(response) => response,
                    Err(e) => {
                        if !streamed.is_empty() {
                            inner.remember(input, &streamed).await?;
                        }
                        return Err(e);
                    }
                }
            }
            None => inner.complete(ctx, request).await?,
        };
        let text = response.message.content;
        inner.remember(input, &text).await?;
        Ok(text)
    }

    async fn propose(&self, ctx: &RunContext, input: &str) -> Result<String, AgentError> {
        let plan = self.create_plan_with_context(ctx, input).await?;
        let text = plan.render();
        self.inner.remember(input, &text).await?;
        Ok(text)
    }

    async fn run_loop(
        &self,
        ctx: &RunContext,
        input: &str,
        forwarder: Option<&StreamForwarder>,
    ) -> Result<String, AgentError> {
        let inner = &self.inner;
        let user = Message::user(input);
        let mut transcript = inner.memory.messages().await?;
        inner.memory.add_message(user.clone()).await?;
        transcript.push(user);

        let mut produced = Vec::new();
        let result = ToolLoop::new(inner, ctx, forwarder).run(transcript, &mut produced).await;

        // Whatever the loop produced is kept, even if it then failed.
        let committed = inner.memory.add_messages(produced).await;
        let response = result?;
        committed?;
        Ok(response)
    }

    // ── Plans ───────────────────────────────────────────────────────────

    /// Ask the model for a plan for `input` and store it.
    ///
    /// The plan is left pending approval or, when this agent does not
    /// require approval, already approved.
    pub async fn create_plan(&self, input: &str) -> Result<ExecutionPlan, AgentError> {
        let ctx = self.new_context();
        let result = self.create_plan_with_context(&ctx, input).await;
        ctx.usage().finish();
        result
    }

    pub async fn create_plan_with_context(
        &self,
        ctx: &RunContext,
        input: &str,
    ) -> Result<ExecutionPlan, AgentError> {
        let inner = &self.inner;
        if inner.tools.is_empty() {
            return Err(PlanError::NoTools.into());
        }
        let prompt = planner::generation_prompt(&inner.system_prompt, &inner.tools);
        let mut request = inner.bare_request(vec![Message::system(prompt), Message::user(input)], Vec::new());
        request.response_format = None;
        let response = inner.complete(ctx, request).await?;

        let mut plan = planner::parse_plan_response(&response.message.content)?.into_plan();
        plan.submit(inner.require_plan_approval)?;
        info!(
            agent = %inner.name,
            task_id = %plan.task_id,
            steps = plan.steps.len(),
            status = %plan.status,
            "Created plan"
        );
        inner.plans.insert(plan.clone());
        Ok(plan)
    }

    /// Approve a pending plan and execute it.
    pub async fn approve_plan(&self, task_id: &str) -> Result<String, AgentError> {
        let ctx = self.new_context();
        let result = self.approve_plan_with_context(&ctx, task_id).await;
        ctx.usage().finish();
        result
    }

    pub async fn approve_plan_with_context(&self, ctx: &RunContext, task_id: &str) -> Result<String, AgentError> {
        self.inner.plans.update(task_id, |plan| plan.approve())?;
        info!(agent = %self.name(), task_id, "Plan approved");
        self.execute_plan_with_context(ctx, task_id).await
    }

    /// Execute a stored plan. Refuses plans the user has not approved.
    pub async fn execute_plan(&self, task_id: &str) -> Result<String, AgentError> {
        let ctx = self.new_context();
        let result = self.execute_plan_with_context(&ctx, task_id).await;
        ctx.usage().finish();
        result
    }

    pub async fn execute_plan_with_context(&self, ctx: &RunContext, task_id: &str) -> Result<String, AgentError> {
        let inner = &self.inner;
        let mut plan = inner.plans.get(task_id)?;
        let result = executor::execute_plan(&mut plan, &inner.tools, ctx).await;

        // A cancel that landed while the plan ran wins over the run's outcome.
        inner.plans.update(task_id, |stored| {
            if stored.status != PlanStatus::Cancelled {
                *stored = plan.clone();
            }
            Ok(())
        })?;
        Ok(result?)
    }

    /// Revise a plan according to `feedback`. The task id is kept and the
    /// revised plan goes back to pending approval.
    pub async fn modify_plan(&self, task_id: &str, feedback: &str) -> Result<String, AgentError> {
        let ctx = self.new_context();
        let result = self.modify_plan_with_context(&ctx, task_id, feedback).await;
        ctx.usage().finish();
        result
    }

    pub async fn modify_plan_with_context(
        &self,
        ctx: &RunContext,
        task_id: &str,
        feedback: &str,
    ) -> Result<String, AgentError> {
        let inner = &self.inner;
        let current = inner.plans.get(task_id)?;
        if !current.status.can_transition_to(PlanStatus::PendingApproval) {
            return Err(PlanError::InvalidTransition {
                task_id: task_id.to_string(),
                from: current.status,
                to: PlanStatus::PendingApproval,
            }
            .into());
        }

        let prompt = planner::modification_prompt(&inner.system_prompt, &inner.tools, &current, feedback);
        let mut request = inner.bare_request(vec![Message::system(prompt), Message::user(feedback)], Vec::new());
        request.response_format = None;
        let response = inner.complete(ctx, request).await?;
        let draft = planner::parse_plan_response(&response.message.content)?;

        let revised = inner.plans.update(task_id, |plan| {
            plan.revise(draft.description, draft.steps)?;
            Ok(plan.clone())
        })?;
        info!(agent = %inner.name, task_id, steps = revised.steps.len(), "Plan modified");
        Ok(revised.render())
    }

    /// Cancel a plan that has not finished.
    pub fn cancel_plan(&self, task_id: &str) -> Result<String, AgentError> {
        self.inner.plans.update(task_id, |plan| plan.cancel())?;
        info!(agent = %self.name(), task_id, "Plan cancelled");
        Ok(format!("Plan `{task_id}` has been cancelled."))
    }

    /// Render a plan with its current status.
    pub fn plan_status(&self, task_id: &str) -> Result<String, AgentError> {
        Ok(self.inner.plans.get(task_id)?.render())
    }

    pub fn plan(&self, task_id: &str) -> Result<ExecutionPlan, AgentError> {
        Ok(self.inner.plans.get(task_id)?)
    }

    /// Release the remote connection, if any, for this agent and every
    /// sub-agent beneath it.
    pub async fn close(&self) -> Result<(), AgentError> {
        if let Backend::Remote(remote) = &self.inner.backend {
            info!(agent = %self.name(), endpoint = remote.endpoint(), "Closing remote agent");
            remote.close().await?;
        }
        for sub in &self.inner.sub_agents {
            Box::pin(sub.close()).await?;
        }
        Ok(())
    }

    pub(crate) fn streaming_unsupported(&self) -> AgentError {
        AgentError::StreamingUnsupported(self.backend_name())
    }
}

/// Builder for [`Agent`].
pub struct AgentBuilder {
    name: String,
    description: String,
    system_prompt: String,
    provider: Option<Arc<dyn Provider>>,
    remote: Option<Arc<dyn RemoteAgent>>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_iterations: usize,
    require_plan_approval: bool,
    tools: Vec<Arc<dyn Tool>>,
    sub_agents: Vec<Agent>,
    memory: Option<Arc<dyn ConversationMemory>>,
    guardrails: Vec<Arc<dyn Guardrail>>,
    response_schema: Option<serde_json::Value>,
    detailed_usage: bool,
    stream_buffer: usize,
}

impl AgentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            system_prompt: String::new(),
            provider: None,
            remote: None,
            model: DEFAULT_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            require_plan_approval: true,
            tools: Vec::new(),
            sub_agents: Vec::new(),
            memory: None,
            guardrails: Vec::new(),
            response_schema: None,
            detailed_usage: true,
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Serve this agent from another process. Takes precedence over a provider.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteAgent>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Tool-enabled provider calls per request before the answer is forced.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_plan_approval(mut self, required: bool) -> Self {
        self.require_plan_approval = required;
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn with_sub_agent(mut self, agent: Agent) -> Self {
        self.sub_agents.push(agent);
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn ConversationMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_guardrail(mut self, guardrail: Arc<dyn Guardrail>) -> Self {
        self.guardrails.push(guardrail);
        self
    }

    /// JSON schema the final response should follow, passed to the provider.
    pub fn with_response_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_detailed_usage(mut self, enabled: bool) -> Self {
        self.detailed_usage = enabled;
        self
    }

    pub fn with_stream_buffer(mut self, capacity: usize) -> Self {
        self.stream_buffer = capacity;
        self
    }

    /// Apply engine-wide defaults.
    pub fn with_engine_config(mut self, engine: &EngineConfig) -> Self {
        self.model = engine.model.clone();
        self.temperature = engine.temperature;
        self.max_tokens = engine.max_tokens;
        self.max_iterations = engine.max_iterations;
        self.require_plan_approval = engine.require_plan_approval;
        self.detailed_usage = engine.detailed_usage;
        self.stream_buffer = engine.stream_buffer;
        self
    }

    pub fn build(self) -> Result<Agent, AgentError> {
        if self.name.trim().is_empty() {
            return Err(AgentError::Config("Agent name must not be empty".into()));
        }
        if self.stream_buffer == 0 {
            return Err(AgentError::Config(format!(
                "Agent '{}': stream buffer must be greater than 0",
                self.name
            )));
        }
        let backend = match (self.remote, self.provider) {
            (Some(remote), _) => Backend::Remote(remote),
            (None, Some(provider)) => Backend::Local(provider),
            (None, None) => {
                return Err(AgentError::Config(format!("Agent '{}' has no provider", self.name)));
            }
        };

        let height = subagent::validate_graph(&self.name, &self.sub_agents)?;

        let mut tools = ToolRegistry::new();
        for tool in self.tools {
            tools.register(tool);
        }
        for sub in &self.sub_agents {
            if !tools.register(Arc::new(SubAgentTool::new(&self.name, sub.clone()))) {
                warn!(
                    agent = %self.name,
                    tool = %subagent::tool_name_for(sub.name()),
                    "Sub-agent tool shadowed by an existing tool"
                );
            }
        }

        let memory = self
            .memory
            .unwrap_or_else(|| Arc::new(InMemoryConversation::new()) as Arc<dyn ConversationMemory>);

        info!(
            agent = %self.name,
            tools = tools.len(),
            sub_agents = self.sub_agents.len(),
            height,
            "Built agent"
        );

        Ok(Agent {
            inner: Arc::new(AgentInner {
                name: self.name,
                description: self.description,
                system_prompt: self.system_prompt,
                backend,
                model: self.model,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                max_iterations: self.max_iterations,
                require_plan_approval: self.require_plan_approval,
                tools,
                sub_agents: self.sub_agents,
                memory,
                plans: PlanStore::new(),
                guardrails: self.guardrails,
                response_schema: self.response_schema,
                detailed_usage: self.detailed_usage,
                stream_buffer: self.stream_buffer,
            }),
        })
    }
}
