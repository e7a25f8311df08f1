//! The Runner: one node of the delegation tree.
//!
//! A Runner owns a conversation log, a lazily materialized tool set, a
//! typed event channel and a waiting-state tracker. `send_message` drives
//! one turn through a streaming session; delegation tools spawn child
//! Runners whose events are relayed into this one.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use handoff_config::AppConfig;
use handoff_core::{Credentials, Error, Message, Provider, Result, Tool, ToolRegistry};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info};
use uuid::Uuid;

use crate::channel::EventChannel;
use crate::conversation::ConversationState;
use crate::delegation::{DelegationDescriptor, DelegationTool};
use crate::notes::{AttachNotesTool, NotesLog, NotesView};
use crate::session::{self, TurnResult};
use crate::stream_event::RunnerEvent;
use crate::waiting::{BusySignal, Transition, Trigger, WaitingTracker};

/// Model and loop settings shared by every Runner a factory creates.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub max_chat_completions: u32,
    pub parallel_tool_calls: bool,
    pub max_delegation_depth: Option<u32>,
    pub event_capacity: usize,
}

impl RunnerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.default_model.clone(),
            temperature: config.default_temperature,
            max_tokens: config.default_max_tokens,
            max_chat_completions: config.runner.max_chat_completions,
            parallel_tool_calls: config.runner.parallel_tool_calls,
            max_delegation_depth: config.runner.max_delegation_depth,
            event_capacity: config.runner.event_capacity,
        }
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// A handle to a Runner. Cloning is cheap and yields the same Runner.
#[derive(Clone)]
pub struct Runner {
    inner: Arc<RunnerInner>,
}

pub(crate) struct RunnerInner {
    me: Weak<RunnerInner>,
    id: Uuid,
    role: String,
    depth: u32,

    /// The transport
    provider: Arc<dyn Provider>,
    settings: RunnerSettings,
    credentials: Credentials,
    notes: NotesView,

    conversation: Mutex<ConversationState>,
    leaf_tools: Vec<Arc<dyn Tool>>,
    pending_delegations: Mutex<Vec<DelegationDescriptor>>,
    /// Set on the first turn
    tools: Mutex<Option<Arc<ToolRegistry>>>,

    /// Tool calls in flight in this subtree
    active_calls: AtomicUsize,
    waiting: WaitingTracker,
    events: EventChannel,
    /// Parents this Runner's events are relayed to
    relays: Mutex<Vec<Weak<RunnerInner>>>,

    /// Serializes turns
    turn: tokio::sync::Mutex<()>,
}

impl Runner {
    pub fn builder(provider: Arc<dyn Provider>, credentials: Credentials) -> RunnerBuilder {
        RunnerBuilder::new(provider, credentials)
    }

    pub(crate) fn from_inner(inner: Arc<RunnerInner>) -> Self {
        Self { inner }
    }

    /// Run one turn: append `text` as a user message and drive the model
    /// (and any tools it calls) until it answers without tools.
    ///
    /// Fails with `Error::Provider` if the transport fails, and with
    /// `Error::Config` if the tool set cannot be materialized.
    pub async fn send_message(&self, text: impl Into<String>) -> Result<TurnResult> {
        let text = text.into();
        if text.is_empty() {
            return Err(Error::InvalidInput("message text must not be empty".into()));
        }

        let _turn = self.inner.turn.lock().await;
        let tools = self.inner.ensure_tools()?;
        self.inner.waiting.arm();
        self.inner.conversation.lock().begin_turn(text);
        info!(runner = %self.inner.id, role = %self.inner.role, "Turn started");

        let result = session::run(&self.inner, tools).await;
        match &result {
            Ok(turn) => info!(
                runner = %self.inner.id,
                completions = turn.completions,
                tool_calls = turn.tool_calls.len(),
                "Turn finished"
            ),
            Err(e) => tracing::error!(runner = %self.inner.id, error = %e, "Turn failed"),
        }
        result
    }

    /// Subscribe to events emitted from now on, including those relayed
    /// from descendants.
    pub fn subscribe(&self) -> broadcast::Receiver<RunnerEvent> {
        self.inner.events.subscribe()
    }

    /// Like [`Runner::subscribe`], as a `Stream`.
    pub fn event_stream(&self) -> BroadcastStream<RunnerEvent> {
        self.inner.events.stream()
    }

    /// Resolves once per turn, when output first starts arriving.
    pub fn busy_signal(&self) -> BusySignal {
        self.inner.waiting.subscribe()
    }

    pub fn waiting(&self) -> &WaitingTracker {
        &self.inner.waiting
    }

    /// A copy of the conversation log.
    pub fn messages(&self) -> Vec<Message> {
        self.inner.conversation.lock().messages().to_vec()
    }

    pub fn notes(&self) -> &NotesView {
        &self.inner.notes
    }

    pub fn credentials(&self) -> &Credentials {
        &self.inner.credentials
    }

    pub fn active_call_count(&self) -> usize {
        self.inner.active_calls.load(Ordering::SeqCst)
    }

    /// Position in the delegation tree; the root is 0.
    pub fn depth(&self) -> u32 {
        self.inner.depth
    }

    pub fn role(&self) -> &str {
        &self.inner.role
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Names of the tools the model can call. Before the first turn this
    /// lists the declared tools, delegations included.
    pub fn tool_names(&self) -> Vec<String> {
        if let Some(registry) = self.inner.tools.lock().as_ref() {
            return registry.names().into_iter().map(String::from).collect();
        }
        let mut names: Vec<String> = self.inner.leaf_tools.iter().map(|t| t.name().to_string()).collect();
        names.push(AttachNotesTool::NAME.to_string());
        names.extend(
            self.inner
                .pending_delegations
                .lock()
                .iter()
                .map(|d| d.tool_name.clone()),
        );
        names
    }

    /// Whether both handles refer to the same Runner.
    pub fn same_as(&self, other: &Runner) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Forward every event this Runner emits into `parent`.
    pub fn relay_to(&self, parent: &Runner) {
        self.inner.relays.lock().push(Arc::downgrade(&parent.inner));
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("id", &self.inner.id)
            .field("role", &self.inner.role)
            .field("depth", &self.inner.depth)
            .finish_non_exhaustive()
    }
}

impl RunnerInner {
    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn depth(&self) -> u32 {
        self.depth
    }

    pub(crate) fn max_delegation_depth(&self) -> Option<u32> {
        self.settings.max_delegation_depth
    }

    pub(crate) fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub(crate) fn notes(&self) -> &NotesView {
        &self.notes
    }

    pub(crate) fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub(crate) fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    pub(crate) fn messages_snapshot(&self) -> Vec<Message> {
        self.conversation.lock().messages().to_vec()
    }

    /// Build the tool set on first use: leaf tools, `attachNotes`, then one
    /// tool per pending delegation. Pending delegations are drained only if
    /// every one of them materializes.
    fn ensure_tools(&self) -> Result<Arc<ToolRegistry>> {
        let mut slot = self.tools.lock();
        if let Some(registry) = slot.as_ref() {
            return Ok(registry.clone());
        }

        let mut registry = ToolRegistry::new();
        for tool in &self.leaf_tools {
            register_unique(&mut registry, tool.clone())?;
        }
        register_unique(&mut registry, Arc::new(AttachNotesTool::new(self.notes.log().clone())))?;

        let mut pending = self.pending_delegations.lock();
        for descriptor in pending.iter() {
            descriptor.factory.check()?;
            register_unique(
                &mut registry,
                Arc::new(DelegationTool::new(descriptor.clone(), self.me.clone())),
            )?;
        }
        pending.clear();

        debug!(runner = %self.id, tools = ?registry.names(), "Materialized tool set");
        let registry = Arc::new(registry);
        *slot = Some(registry.clone());
        Ok(registry)
    }

    // --- Native event handlers (this Runner's own session) ---

    pub(crate) async fn on_content(&self, text: String) {
        if self.waiting.transition(Trigger::ContentChunk) == Transition::Fired {
            // Let busy observers run before the first chunk is delivered.
            tokio::task::yield_now().await;
        }
        self.emit(RunnerEvent::Content(text)).await;
    }

    pub(crate) async fn on_message(&self, message: Message) {
        self.conversation.lock().push(message.clone());
        self.emit(RunnerEvent::Message(message)).await;
        self.emit(RunnerEvent::Content("\n\n".into())).await;
    }

    pub(crate) async fn on_tool_call_started(&self, id: String, name: String, arguments: serde_json::Value) {
        self.active_calls.fetch_add(1, Ordering::SeqCst);
        self.waiting.transition(Trigger::ToolCallStarted);
        self.emit(RunnerEvent::ToolCallStarted { id, name, arguments }).await;
    }

    pub(crate) async fn on_tool_call_finished(&self, id: String, name: String, output: String, success: bool) {
        self.decrement_active_calls();
        self.emit(RunnerEvent::ToolCallFinished {
            id,
            name,
            output,
            success,
        })
        .await;
    }

    fn decrement_active_calls(&self) {
        let _ = self
            .active_calls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)));
    }

    /// Publish to this Runner's subscribers, then to every live parent.
    pub(crate) fn emit(&self, event: RunnerEvent) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.events.send(event.clone());
            let parents: Vec<Arc<RunnerInner>> = self.relays.lock().iter().filter_map(Weak::upgrade).collect();
            for parent in parents {
                parent.relay(event.clone()).await;
            }
        })
    }

    /// Handle an event relayed from a child. Relayed messages belong to the
    /// child's log and are only re-emitted here.
    async fn relay(&self, event: RunnerEvent) {
        match &event {
            RunnerEvent::Content(_) => {
                if self.waiting.transition(Trigger::ContentChunk) == Transition::Fired {
                    tokio::task::yield_now().await;
                }
            }
            RunnerEvent::ToolCallStarted { .. } => {
                self.active_calls.fetch_add(1, Ordering::SeqCst);
                self.waiting.transition(Trigger::ToolCallStarted);
            }
            RunnerEvent::ToolCallFinished { .. } => self.decrement_active_calls(),
            RunnerEvent::Message(_) | RunnerEvent::Delegating { .. } | RunnerEvent::Handoff { .. } => {}
        }
        self.emit(event).await;
    }
}

fn register_unique(registry: &mut ToolRegistry, tool: Arc<dyn Tool>) -> Result<()> {
    if registry.contains(tool.name()) {
        return Err(Error::config(format!("duplicate tool name '{}'", tool.name())));
    }
    registry.register(tool);
    Ok(())
}

/// Builder for [`Runner`].
pub struct RunnerBuilder {
    provider: Arc<dyn Provider>,
    credentials: Credentials,
    settings: RunnerSettings,
    role: String,
    system_prompt: Option<String>,
    tools: Vec<Arc<dyn Tool>>,
    delegations: Vec<DelegationDescriptor>,
    notes: Option<NotesView>,
    depth: u32,
}

impl RunnerBuilder {
    pub fn new(provider: Arc<dyn Provider>, credentials: Credentials) -> Self {
        Self {
            provider,
            credentials,
            settings: RunnerSettings::default(),
            role: "agent".into(),
            system_prompt: None,
            tools: Vec::new(),
            delegations: Vec::new(),
            notes: None,
            depth: 0,
        }
    }

    pub fn settings(mut self, settings: RunnerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Declare a delegation tool. It becomes callable on the first turn.
    pub fn delegation(mut self, descriptor: DelegationDescriptor) -> Self {
        self.delegations.push(descriptor);
        self
    }

    /// Join an existing notes log. Without this the Runner starts a new one.
    pub fn notes(mut self, notes: NotesView) -> Self {
        self.notes = Some(notes);
        self
    }

    pub fn depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn build(self) -> Runner {
        let notes = self.notes.unwrap_or_else(|| NotesLog::new().view());
        let events = EventChannel::new(self.settings.event_capacity);
        let inner = Arc::new_cyclic(|me| RunnerInner {
            me: me.clone(),
            id: Uuid::new_v4(),
            role: self.role,
            depth: self.depth,
            provider: self.provider,
            settings: self.settings,
            credentials: self.credentials,
            notes,
            conversation: Mutex::new(ConversationState::new(self.system_prompt)),
            leaf_tools: self.tools,
            pending_delegations: Mutex::new(self.delegations),
            tools: Mutex::new(None),
            active_calls: AtomicUsize::new(0),
            waiting: WaitingTracker::new(),
            events,
            relays: Mutex::new(Vec::new()),
            turn: tokio::sync::Mutex::new(()),
        });
        Runner { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegation::SpawnContext;
    use crate::test_helpers::ScriptedProvider;
    use crate::waiting::WaitingState;
    use handoff_core::Role;

    fn runner(provider: Arc<ScriptedProvider>) -> Runner {
        Runner::builder(provider, Credentials::new("test-token"))
            .system_prompt("You are a test agent")
            .build()
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let provider = ScriptedProvider::new(vec![]);
        let err = runner(provider).send_message("").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn system_prompt_then_user_then_assistant() {
        let provider = ScriptedProvider::new(vec![ScriptedProvider::text("hello")]);
        let runner = runner(provider.clone());

        let result = runner.send_message("hi").await.unwrap();
        assert_eq!(result.first_message_content(), Some("hello"));

        let roles: Vec<Role> = runner.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages.len(), 2);
        assert!(requests[0].stream);
        assert!(requests[0].tools.iter().any(|t| t.name == "attachNotes"));
    }

    #[tokio::test]
    async fn second_turn_keeps_log_and_rearms() {
        let provider = ScriptedProvider::new(vec![ScriptedProvider::text("one"), ScriptedProvider::text("two")]);
        let runner = runner(provider);

        runner.send_message("first").await.unwrap();
        assert_eq!(runner.waiting().state(), WaitingState::Fired);
        assert_eq!(runner.waiting().cycle(), 1);

        runner.send_message("second").await.unwrap();
        assert_eq!(runner.waiting().cycle(), 2);
        assert_eq!(runner.messages().len(), 5);
        assert_eq!(runner.messages()[0].role, Role::System);
    }

    #[tokio::test]
    async fn duplicate_tool_names_fail_materialization() {
        let provider = ScriptedProvider::new(vec![]);
        let notes = NotesLog::new();
        let runner = Runner::builder(provider, Credentials::new("t"))
            .tool(Arc::new(AttachNotesTool::new(notes)))
            .build();

        let err = runner.send_message("hi").await.unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn tool_names_before_first_turn_include_delegations() {
        let provider = ScriptedProvider::new(vec![]);
        let factory = |ctx: SpawnContext| -> Result<Runner> {
            Ok(Runner::builder(ScriptedProvider::new(vec![]), ctx.credentials).build())
        };
        let runner = Runner::builder(provider, Credentials::new("t"))
            .delegation(DelegationDescriptor::new("assignToDeveloper", "Delegate", "The task", factory))
            .build();

        assert_eq!(runner.tool_names(), vec!["attachNotes", "assignToDeveloper"]);
    }

    #[tokio::test]
    async fn relayed_tool_events_count_on_parent() {
        let parent = runner(ScriptedProvider::new(vec![]));
        let child = runner(ScriptedProvider::new(vec![]));
        child.relay_to(&parent);
        let mut rx = parent.subscribe();

        child
            .inner
            .on_tool_call_started("c1".into(), "readFile".into(), serde_json::json!({}))
            .await;
        assert_eq!(parent.active_call_count(), 1);
        assert_eq!(parent.waiting().state(), WaitingState::Fired);

        child
            .inner
            .on_tool_call_finished("c1".into(), "readFile".into(), "ok".into(), true)
            .await;
        assert_eq!(parent.active_call_count(), 0);
        assert_eq!(child.active_call_count(), 0);

        assert_eq!(rx.recv().await.unwrap().event_type(), "tool_call_started");
        assert_eq!(rx.recv().await.unwrap().event_type(), "tool_call_finished");
    }

    #[tokio::test]
    async fn relayed_messages_are_not_appended_to_parent() {
        let parent = runner(ScriptedProvider::new(vec![]));
        let child = runner(ScriptedProvider::new(vec![]));
        child.relay_to(&parent);
        let mut rx = parent.subscribe();

        child.inner.on_message(Message::assistant("from child")).await;

        assert!(parent.messages().is_empty());
        assert_eq!(child.messages().len(), 1);
        assert_eq!(rx.recv().await.unwrap().event_type(), "message");
        assert_eq!(rx.recv().await.unwrap().as_content(), Some("\n\n"));
    }

    #[test]
    fn finished_without_start_does_not_underflow() {
        let runner = runner(ScriptedProvider::new(vec![]));
        runner.inner.decrement_active_calls();
        assert_eq!(runner.active_call_count(), 0);
    }
}
