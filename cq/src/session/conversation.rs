//! Conversation - routes user messages and owns the running channels
//!
//! Main runs in a background task; secondary runs in the caller's task under
//! a cancellation token. Everything the channels say reaches subscribers as
//! [`ReplyEvent`]s.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use coordstore::StoreRef;
use eyre::Result;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::state::ThreadStore;
use crate::channels::{
    ChannelInput, ChannelRouter, DrainPolicy, MainChannelRunner, MainOutcome, MainPhase, SecondaryChannelRunner,
    SecondaryOutcome, SynthesisEngine,
};
use crate::config::Config;
use crate::context::SessionContext;
use crate::coordination::{Channel, Coordination, StatusRecord, ToolProgress};
use crate::events::{EventBus, ReplyEvent};
use crate::llm::LlmClient;
use crate::prompts::PromptLoader;
use crate::tools::{ToolExecutor, ToolProfile, ToolSettings};
use crate::turn::TurnEngine;

/// Tunables of one conversation
#[derive(Debug, Clone)]
pub struct ConversationSettings {
    pub drain: DrainPolicy,
    pub router_cooldown: Duration,
    pub max_messages: usize,
    pub max_turns: u32,
    pub max_tokens: u32,
}

impl ConversationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            drain: DrainPolicy::from_config(&config.coordination),
            router_cooldown: config.coordination.router_cooldown(),
            max_messages: config.agent.max_messages,
            max_turns: config.agent.max_turns,
            max_tokens: config.llm.max_tokens,
        }
    }
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What `send` did with the message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// A main run started in the background; its reply arrives as an event
    MainStarted { run_id: String },
    /// The secondary answered (or did not) before `send` returned
    Secondary(SecondaryOutcome),
}

/// Coordination state at a glance, for `/status`
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub main: Option<StatusRecord>,
    pub secondary: Option<StatusRecord>,
    pub progress: Option<ToolProgress>,
    /// Phase of the background main run, if one is in flight
    pub phase: Option<MainPhase>,
}

struct MainTask {
    run_id: String,
    handle: JoinHandle<MainOutcome>,
    phase: watch::Receiver<MainPhase>,
}

impl MainTask {
    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    fn phase(&self) -> MainPhase {
        *self.phase.borrow()
    }
}

/// One user's dual-channel conversation
pub struct Conversation {
    session: SessionContext,
    coordination: Coordination,
    router: ChannelRouter,
    bus: EventBus,
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
    main_tools: Arc<ToolExecutor>,
    secondary_tools: Arc<ToolExecutor>,
    main_prompt: String,
    secondary_prompt: String,
    threads: ThreadStore,
    settings: ConversationSettings,
    main_thread: OnceLock<String>,
    secondary_thread: OnceLock<String>,
    main_task: tokio::sync::Mutex<Option<MainTask>>,
    /// Serialises main starts; never held by status queries
    main_start: tokio::sync::Mutex<()>,
    secondary_cancel: Mutex<Option<CancellationToken>>,
    /// Set when a main run starts; the next secondary turn starts a fresh
    /// interim transcript
    reset_pending: AtomicBool,
}

impl Conversation {
    pub fn new(
        session: SessionContext,
        store: StoreRef,
        llm: Arc<dyn LlmClient>,
        tools: &ToolSettings,
        prompts: Arc<PromptLoader>,
        settings: ConversationSettings,
    ) -> Result<Self> {
        debug!(namespace = %session.namespace, session_id = %session.session_id, "Conversation::new: called");
        let coordination = Coordination::new(store.clone(), session.namespace.clone());
        let router = ChannelRouter::new(coordination.status.clone(), settings.router_cooldown);
        let threads = ThreadStore::new(store, &session)?;
        Ok(Self {
            main_prompt: prompts.system_prompt(Channel::Main)?,
            secondary_prompt: prompts.system_prompt(Channel::Secondary)?,
            main_tools: Arc::new(ToolExecutor::with_profile(ToolProfile::Main, tools)),
            secondary_tools: Arc::new(ToolExecutor::with_profile(ToolProfile::Secondary, tools)),
            session,
            coordination,
            router,
            bus: EventBus::with_default_capacity(),
            llm,
            prompts,
            threads,
            settings,
            main_thread: OnceLock::new(),
            secondary_thread: OnceLock::new(),
            main_task: tokio::sync::Mutex::new(None),
            main_start: tokio::sync::Mutex::new(()),
            secondary_cancel: Mutex::new(None),
            reset_pending: AtomicBool::new(false),
        })
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ReplyEvent> {
        self.bus.subscribe()
    }

    fn thread_id(&self, channel: Channel) -> &str {
        let cell = match channel {
            Channel::Main => &self.main_thread,
            Channel::Secondary => &self.secondary_thread,
        };
        cell.get_or_init(|| Uuid::now_v7().to_string())
    }

    fn engine(&self, channel: Channel) -> TurnEngine {
        let (tools, prompt) = match channel {
            Channel::Main => (&self.main_tools, &self.main_prompt),
            Channel::Secondary => (&self.secondary_tools, &self.secondary_prompt),
        };
        TurnEngine::new(self.llm.clone(), tools.clone(), prompt.as_str())
            .with_max_turns(self.settings.max_turns)
            .with_max_tokens(self.settings.max_tokens)
    }

    /// Route one user message and run it on the chosen channel
    pub async fn send(&self, text: &str) -> SendOutcome {
        debug!(namespace = %self.session.namespace, text_len = text.len(), "Conversation::send: called");
        self.bus.begin_turn();
        let decision = self.router.route().await;
        info!(channel = %decision.channel, reset = decision.interim_messages_reset, "Routed user message");
        match decision.channel {
            Channel::Main => self.start_main(text, decision.interim_messages_reset).await,
            Channel::Secondary => {
                let reset = decision.interim_messages_reset || self.reset_pending.swap(false, Ordering::SeqCst);
                let outcome = self.run_secondary(text, reset).await;
                if reset && !matches!(outcome, SecondaryOutcome::Published { .. }) {
                    self.reset_pending.store(true, Ordering::SeqCst);
                }
                SendOutcome::Secondary(outcome)
            }
        }
    }

    async fn start_main(&self, text: &str, reset: bool) -> SendOutcome {
        let _starting = self.main_start.lock().await;
        self.settle_previous_main().await;

        let synthesis = SynthesisEngine::new(self.llm.clone(), self.prompts.clone());
        let runner = MainChannelRunner::new(
            self.session.clone(),
            self.coordination.clone(),
            self.engine(Channel::Main),
            synthesis,
            self.threads.clone(),
            self.thread_id(Channel::Main),
        )
        .with_events(self.bus.emitter_for(Channel::Main))
        .with_max_messages(self.settings.max_messages)
        .with_drain_policy(self.settings.drain);

        let run_id = runner.run_id().to_string();
        let phase = runner.phase();
        self.reset_pending.store(true, Ordering::SeqCst);
        let handle = tokio::spawn(runner.run(ChannelInput::new(text, reset)));
        info!(%run_id, "Main run started in background");
        *self.main_task.lock().await = Some(MainTask {
            run_id: run_id.clone(),
            handle,
            phase,
        });
        SendOutcome::MainStarted { run_id }
    }

    /// Cancel a quick previous main run, or wait for a long one to finish
    ///
    /// The task slot is locked only to inspect it, so status queries keep
    /// answering while the previous run drains.
    async fn settle_previous_main(&self) {
        let mut phase = {
            let mut slot = self.main_task.lock().await;
            let Some(previous) = slot.as_ref().filter(|task| task.is_running()) else {
                slot.take();
                return;
            };
            if previous.phase() == MainPhase::RunningTools && !self.long_operation_running().await {
                info!(run_id = %previous.run_id, "Cancelling quick main run for the new request");
                previous.handle.abort();
                slot.take();
                return;
            }
            info!(run_id = %previous.run_id, "Waiting for previous main run to finish");
            previous.phase.clone()
        };

        // Err means the run ended without reaching Done
        let _ = phase.wait_for(|p| *p == MainPhase::Done).await;
        let previous = self.main_task.lock().await.take();
        if let Some(previous) = previous {
            let _ = previous.handle.await;
        }
    }

    async fn run_secondary(&self, text: &str, reset: bool) -> SecondaryOutcome {
        let token = CancellationToken::new();
        if let Ok(mut slot) = self.secondary_cancel.lock() {
            *slot = Some(token.clone());
        }

        let runner = SecondaryChannelRunner::new(
            self.session.clone(),
            self.coordination.clone(),
            self.engine(Channel::Secondary),
            self.threads.clone(),
            self.thread_id(Channel::Secondary),
        )
        .with_events(self.bus.emitter_for(Channel::Secondary))
        .with_max_messages(self.settings.max_messages);
        let outcome = runner.run(ChannelInput::new(text, reset), token).await;

        if let Ok(mut slot) = self.secondary_cancel.lock() {
            slot.take();
        }
        outcome
    }

    async fn long_operation_running(&self) -> bool {
        self.coordination.status.read_progress().await.is_some()
    }

    /// Stop what the user is waiting on
    ///
    /// Cancels the foreground secondary turn. The background main run is
    /// cancelled only while it is a quick run with no long operation going.
    /// Returns true when something was cancelled.
    pub async fn interrupt(&self) -> bool {
        let mut interrupted = false;
        if let Some(token) = self.secondary_cancel.lock().ok().and_then(|mut slot| slot.take()) {
            info!("Interrupting secondary turn");
            token.cancel();
            interrupted = true;
        }

        let slot = self.main_task.lock().await;
        if let Some(task) = slot.as_ref()
            && task.is_running()
            && task.phase() == MainPhase::RunningTools
            && !self.long_operation_running().await
        {
            info!(run_id = %task.run_id, "Interrupting quick main run");
            task.handle.abort();
            interrupted = true;
        }
        interrupted
    }

    pub async fn is_main_running(&self) -> bool {
        self.main_task.lock().await.as_ref().is_some_and(MainTask::is_running)
    }

    /// Wait for the background main run, if any
    ///
    /// Returns `None` when there was no run or it was cancelled.
    pub async fn wait_idle(&self) -> Option<MainOutcome> {
        let task = self.main_task.lock().await.take()?;
        match task.handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                debug!(run_id = %task.run_id, error = %e, "Conversation::wait_idle: main run did not finish");
                None
            }
        }
    }

    /// Cancel the secondary and let the main run finish
    pub async fn shutdown(&self) -> Option<MainOutcome> {
        info!(session_id = %self.session.session_id, "Shutting down conversation");
        if let Some(token) = self.secondary_cancel.lock().ok().and_then(|mut slot| slot.take()) {
            token.cancel();
        }
        self.wait_idle().await
    }

    pub async fn status_snapshot(&self) -> StatusSnapshot {
        let status = &self.coordination.status;
        let phase = self
            .main_task
            .lock()
            .await
            .as_ref()
            .filter(|task| task.is_running())
            .map(MainTask::phase);
        StatusSnapshot {
            main: status.read_status(Channel::Main).await,
            secondary: status.read_status(Channel::Secondary).await,
            progress: status.read_progress().await,
            phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionResponse, ScriptedLlmClient, offline_client};
    use coordstore::MemoryStore;

    fn settings() -> ConversationSettings {
        ConversationSettings {
            router_cooldown: Duration::ZERO,
            ..ConversationSettings::default()
        }
    }

    fn conversation(llm: Arc<dyn LlmClient>, tools: ToolSettings) -> Conversation {
        let session = SessionContext::new("demo_user", "tools_updates").unwrap();
        let store: StoreRef = Arc::new(MemoryStore::new());
        Conversation::new(
            session,
            store,
            llm,
            &tools,
            Arc::new(PromptLoader::embedded_only()),
            settings(),
        )
        .unwrap()
    }

    fn quick_tools() -> ToolSettings {
        ToolSettings {
            long_operation_steps: 4,
            long_operation_interval: Duration::from_millis(100),
            ..ToolSettings::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_message_goes_to_main() {
        let llm = Arc::new(ScriptedLlmClient::from_responses(vec![CompletionResponse::text("Hello!")]));
        let conversation = conversation(llm, quick_tools());
        let mut rx = conversation.subscribe();

        let outcome = conversation.send("hi").await;
        assert!(matches!(outcome, SendOutcome::MainStarted { .. }));
        let result = conversation.wait_idle().await.unwrap();
        assert_eq!(result.final_text, "Hello!");

        let finals: Vec<ReplyEvent> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| matches!(e, ReplyEvent::Final { .. }))
            .collect();
        assert_eq!(
            finals,
            vec![ReplyEvent::Final {
                channel: Channel::Main,
                text: "Hello!".to_string()
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_during_long_operation_goes_to_secondary() {
        let conversation = conversation(Arc::new(offline_client()), quick_tools());
        assert!(matches!(
            conversation.send("Please change my package").await,
            SendOutcome::MainStarted { .. }
        ));
        tokio::time::sleep(Duration::from_millis(150)).await;

        let outcome = conversation.send("what's the status?").await;
        let SendOutcome::Secondary(SecondaryOutcome::Published { reply }) = outcome else {
            panic!("expected a secondary reply, got {:?}", outcome);
        };
        assert!(reply.contains('%'));

        let snapshot = conversation.status_snapshot().await;
        assert!(snapshot.main.is_some_and(|s| s.processing));
        assert_eq!(snapshot.phase, Some(MainPhase::RunningTools));

        let result = conversation.wait_idle().await.unwrap();
        assert!(result.synthesized);
        assert!(!conversation.is_main_running().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_spares_long_operation() {
        let conversation = conversation(Arc::new(offline_client()), quick_tools());
        conversation.send("Please close my contract").await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(!conversation.interrupt().await);
        let result = conversation.wait_idle().await.unwrap();
        assert!(result.final_text.contains("contract closure"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_cancels_quick_main() {
        let llm = Arc::new(
            ScriptedLlmClient::from_responses(vec![CompletionResponse::text("slow hello")])
                .latency(Duration::from_secs(5)),
        );
        let conversation = conversation(llm, quick_tools());
        conversation.send("hi").await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(conversation.interrupt().await);
        assert!(conversation.wait_idle().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_answers_while_next_main_waits() {
        let conversation = Arc::new(conversation(Arc::new(offline_client()), quick_tools()));
        conversation.send("Please change my package").await;
        // A secondary turn that never finishes keeps main draining
        conversation.coordination.status.mark_started(Channel::Secondary).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(conversation.status_snapshot().await.phase, Some(MainPhase::AwaitingDrain));

        let next = {
            let conversation = conversation.clone();
            tokio::spawn(async move { conversation.send("Change my package to Basic").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!next.is_finished());

        let snapshot = tokio::time::timeout(Duration::from_millis(100), conversation.status_snapshot())
            .await
            .expect("status snapshot blocked behind the pending main start");
        assert_eq!(snapshot.phase, Some(MainPhase::AwaitingDrain));
        assert!(conversation.is_main_running().await);

        assert!(matches!(next.await.unwrap(), SendOutcome::MainStarted { .. }));
        let result = conversation.wait_idle().await.unwrap();
        assert!(result.final_text.contains("package change"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_main_cancels_quick_main() {
        let llm = Arc::new(
            ScriptedLlmClient::with_responder(|req| {
                let last = req.messages.last().map(|m| m.text()).unwrap_or_default();
                Ok(CompletionResponse::text(format!("re: {}", last)))
            })
            .latency(Duration::from_secs(1)),
        );
        let conversation = conversation(llm, quick_tools());
        let SendOutcome::MainStarted { run_id: first } = conversation.send("one").await else {
            panic!("expected main");
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        let SendOutcome::MainStarted { run_id: second } = conversation.send("two").await else {
            panic!("expected main");
        };
        assert_ne!(first, second);

        let result = conversation.wait_idle().await.unwrap();
        assert_eq!(result.run_id, second);
        assert_eq!(result.final_text, "re: two");
    }
}
