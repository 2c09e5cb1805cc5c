//! MainChannelRunner - long-running work, drain, synthesis
//!
//! Phases: `Idle → RunningTools → AwaitingDrain → Synthesizing → Done`.
//! `Synthesizing` is skipped when the interim transcript holds nothing but
//! progress reports.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::synthesis::{SynthesisEngine, meaningful_messages, render_interim};
use super::{ChannelInput, DrainPolicy, FALLBACK_REPLY, MainPhase};
use crate::context::SessionContext;
use crate::coordination::{Channel, Coordination, InterimTranscript, MAIN_THREAD_TIMEOUT};
use crate::events::EventEmitter;
use crate::llm::{Message, Role};
use crate::session::{ConversationState, ThreadStore};
use crate::tools::ToolContext;
use crate::turn::{TurnEngine, TurnOutcome, history};

const DEFAULT_MAX_MESSAGES: usize = 40;

/// How the wait for the secondary channel ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainResult {
    /// The secondary was not processing
    Idle,
    /// The secondary went idle after `waited`
    Drained { waited: Duration },
    /// The secondary was still processing at the deadline; one abort was requested
    TimedOut,
}

/// Result of one main run
#[derive(Debug, Clone)]
pub struct MainOutcome {
    pub run_id: String,
    pub final_text: String,
    pub synthesized: bool,
    pub drain: DrainResult,
    /// The model failed and `final_text` is the apology
    pub failed: bool,
}

/// Runs one main operation end to end
///
/// Writes `main_status` (through its tools), `main_operation_complete` and,
/// on drain timeout, `secondary_abort`. Reads then deletes the interim
/// transcript and deletes `secondary_status` during cleanup.
pub struct MainChannelRunner {
    session: SessionContext,
    coordination: Coordination,
    engine: TurnEngine,
    synthesis: SynthesisEngine,
    threads: ThreadStore,
    thread_id: String,
    max_messages: usize,
    drain_policy: DrainPolicy,
    events: Option<EventEmitter>,
    run_id: String,
    phase: watch::Sender<MainPhase>,
}

impl MainChannelRunner {
    pub fn new(
        session: SessionContext,
        coordination: Coordination,
        engine: TurnEngine,
        synthesis: SynthesisEngine,
        threads: ThreadStore,
        thread_id: impl Into<String>,
    ) -> Self {
        let run_id = Uuid::now_v7().to_string();
        // Everything this run writes to main_status carries its run id
        let coordination = Coordination {
            status: coordination.status.for_run(run_id.as_str()),
            ..coordination
        };
        let (phase, _) = watch::channel(MainPhase::Idle);
        Self {
            session,
            coordination,
            engine,
            synthesis,
            threads,
            thread_id: thread_id.into(),
            max_messages: DEFAULT_MAX_MESSAGES,
            drain_policy: DrainPolicy::default(),
            events: None,
            run_id,
            phase,
        }
    }

    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages;
        self
    }

    pub fn with_drain_policy(mut self, drain_policy: DrainPolicy) -> Self {
        self.drain_policy = drain_policy;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Watch the runner's phase
    pub fn phase(&self) -> watch::Receiver<MainPhase> {
        self.phase.subscribe()
    }

    fn set_phase(&self, phase: MainPhase) {
        info!(run_id = %self.run_id, %phase, "Main phase");
        self.phase.send_replace(phase);
        if let Some(events) = &self.events {
            events.phase(phase);
        }
    }

    /// Run the operation, drain the secondary and publish the final reply
    pub async fn run(self, input: ChannelInput) -> MainOutcome {
        debug!(
            namespace = %self.session.namespace,
            run_id = %self.run_id,
            thread_id = %self.thread_id,
            "MainChannelRunner::run: called"
        );
        let status = &self.coordination.status;

        if input.interim_messages_reset {
            debug!(run_id = %self.run_id, "MainChannelRunner::run: clearing interim transcript of earlier runs");
            self.coordination.interim.clear().await;
        }

        self.set_phase(MainPhase::RunningTools);
        let mut state = self.threads.load(&self.thread_id).await;
        let mut messages = std::mem::take(&mut state.messages);
        messages.push(Message::user(input.text.as_str()));
        let messages = history::prepare(messages, self.max_messages);

        let mut ctx = ToolContext::new(self.session.clone(), Channel::Main, status.clone());
        if let Some(events) = &self.events {
            ctx = ctx.with_events(events.clone());
        }

        let (mut final_text, mut messages, failed) = match self.engine.run(messages, &ctx, None).await {
            TurnOutcome::Reply { text, messages } => (text, messages, false),
            TurnOutcome::Failed { error, messages } => {
                warn!(run_id = %self.run_id, error = %error, "Main turn failed, replying with an apology");
                let mut messages = messages;
                messages.push(Message::assistant(FALLBACK_REPLY));
                (FALLBACK_REPLY.to_string(), messages, true)
            }
            TurnOutcome::Aborted => {
                warn!(run_id = %self.run_id, "Main turn reported an abort it never asked for");
                (FALLBACK_REPLY.to_string(), Vec::new(), true)
            }
        };

        status.reset_status(Channel::Main).await;
        status.clear_progress().await;
        status.write_completion(false).await;

        self.set_phase(MainPhase::AwaitingDrain);
        let drain = self.drain().await;

        let mut transcript = self.coordination.interim.load().await;
        if transcript.belongs_to_other_run(&self.run_id) {
            warn!(run_id = %self.run_id, stale = ?transcript.run_id, "Ignoring interim transcript of another main run");
            transcript = InterimTranscript::default();
        }
        let meaningful = meaningful_messages(&transcript.messages);
        let mut synthesized = false;
        if meaningful.is_empty() {
            debug!(
                interim_count = transcript.messages.len(),
                "MainChannelRunner::run: no meaningful interim messages"
            );
        } else {
            self.set_phase(MainPhase::Synthesizing);
            let text = self.synthesis.synthesize(&final_text, &render_interim(&meaningful)).await;
            if text != final_text {
                info!(run_id = %self.run_id, meaningful = meaningful.len(), "Final reply synthesized with interim conversation");
                replace_last_assistant(&mut messages, &text);
                final_text = text;
                synthesized = true;
            }
        }

        self.cleanup().await;
        state.messages = messages;
        state.interim_messages = transcript.messages;
        self.threads.save(&self.thread_id, &state).await;

        if let Some(events) = &self.events {
            events.final_reply(final_text.as_str());
        }
        self.set_phase(MainPhase::Done);

        MainOutcome {
            run_id: self.run_id.clone(),
            final_text,
            synthesized,
            drain,
            failed,
        }
    }

    /// Wait for the secondary to go idle, aborting it once at the deadline
    pub async fn drain(&self) -> DrainResult {
        let policy = self.drain_policy;
        debug!(?policy, "MainChannelRunner::drain: called");
        let status = &self.coordination.status;
        let started = Instant::now();
        let mut polls = 0u32;
        loop {
            if !status.is_processing(Channel::Secondary).await {
                if polls == 0 {
                    return DrainResult::Idle;
                }
                let waited = started.elapsed();
                debug!(?waited, polls, "MainChannelRunner::drain: secondary went idle");
                return DrainResult::Drained { waited };
            }
            polls += 1;
            if started.elapsed() >= policy.max_wait {
                warn!(run_id = %self.run_id, max_wait = ?policy.max_wait, "Secondary still processing, requesting abort");
                self.coordination.abort.request_abort(MAIN_THREAD_TIMEOUT).await;
                tokio::time::sleep(policy.abort_grace).await;
                return DrainResult::TimedOut;
            }
            tokio::time::sleep(policy.poll_interval).await;
        }
    }

    async fn cleanup(&self) {
        let coordination = &self.coordination;
        coordination.interim.clear().await;
        coordination.status.reset_status(Channel::Main).await;
        coordination.status.reset_status(Channel::Secondary).await;
        coordination.abort.clear().await;
        coordination.status.write_completion(true).await;
    }
}

fn replace_last_assistant(messages: &mut Vec<Message>, text: &str) {
    match messages.last_mut() {
        Some(last) if last.role == Role::Assistant => *last = Message::assistant(text),
        _ => messages.push(Message::assistant(text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::OperationStatus;
    use crate::events::{EventBus, ReplyEvent};
    use crate::llm::{CompletionResponse, ScriptStep, ScriptedLlmClient, ToolCall};
    use crate::prompts::PromptLoader;
    use crate::tools::{ToolExecutor, ToolProfile, ToolSettings};
    use coordstore::{MemoryStore, StoreRef};
    use serde_json::json;
    use std::sync::Arc;

    struct Fixture {
        coordination: Coordination,
        threads: ThreadStore,
        runner: MainChannelRunner,
        bus: EventBus,
    }

    fn fixture(turns: ScriptedLlmClient, synthesis: ScriptedLlmClient) -> Fixture {
        let session = SessionContext::new("demo_user", "tools_updates").unwrap();
        let store: StoreRef = Arc::new(MemoryStore::new());
        let coordination = Coordination::new(store.clone(), session.namespace.clone());
        let threads = ThreadStore::new(store, &session).unwrap();
        let settings = ToolSettings {
            long_operation_steps: 4,
            long_operation_interval: Duration::from_millis(100),
            ..ToolSettings::default()
        };
        let tools = ToolExecutor::with_profile(ToolProfile::Main, &settings);
        let engine = TurnEngine::new(Arc::new(turns), Arc::new(tools), "main");
        let synthesis = SynthesisEngine::new(Arc::new(synthesis), Arc::new(PromptLoader::embedded_only()));
        let bus = EventBus::with_default_capacity();
        let runner = MainChannelRunner::new(session, coordination.clone(), engine, synthesis, threads.clone(), "t1")
            .with_events(bus.emitter_for(Channel::Main));
        Fixture {
            coordination,
            threads,
            runner,
            bus,
        }
    }

    fn long_operation_script(final_text: &str) -> ScriptedLlmClient {
        ScriptedLlmClient::from_responses(vec![
            CompletionResponse::tool_calls(vec![ToolCall::new(
                "c1",
                "long_operation",
                json!({"operation": "package change"}),
            )]),
            CompletionResponse::text(final_text),
        ])
    }

    #[tokio::test(start_paused = true)]
    async fn test_quick_main_without_interim() {
        let f = fixture(
            ScriptedLlmClient::from_responses(vec![CompletionResponse::text("You're on Premium.")]),
            ScriptedLlmClient::new(Vec::new()),
        );
        let mut rx = f.bus.subscribe();
        let phase = f.runner.phase();

        let outcome = f.runner.run(ChannelInput::new("what's my package?", true)).await;
        assert_eq!(outcome.final_text, "You're on Premium.");
        assert!(!outcome.synthesized);
        assert!(!outcome.failed);
        assert_eq!(outcome.drain, DrainResult::Idle);
        assert_eq!(*phase.borrow(), MainPhase::Done);

        let flag = f.coordination.status.read_completion().await.unwrap();
        assert!(flag.ready_for_new_operation);

        let mut phases = Vec::new();
        let mut finals = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                ReplyEvent::Phase { phase } => phases.push(phase),
                ReplyEvent::Final { text, .. } => finals.push(text),
                _ => {}
            }
        }
        assert_eq!(
            phases,
            vec![MainPhase::RunningTools, MainPhase::AwaitingDrain, MainPhase::Done]
        );
        assert_eq!(finals, vec!["You're on Premium.".to_string()]);
        assert_eq!(f.threads.load("t1").await.messages.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_operation_leaves_no_running_state() {
        let f = fixture(
            long_operation_script("Your package has been changed."),
            ScriptedLlmClient::new(Vec::new()),
        );
        let outcome = f.runner.run(ChannelInput::new("change my package", true)).await;
        assert_eq!(outcome.final_text, "Your package has been changed.");

        let status = &f.coordination.status;
        assert!(status.read_status(Channel::Main).await.is_none());
        assert!(status.read_status(Channel::Secondary).await.is_none());
        assert!(status.read_progress().await.is_none());
        assert!(f.coordination.abort.current().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_only_interim_is_not_synthesized() {
        let synthesis = ScriptedLlmClient::from_responses(vec![CompletionResponse::text("should not be used")]);
        let f = fixture(long_operation_script("Done."), synthesis);
        f.coordination
            .interim
            .save(&InterimTranscript::new(vec![Message::assistant(
                "Still processing, 40 percent complete.",
            )]))
            .await;

        let outcome = f.runner.run(ChannelInput::new("change my package", false)).await;
        assert_eq!(outcome.final_text, "Done.");
        assert!(!outcome.synthesized);
        assert!(f.coordination.interim.load().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_meaningful_interim_is_synthesized() {
        let synthesis = ScriptedLlmClient::from_responses(vec![CompletionResponse::text(
            "Hope you enjoyed the joke! Your package is changed.",
        )]);
        let f = fixture(long_operation_script("Your package is changed."), synthesis);
        f.coordination
            .interim
            .save(&InterimTranscript::new(vec![Message::assistant(
                "Why did the phone wear glasses? It lost its contacts!",
            )]))
            .await;

        let outcome = f.runner.run(ChannelInput::new("change my package", false)).await;
        assert!(outcome.synthesized);
        assert_eq!(outcome.final_text, "Hope you enjoyed the joke! Your package is changed.");

        let saved = f.threads.load("t1").await;
        let last = saved.messages.last().unwrap();
        assert_eq!(last.text(), outcome.final_text);
        assert_eq!(saved.interim_messages.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_waits_for_secondary_without_abort() {
        let f = fixture(
            ScriptedLlmClient::from_responses(vec![CompletionResponse::text("ok")]),
            ScriptedLlmClient::new(Vec::new()),
        );
        let status = f.coordination.status.clone();
        status.mark_started(Channel::Secondary).await;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1_200)).await;
            status.mark_finished(Channel::Secondary, false).await;
        });

        let result = f.runner.drain().await;
        let DrainResult::Drained { waited } = result else {
            panic!("expected a drain, got {:?}", result);
        };
        assert!(waited >= Duration::from_millis(1_200));
        assert!(waited < Duration::from_secs(2));
        assert!(f.coordination.abort.current().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_timeout_requests_one_abort() {
        let f = fixture(
            ScriptedLlmClient::from_responses(vec![CompletionResponse::text("ok")]),
            ScriptedLlmClient::new(Vec::new()),
        );
        f.coordination.status.mark_started(Channel::Secondary).await;

        let started = Instant::now();
        assert_eq!(f.runner.drain().await, DrainResult::TimedOut);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(15_200));
        assert!(elapsed < Duration::from_secs(16));

        let signal = f.coordination.abort.current().await.unwrap();
        assert!(signal.abort);
        assert_eq!(signal.reason, MAIN_THREAD_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_secondary_times_out_and_run_still_finishes() {
        let synthesis = ScriptedLlmClient::from_responses(vec![CompletionResponse::text(
            "Glad we could chat! Your package is changed.",
        )]);
        let f = fixture(long_operation_script("Your package is changed."), synthesis);
        f.coordination.status.mark_started(Channel::Secondary).await;
        f.coordination
            .interim
            .save(&InterimTranscript {
                run_id: Some(f.runner.run_id().to_string()),
                messages: vec![Message::assistant("Sure, your bill is due on the 5th.")],
            })
            .await;
        let phase = f.runner.phase();

        let started = Instant::now();
        let outcome = f.runner.run(ChannelInput::new("change my package", false)).await;
        assert!(started.elapsed() >= Duration::from_millis(15_200));
        assert_eq!(outcome.drain, DrainResult::TimedOut);
        assert!(outcome.synthesized);
        assert_eq!(outcome.final_text, "Glad we could chat! Your package is changed.");
        assert_eq!(*phase.borrow(), MainPhase::Done);

        assert!(f.coordination.abort.current().await.is_none());
        assert!(f.coordination.status.read_status(Channel::Secondary).await.is_none());
        assert!(f.coordination.status.read_completion().await.unwrap().ready_for_new_operation);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_transcript_of_earlier_cycle() {
        let synthesis = ScriptedLlmClient::from_responses(vec![CompletionResponse::text("should not be used")]);
        let f = fixture(
            ScriptedLlmClient::from_responses(vec![CompletionResponse::text("You're on Premium.")]),
            synthesis,
        );
        f.coordination
            .interim
            .save(&InterimTranscript::new(vec![Message::assistant(
                "Why did the cat sit on the laptop? To keep an eye on the mouse!",
            )]))
            .await;

        let outcome = f.runner.run(ChannelInput::new("what's my package?", true)).await;
        assert!(!outcome.synthesized);
        assert_eq!(outcome.final_text, "You're on Premium.");
        assert!(f.threads.load("t1").await.interim_messages.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transcript_stamped_by_another_run_is_ignored() {
        let synthesis = ScriptedLlmClient::from_responses(vec![CompletionResponse::text("should not be used")]);
        let f = fixture(long_operation_script("Your package is changed."), synthesis);
        // Published late by a secondary turn that kept an earlier run company
        f.coordination
            .interim
            .save(&InterimTranscript {
                run_id: Some("earlier-run".to_string()),
                messages: vec![Message::assistant("Why did the cat sit on the laptop?")],
            })
            .await;

        let outcome = f.runner.run(ChannelInput::new("change my package", false)).await;
        assert!(!outcome.synthesized);
        assert_eq!(outcome.final_text, "Your package is changed.");
        assert!(f.coordination.interim.load().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_model_failure_still_cleans_up() {
        let f = fixture(
            ScriptedLlmClient::new(vec![ScriptStep::Fail("down".to_string())]),
            ScriptedLlmClient::new(Vec::new()),
        );
        f.coordination
            .status
            .write_status(Channel::Main, "long_operation", 10, OperationStatus::Running)
            .await;

        let outcome = f.runner.run(ChannelInput::new("change my package", true)).await;
        assert!(outcome.failed);
        assert_eq!(outcome.final_text, FALLBACK_REPLY);
        assert!(!f.coordination.status.is_processing(Channel::Main).await);
        assert!(f.coordination.status.read_completion().await.unwrap().ready_for_new_operation);
    }

    #[test]
    fn test_replace_last_assistant() {
        let mut messages = vec![Message::user("hi"), Message::assistant("old")];
        replace_last_assistant(&mut messages, "new");
        assert_eq!(messages, vec![Message::user("hi"), Message::assistant("new")]);

        let mut messages = vec![Message::user("hi")];
        replace_last_assistant(&mut messages, "new");
        assert_eq!(messages.len(), 2);
    }
}
