//! SecondaryChannelRunner - answers while the main channel is busy

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ChannelInput, FALLBACK_REPLY};
use crate::context::SessionContext;
use crate::coordination::{Channel, Coordination};
use crate::events::EventEmitter;
use crate::llm::Message;
use crate::session::{ConversationState, ThreadStore};
use crate::tools::ToolContext;
use crate::turn::{TurnEngine, TurnOutcome, history};

const DEFAULT_MAX_MESSAGES: usize = 40;

/// How a secondary turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecondaryOutcome {
    /// Reply delivered and appended to the interim transcript
    Published { reply: String },

    /// Model failed; the apology was delivered, nothing was appended
    Failed { reply: String },

    /// The main runner asked for an abort; nothing was saved
    Aborted,

    /// The caller cancelled the run; nothing was saved
    Cancelled,
}

/// Runs one secondary turn under the status/abort protocol
///
/// Writes `secondary_status` and `secondary_interim_messages`; reads and
/// deletes `secondary_abort`. Never touches main-owned keys.
pub struct SecondaryChannelRunner {
    session: SessionContext,
    coordination: Coordination,
    engine: TurnEngine,
    threads: ThreadStore,
    thread_id: String,
    max_messages: usize,
    events: Option<EventEmitter>,
}

impl SecondaryChannelRunner {
    pub fn new(
        session: SessionContext,
        coordination: Coordination,
        engine: TurnEngine,
        threads: ThreadStore,
        thread_id: impl Into<String>,
    ) -> Self {
        Self {
            session,
            coordination,
            engine,
            threads,
            thread_id: thread_id.into(),
            max_messages: DEFAULT_MAX_MESSAGES,
            events: None,
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

    /// Run the turn until it publishes, fails, aborts or `cancel` fires
    pub async fn run(&self, input: ChannelInput, cancel: CancellationToken) -> SecondaryOutcome {
        debug!(
            namespace = %self.session.namespace,
            thread_id = %self.thread_id,
            reset = input.interim_messages_reset,
            "SecondaryChannelRunner::run: called"
        );
        let status = &self.coordination.status;
        status.mark_started(Channel::Secondary).await;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(thread_id = %self.thread_id, "Secondary turn cancelled");
                status.mark_finished(Channel::Secondary, true).await;
                SecondaryOutcome::Cancelled
            }
            outcome = self.run_turn(input) => outcome,
        }
    }

    async fn run_turn(&self, input: ChannelInput) -> SecondaryOutcome {
        let coordination = &self.coordination;
        if coordination.abort.check_abort().await {
            return self.abandon().await;
        }
        // The main run this turn keeps company; its id stamps the transcript
        let main_run = coordination.status.read_status(Channel::Main).await.and_then(|s| s.run_id);

        let mut state = self.threads.load(&self.thread_id).await;
        let mut messages = std::mem::take(&mut state.messages);
        messages.push(Message::user(input.text.as_str()));
        let messages = history::prepare(messages, self.max_messages);

        let mut ctx = ToolContext::new(self.session.clone(), Channel::Secondary, coordination.status.clone());
        if let Some(events) = &self.events {
            ctx = ctx.with_events(events.clone());
        }

        let (reply, messages) = match self.engine.run(messages, &ctx, Some(&coordination.abort)).await {
            TurnOutcome::Reply { text, messages } => (text, messages),
            TurnOutcome::Aborted => return self.abandon().await,
            TurnOutcome::Failed { error, mut messages } => {
                warn!(error = %error, "Secondary turn failed, replying with an apology");
                messages.push(Message::assistant(FALLBACK_REPLY));
                coordination.status.mark_finished(Channel::Secondary, false).await;
                state.messages = messages;
                self.threads.save(&self.thread_id, &state).await;
                self.publish(FALLBACK_REPLY);
                return SecondaryOutcome::Failed {
                    reply: FALLBACK_REPLY.to_string(),
                };
            }
        };

        let transcript = coordination
            .interim
            .appended(
                Message::assistant(reply.as_str()),
                input.interim_messages_reset,
                main_run.as_deref(),
            )
            .await;

        if coordination.abort.check_abort().await {
            return self.abandon().await;
        }

        coordination.interim.save(&transcript).await;
        coordination.status.mark_finished(Channel::Secondary, false).await;
        let state = ConversationState {
            messages,
            interim_messages: transcript.messages,
        };
        self.threads.save(&self.thread_id, &state).await;

        info!(thread_id = %self.thread_id, reply_len = reply.len(), "Secondary reply published");
        self.publish(&reply);
        SecondaryOutcome::Published { reply }
    }

    /// Release the channel after an abort without saving anything
    async fn abandon(&self) -> SecondaryOutcome {
        info!(thread_id = %self.thread_id, "Secondary turn aborted by the main channel");
        self.coordination.status.mark_finished(Channel::Secondary, true).await;
        self.coordination.abort.clear().await;
        SecondaryOutcome::Aborted
    }

    fn publish(&self, text: &str) {
        if let Some(events) = &self.events {
            events.final_reply(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::{InterimTranscript, OperationStatus, StatusRecord};
    use crate::llm::{CompletionResponse, ScriptStep, ScriptedLlmClient, ToolCall};
    use crate::tools::{ToolExecutor, ToolProfile, ToolSettings};
    use coordstore::{MemoryStore, StoreRef};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixture {
        coordination: Coordination,
        threads: ThreadStore,
        runner: SecondaryChannelRunner,
    }

    fn fixture(client: ScriptedLlmClient) -> Fixture {
        let session = SessionContext::new("demo_user", "tools_updates").unwrap();
        let store: StoreRef = Arc::new(MemoryStore::new());
        let coordination = Coordination::new(store.clone(), session.namespace.clone());
        let threads = ThreadStore::new(store, &session).unwrap();
        let tools = ToolExecutor::with_profile(ToolProfile::Secondary, &ToolSettings::default());
        let engine = TurnEngine::new(Arc::new(client), Arc::new(tools), "secondary");
        let runner = SecondaryChannelRunner::new(session, coordination.clone(), engine, threads.clone(), "t2");
        Fixture {
            coordination,
            threads,
            runner,
        }
    }

    async fn secondary_status(f: &Fixture) -> StatusRecord {
        f.coordination.status.read_status(Channel::Secondary).await.unwrap()
    }

    #[tokio::test]
    async fn test_publishes_and_appends() {
        let f = fixture(ScriptedLlmClient::from_responses(vec![CompletionResponse::text("Here's a fun fact!")]));
        let previous = InterimTranscript::new(vec![Message::assistant("earlier")]);
        f.coordination.interim.save(&previous).await;

        let outcome = f
            .runner
            .run(ChannelInput::new("tell me something", false), CancellationToken::new())
            .await;
        assert_eq!(
            outcome,
            SecondaryOutcome::Published {
                reply: "Here's a fun fact!".to_string()
            }
        );

        let transcript = f.coordination.interim.load().await;
        assert_eq!(transcript.messages.len(), 2);
        assert!(!secondary_status(&f).await.processing);
        assert_eq!(f.threads.load("t2").await.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_reset_starts_fresh_transcript() {
        let f = fixture(ScriptedLlmClient::from_responses(vec![CompletionResponse::text("Fresh start")]));
        let previous = InterimTranscript::new(vec![Message::assistant("stale")]);
        f.coordination.interim.save(&previous).await;

        f.runner.run(ChannelInput::new("hi", true), CancellationToken::new()).await;
        let transcript = f.coordination.interim.load().await;
        assert_eq!(transcript.messages, vec![Message::assistant("Fresh start")]);
    }

    #[tokio::test]
    async fn test_reply_is_stamped_with_main_run() {
        let f = fixture(ScriptedLlmClient::from_responses(vec![CompletionResponse::text("Sure thing")]));
        f.coordination
            .status
            .for_run("run-a")
            .write_status(Channel::Main, "long_operation", 30, OperationStatus::Running)
            .await;

        f.runner.run(ChannelInput::new("hi", false), CancellationToken::new()).await;
        let transcript = f.coordination.interim.load().await;
        assert_eq!(transcript.run_id.as_deref(), Some("run-a"));
        assert_eq!(transcript.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_abort_before_work() {
        let f = fixture(ScriptedLlmClient::from_responses(vec![CompletionResponse::text("unused")]));
        f.coordination.abort.request_abort("main_thread_timeout").await;

        let outcome = f.runner.run(ChannelInput::new("hi", false), CancellationToken::new()).await;
        assert_eq!(outcome, SecondaryOutcome::Aborted);
        let status = secondary_status(&f).await;
        assert!(!status.processing);
        assert!(status.aborted);
        assert!(!f.coordination.abort.check_abort().await);
        assert!(f.coordination.interim.load().await.is_empty());
        assert!(f.threads.load("t2").await.messages.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_after_tool_round_discards_reply() {
        let f = fixture(ScriptedLlmClient::new(vec![
            ScriptStep::RespondAfter(
                Duration::from_millis(100),
                CompletionResponse::tool_calls(vec![ToolCall::new("c1", "check_status", json!({}))]),
            ),
            ScriptStep::Respond(CompletionResponse::text("unused")),
        ]));
        f.coordination
            .status
            .write_status(Channel::Main, "long_operation", 40, OperationStatus::Running)
            .await;
        // Arrives while the first model call is in flight
        let abort = f.coordination.abort.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            abort.request_abort("main_thread_timeout").await;
        });

        let outcome = f.runner.run(ChannelInput::new("status?", false), CancellationToken::new()).await;
        assert_eq!(outcome, SecondaryOutcome::Aborted);
        assert!(f.coordination.interim.load().await.is_empty());
        assert!(secondary_status(&f).await.aborted);
    }

    #[tokio::test]
    async fn test_model_failure_releases_channel() {
        let f = fixture(ScriptedLlmClient::new(vec![ScriptStep::Fail("down".to_string())]));
        let outcome = f.runner.run(ChannelInput::new("hi", false), CancellationToken::new()).await;
        assert_eq!(
            outcome,
            SecondaryOutcome::Failed {
                reply: FALLBACK_REPLY.to_string()
            }
        );
        assert!(!secondary_status(&f).await.processing);
        assert!(f.coordination.interim.load().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_marks_aborted() {
        let client = ScriptedLlmClient::from_responses(vec![CompletionResponse::text("too late")])
            .latency(Duration::from_secs(5));
        let f = fixture(client);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let outcome = f.runner.run(ChannelInput::new("hi", false), cancel).await;
        assert_eq!(outcome, SecondaryOutcome::Cancelled);
        let status = secondary_status(&f).await;
        assert!(!status.processing);
        assert!(status.aborted);
        assert!(f.coordination.interim.load().await.is_empty());
    }
}
