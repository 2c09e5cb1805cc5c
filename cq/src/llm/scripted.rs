//! Scripted model client for tests and offline runs

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError};

/// Computes a response from the request it is answering
pub type Responder = Arc<dyn Fn(&CompletionRequest) -> Result<CompletionResponse, LlmError> + Send + Sync>;

/// One scripted answer
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Respond(CompletionResponse),
    /// Wait before answering, to simulate a slow model
    RespondAfter(Duration, CompletionResponse),
    Fail(String),
}

enum Mode {
    Queue(Mutex<VecDeque<ScriptStep>>),
    Responder(Responder),
}

/// Model double that answers from a script or a responder function
///
/// Queue mode pops one step per call and fails once the script runs out.
/// Responder mode is better when several channels share the client and call
/// order is not deterministic.
pub struct ScriptedLlmClient {
    mode: Mode,
    latency: Duration,
    requests: Mutex<Vec<CompletionRequest>>,
    call_count: AtomicUsize,
}

impl ScriptedLlmClient {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        debug!(step_count = %steps.len(), "ScriptedLlmClient::new: called");
        Self::with_mode(Mode::Queue(Mutex::new(steps.into())))
    }

    /// Queue of plain responses
    pub fn from_responses(responses: Vec<CompletionResponse>) -> Self {
        Self::new(responses.into_iter().map(ScriptStep::Respond).collect())
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<CompletionResponse, LlmError> + Send + Sync + 'static,
    {
        Self::with_mode(Mode::Responder(Arc::new(responder)))
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            latency: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Delay every answer by `latency`
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Every request received so far, in arrival order
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
        debug!(%idx, tool_count = %request.tools.len(), "ScriptedLlmClient::complete: called");
        self.requests.lock().await.push(request.clone());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match &self.mode {
            Mode::Responder(responder) => responder(&request),
            Mode::Queue(queue) => {
                let step = queue.lock().await.pop_front();
                match step {
                    Some(ScriptStep::Respond(response)) => Ok(response),
                    Some(ScriptStep::RespondAfter(delay, response)) => {
                        tokio::time::sleep(delay).await;
                        Ok(response)
                    }
                    Some(ScriptStep::Fail(message)) => Err(LlmError::Scripted(message)),
                    None => {
                        debug!("ScriptedLlmClient::complete: script exhausted");
                        Err(LlmError::Scripted("no more scripted responses".to_string()))
                    }
                }
            }
        }
    }
}
