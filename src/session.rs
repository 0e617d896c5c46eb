//! Chat session management.
//!
//! [`ChatSession`] ties a [`Transport`] to a [`Conversation`]: it builds each request from the
//! history, drains the streamed response through the decoder and accumulator, and commits the
//! exchange only when the response completed.

use crate::Renderer;
use crate::accumulator::{Completion, StreamOutcome, accumulate};
use crate::cancel::Cancellation;
use crate::client::Transport;
use crate::config::ChatConfig;
use crate::conversation::Conversation;
use crate::error::{Error, Result};
use crate::frame::decode_frames;
use crate::observability::{SESSION_EXCHANGES, SESSION_FAILED_EXCHANGES};
use crate::types::{ChatRequest, Usage};

/// A snapshot of session statistics, printed by `/stats`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    /// The model requests are sent to.
    pub model: String,
    /// Messages in the history, system message included.
    pub message_count: usize,
    /// Exchanges committed to the history.
    pub exchanges: usize,
    /// Requests sent.
    pub requests: u64,
    /// Requests that were interrupted or failed.
    pub failed_requests: u64,
    /// Frames skipped because they did not parse.
    pub decode_errors: u64,
    /// Prompt tokens reported across all requests.
    pub total_prompt_tokens: u64,
    /// Completion tokens reported across all requests.
    pub total_completion_tokens: u64,
    /// Usage of the most recent response that reported it.
    pub last_usage: Option<Usage>,
}

/// A conversation with one endpoint.
pub struct ChatSession<T: Transport> {
    transport: T,
    config: ChatConfig,
    conversation: Conversation,
    usage_totals: Usage,
    last_usage: Option<Usage>,
    requests: u64,
    failed_requests: u64,
    decode_errors: u64,
}

impl<T: Transport> ChatSession<T> {
    /// Create a session whose history starts with the configured system prompt.
    pub fn new(transport: T, config: ChatConfig) -> Self {
        let conversation = Conversation::new(config.system_prompt.clone());
        Self {
            transport,
            config,
            conversation,
            usage_totals: Usage::default(),
            last_usage: None,
            requests: 0,
            failed_requests: 0,
            decode_errors: 0,
        }
    }

    /// Send `user_text` and stream the reply through `renderer`.
    ///
    /// `Err` means no response body was obtained.  Otherwise the outcome carries whatever text
    /// arrived and `completion` says how the stream ended; use [`StreamOutcome::into_result`] to
    /// turn interruptions and transport failures into errors.  The exchange is committed to the
    /// history on a clean completion, or on any completion when `commit_partial` is set and some
    /// answer text arrived.
    pub async fn send_streaming(
        &mut self,
        user_text: &str,
        renderer: &mut dyn Renderer,
        cancel: &Cancellation,
    ) -> Result<StreamOutcome> {
        let request = self.build_request(user_text);
        self.requests += 1;

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::interrupted("cancelled before the response started")),
            opened = self.transport.open(&request) => opened,
        };
        let lines = match opened {
            Ok(lines) => lines,
            Err(err) => {
                self.record_failure(&err);
                return Err(err);
            }
        };

        let outcome = accumulate(decode_frames(lines), renderer, cancel).await;
        self.decode_errors += outcome.decode_errors as u64;
        if let Some(usage) = outcome.usage {
            self.usage_totals = self.usage_totals + usage;
            self.last_usage = Some(usage);
        }

        match &outcome.completion {
            Completion::Done | Completion::EndOfStream => {
                self.conversation.append_exchange(user_text, outcome.answer.clone());
                SESSION_EXCHANGES.click();
                tracing::info!(
                    model = %request.model,
                    reasoning_chars = outcome.reasoning.chars().count(),
                    answer_chars = outcome.answer.chars().count(),
                    decode_errors = outcome.decode_errors,
                    finish_reason = outcome.finish_reason.as_deref().unwrap_or(""),
                    "exchange committed"
                );
            }
            Completion::Interrupted => {
                self.record_failure(&Error::interrupted("response stream cancelled"));
                self.commit_partial(user_text, &outcome);
            }
            Completion::TransportFailure(err) => {
                self.record_failure(err);
                self.commit_partial(user_text, &outcome);
            }
        }
        Ok(outcome)
    }

    /// Build the request for a new user turn without sending it.
    ///
    /// A configured assistant prefill trails the user message.  Only the streamed answer is
    /// committed afterwards; the prefill never enters the history.
    pub fn build_request(&self, user_text: &str) -> ChatRequest {
        let prefill = self.config.assistant_prefill.as_deref();
        ChatRequest::new(
            self.config.model.clone(),
            self.conversation.request_messages(user_text, prefill),
            self.config.generation.clone(),
        )
    }

    fn commit_partial(&mut self, user_text: &str, outcome: &StreamOutcome) {
        if self.config.commit_partial && !outcome.answer.is_empty() {
            self.conversation.append_exchange(user_text, outcome.answer.clone());
            tracing::info!(
                answer_chars = outcome.answer.chars().count(),
                "partial exchange committed"
            );
        }
    }

    fn record_failure(&mut self, err: &Error) {
        self.failed_requests += 1;
        SESSION_FAILED_EXCHANGES.click();
        if err.is_interrupted() {
            tracing::debug!("exchange interrupted");
        } else {
            tracing::warn!(error = %err, "exchange failed");
        }
    }

    /// The conversation so far.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// The active configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Reset the history to the system message.
    pub fn clear(&mut self) {
        self.conversation.clear();
    }

    /// Changes the model used for responses.
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.config.model = model.into();
    }

    /// Returns the current model.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Sets the maximum answer tokens per response.
    pub fn set_max_tokens(&mut self, max_tokens: u32) {
        self.config.generation.max_tokens = max_tokens;
    }

    /// Sets the sampling temperature; `None` leaves it to the endpoint.
    pub fn set_temperature(&mut self, temperature: Option<f32>) {
        self.config.generation.temperature = temperature;
    }

    /// Sets the top-p value; `None` leaves it to the endpoint.
    pub fn set_top_p(&mut self, top_p: Option<f32>) {
        self.config.generation.top_p = top_p;
    }

    /// Sets the top-k value; `None` leaves it to the endpoint.
    pub fn set_top_k(&mut self, top_k: Option<u32>) {
        self.config.generation.top_k = top_k;
    }

    /// Adds a stop sequence unless it is already present.
    pub fn add_stop_sequence(&mut self, sequence: String) {
        if !self.config.generation.stop.contains(&sequence) {
            self.config.generation.stop.push(sequence);
        }
    }

    /// Clears all stop sequences.
    pub fn clear_stop_sequences(&mut self) {
        self.config.generation.stop.clear();
    }

    /// Returns the configured stop sequences.
    pub fn stop_sequences(&self) -> &[String] {
        &self.config.generation.stop
    }

    /// Records whether reasoning text is shown.
    pub fn set_show_reasoning(&mut self, show: bool) {
        self.config.show_reasoning = show;
    }

    /// Sets whether interrupted or failed answers are kept in the history.
    pub fn set_commit_partial(&mut self, commit: bool) {
        self.config.commit_partial = commit;
    }

    /// Sets the assistant prefill; `None` sends the user message last.
    pub fn set_assistant_prefill(&mut self, prefill: Option<String>) {
        self.config.assistant_prefill = prefill;
    }

    /// Returns the assistant prefill, if any.
    pub fn assistant_prefill(&self) -> Option<&str> {
        self.config.assistant_prefill.as_deref()
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            model: self.config.model.clone(),
            message_count: self.conversation.len(),
            exchanges: self.conversation.exchanges(),
            requests: self.requests,
            failed_requests: self.failed_requests,
            decode_errors: self.decode_errors,
            total_prompt_tokens: self.usage_totals.prompt_tokens,
            total_completion_tokens: self.usage_totals.completion_tokens,
            last_usage: self.last_usage,
        }
    }
}
